//! Connection pool per dialect and statement execution.
//!
//! Rows come back as `Vec<SqlValue>` in select-list order so everything above this module is
//! driver-agnostic.

use crate::schema::{Catalog, PgCatalog, SqliteCatalog};
use crate::sql::{Dialect, SqlValue, Statement};
use sqlx::postgres::{PgExecutor, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqliteExecutor, SqlitePoolOptions, SqliteRow};
use sqlx::{Decode, PgPool, Postgres, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::str::FromStr;

#[derive(Clone, Debug)]
pub enum Database {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

pub enum Transaction {
    Postgres(sqlx::Transaction<'static, Postgres>),
    Sqlite(sqlx::Transaction<'static, Sqlite>),
}

impl Database {
    pub async fn connect(dialect: Dialect, url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        Ok(match dialect {
            Dialect::Postgres => Database::Postgres(
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await?,
            ),
            Dialect::Sqlite => {
                let opts = SqliteConnectOptions::from_str(url)?
                    .create_if_missing(true)
                    .foreign_keys(true);
                let mut pool = SqlitePoolOptions::new().max_connections(max_connections);
                // every connection to :memory: is its own database
                if url.contains(":memory:") {
                    pool = pool.max_connections(1).idle_timeout(None).max_lifetime(None);
                }
                Database::Sqlite(pool.connect_with(opts).await?)
            }
        })
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Database::Postgres(_) => Dialect::Postgres,
            Database::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Catalog reader used once at startup.
    pub fn catalog(&self) -> Box<dyn Catalog + '_> {
        match self {
            Database::Postgres(pool) => Box::new(PgCatalog::new(pool)),
            Database::Sqlite(pool) => Box::new(SqliteCatalog::new(pool)),
        }
    }

    pub async fn fetch_all(&self, st: &Statement) -> Result<Vec<Vec<SqlValue>>, sqlx::Error> {
        match self {
            Database::Postgres(pool) => pg_fetch(pool, st).await,
            Database::Sqlite(pool) => sqlite_fetch(pool, st).await,
        }
    }

    /// Run a statement, returning rows affected.
    pub async fn execute(&self, st: &Statement) -> Result<u64, sqlx::Error> {
        match self {
            Database::Postgres(pool) => pg_execute(pool, st).await,
            Database::Sqlite(pool) => sqlite_execute(pool, st).await,
        }
    }

    pub async fn begin(&self) -> Result<Transaction, sqlx::Error> {
        Ok(match self {
            Database::Postgres(pool) => Transaction::Postgres(pool.begin().await?),
            Database::Sqlite(pool) => Transaction::Sqlite(pool.begin().await?),
        })
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let st = Statement {
            sql: "SELECT 1".into(),
            args: Vec::new(),
        };
        self.fetch_all(&st).await.map(|_| ())
    }
}

impl Transaction {
    pub async fn fetch_all(&mut self, st: &Statement) -> Result<Vec<Vec<SqlValue>>, sqlx::Error> {
        match self {
            Transaction::Postgres(tx) => pg_fetch(&mut **tx, st).await,
            Transaction::Sqlite(tx) => sqlite_fetch(&mut **tx, st).await,
        }
    }

    /// Run an INSERT of `rows` tuples. When `generated` is set, returns the generated keys in row order:
    /// from `RETURNING` on PostgreSQL, from `last_insert_rowid()` on SQLite.
    pub async fn insert(&mut self, st: &Statement, rows: usize, generated: bool) -> Result<Vec<SqlValue>, sqlx::Error> {
        match self {
            Transaction::Postgres(tx) => {
                if !generated {
                    pg_execute(&mut **tx, st).await?;
                    return Ok(Vec::new());
                }
                let returned = pg_fetch(&mut **tx, st).await?;
                Ok(returned.into_iter().filter_map(|r| r.into_iter().next()).collect())
            }
            Transaction::Sqlite(tx) => {
                tracing::debug!(sql = %st.sql, args = ?st.args, "insert");
                let result = bind_all(sqlx::query::<Sqlite>(&st.sql), &st.args).execute(&mut **tx).await?;
                if !generated {
                    return Ok(Vec::new());
                }
                // a single multi-row INSERT allocates consecutive rowids ending at the last one
                let last = result.last_insert_rowid();
                let first = last - rows as i64 + 1;
                Ok((first..=last).map(SqlValue::Integer).collect())
            }
        }
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            Transaction::Postgres(tx) => tx.commit().await,
            Transaction::Sqlite(tx) => tx.commit().await,
        }
    }
}

fn bind_all<'q, DB>(
    mut query: sqlx::query::Query<'q, DB, <DB as sqlx::Database>::Arguments<'q>>,
    args: &[SqlValue],
) -> sqlx::query::Query<'q, DB, <DB as sqlx::Database>::Arguments<'q>>
where
    DB: sqlx::Database,
    SqlValue: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
{
    for a in args {
        query = query.bind(a.clone());
    }
    query
}

async fn pg_fetch<'e, E: PgExecutor<'e>>(ex: E, st: &Statement) -> Result<Vec<Vec<SqlValue>>, sqlx::Error> {
    tracing::debug!(sql = %st.sql, args = ?st.args, "query");
    let rows = bind_all(sqlx::query::<Postgres>(&st.sql), &st.args).fetch_all(ex).await?;
    rows.iter().map(pg_row).collect()
}

async fn pg_execute<'e, E: PgExecutor<'e>>(ex: E, st: &Statement) -> Result<u64, sqlx::Error> {
    tracing::debug!(sql = %st.sql, args = ?st.args, "execute");
    let result = bind_all(sqlx::query::<Postgres>(&st.sql), &st.args).execute(ex).await?;
    Ok(result.rows_affected())
}

async fn sqlite_fetch<'e, E: SqliteExecutor<'e>>(ex: E, st: &Statement) -> Result<Vec<Vec<SqlValue>>, sqlx::Error> {
    tracing::debug!(sql = %st.sql, args = ?st.args, "query");
    let rows = bind_all(sqlx::query::<Sqlite>(&st.sql), &st.args).fetch_all(ex).await?;
    rows.iter().map(sqlite_row).collect()
}

async fn sqlite_execute<'e, E: SqliteExecutor<'e>>(ex: E, st: &Statement) -> Result<u64, sqlx::Error> {
    tracing::debug!(sql = %st.sql, args = ?st.args, "execute");
    let result = bind_all(sqlx::query::<Sqlite>(&st.sql), &st.args).execute(ex).await?;
    Ok(result.rows_affected())
}

fn pg_row(row: &PgRow) -> Result<Vec<SqlValue>, sqlx::Error> {
    (0..row.len()).map(|i| pg_cell(row, i)).collect()
}

/// Non-integer, non-boolean columns are selected as text, so only a few wire types show up here.
fn pg_cell(row: &PgRow, i: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let decoded = match type_name.as_str() {
        "INT2" => <i16 as Decode<Postgres>>::decode(raw).map(|n| SqlValue::Integer(n.into())),
        "INT4" => <i32 as Decode<Postgres>>::decode(raw).map(|n| SqlValue::Integer(n.into())),
        "INT8" => <i64 as Decode<Postgres>>::decode(raw).map(SqlValue::Integer),
        "FLOAT4" => <f32 as Decode<Postgres>>::decode(raw).map(|n| SqlValue::Real(n.into())),
        "FLOAT8" => <f64 as Decode<Postgres>>::decode(raw).map(SqlValue::Real),
        "BOOL" => <bool as Decode<Postgres>>::decode(raw).map(SqlValue::Bool),
        _ => <String as Decode<Postgres>>::decode(raw).map(SqlValue::Text),
    };
    decoded.map_err(sqlx::Error::Decode)
}

fn sqlite_row(row: &SqliteRow) -> Result<Vec<SqlValue>, sqlx::Error> {
    (0..row.len()).map(|i| sqlite_cell(row, i)).collect()
}

/// SQLite is dynamically typed: dispatch on the storage class of the value itself.
fn sqlite_cell(row: &SqliteRow, i: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let decoded = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => <i64 as Decode<Sqlite>>::decode(raw).map(SqlValue::Integer),
        "REAL" => <f64 as Decode<Sqlite>>::decode(raw).map(SqlValue::Real),
        "BLOB" => <Vec<u8> as Decode<Sqlite>>::decode(raw)
            .map(|bytes| SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())),
        _ => <String as Decode<Sqlite>>::decode(raw).map(SqlValue::Text),
    };
    decoded.map_err(sqlx::Error::Decode)
}
