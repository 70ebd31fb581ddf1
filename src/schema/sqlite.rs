//! SQLite catalog: `sqlite_master` plus the table-info and foreign-key pragmas.

use crate::schema::{Catalog, RawColumn, RawForeignKey};
use crate::sql::Dialect;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

/// Catalog reader over `sqlite_master` and the table-info pragmas.
pub struct SqliteCatalog<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SqliteCatalog<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn tables(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(self.pool)
        .await
    }

    async fn columns(&self, table: &str) -> Result<Vec<RawColumn>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let pk_position: i64 = row.try_get("pk")?;
            let notnull: i64 = row.try_get("notnull")?;
            columns.push(RawColumn {
                name: row.try_get("name")?,
                declared_type: row.try_get("type")?,
                // primary key columns are implicitly required
                nullable: notnull == 0 && pk_position == 0,
                default: row.try_get("dflt_value")?,
                pk_position,
                autoincrement: false,
            });
        }

        // a lone INTEGER PRIMARY KEY aliases the rowid
        let key: Vec<usize> = (0..columns.len()).filter(|&i| columns[i].pk_position > 0).collect();
        if let [only] = key.as_slice() {
            let col = &mut columns[*only];
            col.autoincrement = col.declared_type.eq_ignore_ascii_case("INTEGER");
        }
        Ok(columns)
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<RawForeignKey>, sqlx::Error> {
        let rows = sqlx::query("SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?) ORDER BY id, seq")
            .bind(table)
            .fetch_all(self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(RawForeignKey {
                    column: row.try_get("from")?,
                    references_table: row.try_get("table")?,
                    references_column: row.try_get("to")?,
                })
            })
            .collect()
    }
}
