//! PostgreSQL catalog read from `information_schema`.

use crate::schema::{Catalog, RawColumn, RawForeignKey};
use crate::sql::Dialect;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

/// Catalog reader over `information_schema`, limited to the connection's current schema.
pub struct PgCatalog<'a> {
    pool: &'a PgPool,
}

impl<'a> PgCatalog<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

const TABLES: &str = r#"
SELECT table_name::text
FROM information_schema.tables
WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'
ORDER BY table_name
"#;

const COLUMNS: &str = r#"
SELECT
    c.column_name::text AS name,
    c.udt_name::text AS declared_type,
    c.is_nullable::text AS is_nullable,
    c.column_default::text AS column_default,
    c.is_identity::text AS is_identity,
    COALESCE((
        SELECT k.ordinal_position::int8
        FROM information_schema.table_constraints t
        JOIN information_schema.key_column_usage k
          ON k.constraint_name = t.constraint_name
         AND k.table_schema = t.table_schema
         AND k.table_name = t.table_name
        WHERE t.constraint_type = 'PRIMARY KEY'
          AND t.table_schema = c.table_schema
          AND t.table_name = c.table_name
          AND k.column_name = c.column_name
    ), 0) AS pk_position
FROM information_schema.columns c
WHERE c.table_schema = current_schema() AND c.table_name = $1
ORDER BY c.ordinal_position
"#;

const FOREIGN_KEYS: &str = r#"
SELECT
    kcu.column_name::text AS column_name,
    ccu.table_name::text AS references_table,
    ccu.column_name::text AS references_column
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema
JOIN information_schema.constraint_column_usage ccu
  ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema
WHERE tc.constraint_type = 'FOREIGN KEY'
  AND tc.table_schema = current_schema()
  AND tc.table_name = $1
ORDER BY kcu.ordinal_position
"#;

#[async_trait]
impl Catalog for PgCatalog<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn tables(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(TABLES).fetch_all(self.pool).await
    }

    async fn columns(&self, table: &str) -> Result<Vec<RawColumn>, sqlx::Error> {
        let rows = sqlx::query(COLUMNS).bind(table).fetch_all(self.pool).await?;
        rows.iter()
            .map(|row| {
                let default: Option<String> = row.try_get("column_default")?;
                let identity: Option<String> = row.try_get("is_identity")?;
                let is_nullable: String = row.try_get("is_nullable")?;
                let autoincrement = identity.as_deref() == Some("YES")
                    || default.as_deref().is_some_and(|d| d.starts_with("nextval("));
                Ok(RawColumn {
                    name: row.try_get("name")?,
                    declared_type: row.try_get("declared_type")?,
                    nullable: is_nullable == "YES",
                    default,
                    pk_position: row.try_get("pk_position")?,
                    autoincrement,
                })
            })
            .collect()
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<RawForeignKey>, sqlx::Error> {
        let rows = sqlx::query(FOREIGN_KEYS).bind(table).fetch_all(self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(RawForeignKey {
                    column: row.try_get("column_name")?,
                    references_table: row.try_get("references_table")?,
                    references_column: row.try_get("references_column")?,
                })
            })
            .collect()
    }
}
