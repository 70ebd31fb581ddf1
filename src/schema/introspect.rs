//! Build table models from a database catalog.

use crate::error::SchemaError;
use crate::schema::{ColumnKind, ColumnModel, ForeignKeyModel, TableModel, TableRegistry};
use crate::sql::Dialect;
use async_trait::async_trait;
use std::collections::HashMap;

/// One column as the catalog reports it.
#[derive(Clone, Debug)]
pub struct RawColumn {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// 1-based position in the primary key, 0 when not part of it.
    pub pk_position: i64,
    pub autoincrement: bool,
}

#[derive(Clone, Debug)]
pub struct RawForeignKey {
    pub column: String,
    pub references_table: String,
    /// `None` means the referenced table's primary key.
    pub references_column: Option<String>,
}

/// Read access to the metadata catalog of one database.
#[async_trait]
pub trait Catalog: Send + Sync {
    fn dialect(&self) -> Dialect;
    /// User tables, excluding system/internal tables.
    async fn tables(&self) -> Result<Vec<String>, sqlx::Error>;
    /// Columns in declaration order.
    async fn columns(&self, table: &str) -> Result<Vec<RawColumn>, sqlx::Error>;
    async fn foreign_keys(&self, table: &str) -> Result<Vec<RawForeignKey>, sqlx::Error>;
}

/// Read the whole catalog into a registry. Tables without a primary key are skipped.
pub async fn introspect(catalog: &dyn Catalog) -> Result<TableRegistry, SchemaError> {
    let dialect = catalog.dialect();
    let mut tables = Vec::new();
    let mut raw_fks = HashMap::new();

    for name in catalog.tables().await? {
        let raw = catalog.columns(&name).await?;
        if raw.is_empty() {
            return Err(SchemaError::Table {
                table: name,
                message: "catalog reports no columns".into(),
            });
        }
        let mut pk: Vec<&RawColumn> = raw.iter().filter(|c| c.pk_position > 0).collect();
        if pk.is_empty() {
            tracing::warn!(table = %name, "skipping table without a primary key");
            continue;
        }
        pk.sort_by_key(|c| c.pk_position);
        let primary_key = pk.iter().map(|c| c.name.clone()).collect();

        let columns = raw
            .iter()
            .map(|c| ColumnModel {
                name: c.name.clone(),
                kind: dialect.column_kind(&c.declared_type).unwrap_or_else(|| {
                    tracing::warn!(table = %name, column = %c.name, declared = %c.declared_type, "unknown column type, treating as text");
                    ColumnKind::Text
                }),
                declared_type: c.declared_type.clone(),
                nullable: c.nullable,
                default: c.default.clone(),
                autoincrement: c.autoincrement,
                primary_key: c.pk_position > 0,
            })
            .collect();

        raw_fks.insert(name.clone(), catalog.foreign_keys(&name).await?);
        tables.push(TableModel {
            name,
            columns,
            primary_key,
            foreign_keys: Vec::new(),
        });
    }

    resolve_foreign_keys(&mut tables, raw_fks);
    let registry = TableRegistry::new(tables);
    tracing::info!(dialect = ?dialect, tables = registry.len(), "schema loaded");
    Ok(registry)
}

/// Attach foreign keys whose target exists among the loaded tables; drop the rest.
fn resolve_foreign_keys(tables: &mut [TableModel], mut raw: HashMap<String, Vec<RawForeignKey>>) {
    let targets: HashMap<String, (Vec<String>, Vec<String>)> = tables
        .iter()
        .map(|t| {
            (
                t.name.clone(),
                (t.columns.iter().map(|c| c.name.clone()).collect(), t.primary_key.clone()),
            )
        })
        .collect();

    for table in tables.iter_mut() {
        for fk in raw.remove(&table.name).unwrap_or_default() {
            let Some((columns, pk)) = targets.get(&fk.references_table) else {
                tracing::warn!(table = %table.name, references = %fk.references_table, "dropping foreign key to unknown table");
                continue;
            };
            let target = match fk.references_column {
                Some(col) if columns.contains(&col) => col,
                None if pk.len() == 1 => pk[0].clone(),
                other => {
                    tracing::warn!(table = %table.name, references = %fk.references_table, column = ?other, "dropping foreign key to unknown column");
                    continue;
                }
            };
            if table.column(&fk.column).is_none() {
                tracing::warn!(table = %table.name, column = %fk.column, "dropping foreign key on unknown column");
                continue;
            }
            table.foreign_keys.push(ForeignKeyModel {
                column: fk.column,
                references_table: fk.references_table,
                references_column: target,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeCatalog {
        tables: Vec<(String, Vec<RawColumn>, Vec<RawForeignKey>)>,
    }

    fn raw(name: &str, declared: &str, pk_position: i64) -> RawColumn {
        RawColumn {
            name: name.into(),
            declared_type: declared.into(),
            nullable: pk_position == 0,
            default: None,
            pk_position,
            autoincrement: pk_position == 1 && declared == "INTEGER",
        }
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn tables(&self) -> Result<Vec<String>, sqlx::Error> {
            Ok(self.tables.iter().map(|(n, _, _)| n.clone()).collect())
        }

        async fn columns(&self, table: &str) -> Result<Vec<RawColumn>, sqlx::Error> {
            Ok(self
                .tables
                .iter()
                .find(|(n, _, _)| n == table)
                .map(|(_, c, _)| c.clone())
                .unwrap_or_default())
        }

        async fn foreign_keys(&self, table: &str) -> Result<Vec<RawForeignKey>, sqlx::Error> {
            Ok(self
                .tables
                .iter()
                .find(|(n, _, _)| n == table)
                .map(|(_, _, f)| f.clone())
                .unwrap_or_default())
        }
    }

    fn sample() -> FakeCatalog {
        FakeCatalog {
            tables: vec![
                (
                    "invoices".into(),
                    vec![
                        raw("InvoiceId", "INTEGER", 1),
                        raw("CustomerId", "INTEGER", 0),
                        raw("Total", "NUMERIC(10,2)", 0),
                        raw("Data", "JSON", 0),
                        raw("Shape", "GEOMETRY", 0),
                    ],
                    vec![
                        RawForeignKey {
                            column: "CustomerId".into(),
                            references_table: "customers".into(),
                            references_column: None,
                        },
                        RawForeignKey {
                            column: "CustomerId".into(),
                            references_table: "ghosts".into(),
                            references_column: Some("id".into()),
                        },
                    ],
                ),
                (
                    "customers".into(),
                    vec![raw("CustomerId", "INTEGER", 1), raw("Active", "BOOL", 0)],
                    vec![],
                ),
                ("log".into(), vec![raw("line", "TEXT", 0)], vec![]),
            ],
        }
    }

    #[tokio::test]
    async fn builds_models_and_skips_keyless_tables() {
        let reg = introspect(&sample()).await.unwrap();
        let names: Vec<&str> = reg.all().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["customers", "invoices"]);

        let inv = reg.get("invoices").unwrap();
        assert_eq!(inv.primary_key, vec!["InvoiceId"]);
        assert!(inv.columns[0].autoincrement);
        let kinds: Vec<ColumnKind> = inv.columns.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ColumnKind::Integer, ColumnKind::Integer, ColumnKind::Real, ColumnKind::Json, ColumnKind::Text]
        );
        assert!(reg.get("log").is_err());
    }

    #[tokio::test]
    async fn foreign_keys_resolve_against_loaded_tables() {
        let reg = introspect(&sample()).await.unwrap();
        let inv = reg.get("invoices").unwrap();
        assert_eq!(
            inv.foreign_keys,
            vec![ForeignKeyModel {
                column: "CustomerId".into(),
                references_table: "customers".into(),
                references_column: "CustomerId".into(),
            }]
        );
    }

    #[tokio::test]
    async fn composite_keys_keep_declared_order() {
        let catalog = FakeCatalog {
            tables: vec![(
                "line_items".into(),
                vec![raw("qty", "INT", 0), raw("line", "INT", 2), raw("order_id", "INT", 1)],
                vec![],
            )],
        };
        let reg = introspect(&catalog).await.unwrap();
        assert_eq!(reg.get("line_items").unwrap().primary_key, vec!["order_id", "line"]);
    }

    #[tokio::test]
    async fn table_without_columns_is_a_schema_error() {
        let catalog = FakeCatalog {
            tables: vec![("empty".into(), vec![], vec![])],
        };
        assert!(matches!(introspect(&catalog).await, Err(SchemaError::Table { .. })));
    }
}
