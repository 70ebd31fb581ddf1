//! Table model: columns, keys and relations discovered from the database catalog.

mod introspect;
mod postgres;
mod registry;
mod sqlite;

pub use introspect::{introspect, Catalog, RawColumn, RawForeignKey};
pub use postgres::PgCatalog;
pub use registry::TableRegistry;
pub use sqlite::SqliteCatalog;

use crate::error::AppError;
use serde::Serialize;

/// Normalized column type. Every declared SQL type maps to exactly one kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    Boolean,
    DateTime,
    Json,
}

#[derive(Clone, Debug, Serialize)]
pub struct ColumnModel {
    pub name: String,
    pub kind: ColumnKind,
    /// Type as declared in the catalog (e.g. `NVARCHAR(40)`, `int4`). PostgreSQL placeholders cast to it.
    pub declared_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub autoincrement: bool,
    pub primary_key: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ForeignKeyModel {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TableModel {
    pub name: String,
    pub columns: Vec<ColumnModel>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyModel>,
}

impl TableModel {
    /// Find a column by name: exact match first, then ASCII case-insensitive.
    pub fn column(&self, name: &str) -> Option<&ColumnModel> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// Like [`column`](Self::column) but a miss is a client error.
    pub fn require_column(&self, name: &str) -> Result<&ColumnModel, AppError> {
        self.column(name)
            .ok_or_else(|| AppError::BadRequest(format!("unknown column '{}' on table '{}'", name, self.name)))
    }

    /// The single primary-key column addressed by `/{table}/{id}`.
    pub fn id_column(&self) -> Result<&ColumnModel, AppError> {
        match self.primary_key.as_slice() {
            [pk] => self.require_column(pk),
            _ => Err(AppError::BadRequest(format!(
                "table '{}' has a composite primary key and cannot be addressed by id",
                self.name
            ))),
        }
    }

    /// Autoincrement single-column key, if the table has one.
    pub fn generated_key(&self) -> Option<&ColumnModel> {
        self.id_column().ok().filter(|c| c.autoincrement)
    }
}
