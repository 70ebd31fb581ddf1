//! Name -> table model lookup shared by every request.

use crate::error::AppError;
use crate::schema::TableModel;
use std::collections::HashMap;

/// All table models, built once at startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: Vec<TableModel>,
    by_name: HashMap<String, usize>,
}

impl TableRegistry {
    pub fn new(mut tables: Vec<TableModel>) -> Self {
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        let by_name = tables.iter().enumerate().map(|(i, t)| (t.name.clone(), i)).collect();
        Self { tables, by_name }
    }

    /// Look up a table by its exact name.
    pub fn get(&self, name: &str) -> Result<&TableModel, AppError> {
        self.by_name
            .get(name)
            .map(|&i| &self.tables[i])
            .ok_or_else(|| AppError::NotFound(format!("table '{}'", name)))
    }

    /// Tables sorted by name.
    pub fn all(&self) -> &[TableModel] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
