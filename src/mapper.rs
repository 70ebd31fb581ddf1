//! Result rows -> JSON objects, keys in the table's declared column order.

use crate::coerce::from_sql;
use crate::error::AppError;
use crate::schema::TableModel;
use crate::sql::SqlValue;
use serde_json::{Map, Value};

/// Map rows selected with the table's full column list. Zero rows gives an empty vec.
pub fn map_rows(rows: Vec<Vec<SqlValue>>, table: &TableModel) -> Vec<Value> {
    rows.into_iter().map(|row| map_row(row, table)).collect()
}

/// Exactly one row, or NotFound.
pub fn map_single(rows: Vec<Vec<SqlValue>>, table: &TableModel, id: &str) -> Result<Value, AppError> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(row), None) => Ok(map_row(row, table)),
        (None, _) => Err(AppError::NotFound(format!("{}/{}", table.name, id))),
        (Some(_), Some(_)) => Err(AppError::Internal(format!(
            "key lookup on '{}' returned more than one row",
            table.name
        ))),
    }
}

fn map_row(row: Vec<SqlValue>, table: &TableModel) -> Value {
    let mut obj = Map::with_capacity(table.columns.len());
    for (col, cell) in table.columns.iter().zip(row) {
        obj.insert(col.name.clone(), from_sql(cell, col.kind));
    }
    Value::Object(obj)
}
