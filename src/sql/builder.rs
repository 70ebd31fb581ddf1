//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a table model.
//!
//! Identifiers only ever come from the [`TableModel`]; every user-supplied value becomes a bound
//! argument.

use crate::coerce::{column_to_sql, from_sql, text_to_sql};
use crate::error::AppError;
use crate::request::{Filter, FilterOp, Page, SortKey};
use crate::schema::{ColumnKind, ColumnModel, TableModel};
use crate::sql::dialect::{quoted, Dialect};
use crate::sql::SqlValue;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// SQL text plus its arguments in placeholder order.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

/// One INSERT statement covering one or more payload rows.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertPlan {
    pub statement: Statement,
    pub rows: Vec<InsertedRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InsertedRow {
    /// Key supplied by the client for tables without a generated key.
    pub key: Option<SqlValue>,
    /// Coerced payload, returned as-is when the row cannot be read back by key.
    pub echo: Value,
}

struct QueryBuf {
    dialect: Dialect,
    args: Vec<SqlValue>,
}

impl QueryBuf {
    fn new(dialect: Dialect) -> Self {
        QueryBuf {
            dialect,
            args: Vec::new(),
        }
    }

    /// Push an argument and return its placeholder.
    fn bind(&mut self, v: SqlValue, column: Option<&ColumnModel>) -> String {
        self.args.push(v);
        self.dialect.placeholder(self.args.len(), column)
    }

    fn finish(self, sql: String) -> Statement {
        Statement { sql, args: self.args }
    }
}

fn select_columns(dialect: Dialect, table: &TableModel) -> String {
    table
        .columns
        .iter()
        .map(|c| dialect.select_expr(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coerce the path id against the single primary-key column.
pub fn key_value<'t>(table: &'t TableModel, raw: &str) -> Result<(&'t ColumnModel, SqlValue), AppError> {
    let pk = table.id_column()?;
    let v = text_to_sql(raw, pk.kind)
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}' for table '{}'", raw, table.name)))?;
    Ok((pk, v))
}

fn where_clause(q: &mut QueryBuf, table: &TableModel, filters: &[Filter]) -> Result<String, AppError> {
    let mut parts = Vec::with_capacity(filters.len());
    for f in filters {
        let col = table.require_column(&f.field)?;
        let first = f
            .values
            .first()
            .ok_or_else(|| AppError::BadRequest(format!("filter on '{}' has no value", f.field)))?;
        let part = match f.op {
            FilterOp::Like => {
                let rhs = q.bind(SqlValue::Text(first.clone()), None);
                format!("{} LIKE {}", q.dialect.text_expr(col), rhs)
            }
            FilterOp::In => {
                let mut placeholders = Vec::with_capacity(f.values.len());
                for raw in &f.values {
                    placeholders.push(bind_operand(q, col, raw)?);
                }
                format!("{} IN ({})", operand_lhs(q.dialect, col), placeholders.join(", "))
            }
            op => {
                let rhs = bind_operand(q, col, first)?;
                format!("{} {} {}", operand_lhs(q.dialect, col), op.sql(), rhs)
            }
        };
        parts.push(part);
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

/// JSON columns compare as text; everything else compares natively.
fn operand_lhs(dialect: Dialect, col: &ColumnModel) -> String {
    match col.kind {
        ColumnKind::Json => dialect.text_expr(col),
        _ => quoted(&col.name),
    }
}

fn bind_operand(q: &mut QueryBuf, col: &ColumnModel, raw: &str) -> Result<String, AppError> {
    let v = column_to_sql(&Value::String(raw.to_string()), col, q.dialect)?;
    let cast = match col.kind {
        ColumnKind::Json => None,
        _ => Some(col),
    };
    Ok(q.bind(v, cast))
}

fn order_clause(table: &TableModel, sort: &[SortKey]) -> Result<String, AppError> {
    let keys = if sort.is_empty() {
        table.primary_key.iter().map(|pk| quoted(pk)).collect::<Vec<_>>()
    } else {
        sort.iter()
            .map(|s| {
                let col = table.require_column(&s.field)?;
                Ok(format!("{} {}", quoted(&col.name), if s.descending { "DESC" } else { "ASC" }))
            })
            .collect::<Result<Vec<_>, AppError>>()?
    };
    Ok(format!(" ORDER BY {}", keys.join(", ")))
}

fn page_clause(q: &mut QueryBuf, page: &Page) -> String {
    let mut out = String::new();
    let as_arg = |n: u64| SqlValue::Integer(i64::try_from(n).unwrap_or(i64::MAX));
    match page.limit {
        Some(n) => {
            let ph = q.bind(as_arg(n), None);
            out.push_str(&format!(" LIMIT {}", ph));
        }
        // SQLite has no OFFSET without LIMIT
        None if page.offset > 0 && q.dialect == Dialect::Sqlite => out.push_str(" LIMIT -1"),
        None => {}
    }
    if page.offset > 0 {
        let ph = q.bind(as_arg(page.offset), None);
        out.push_str(&format!(" OFFSET {}", ph));
    }
    out
}

/// SELECT list with filters (ANDed), sort (default primary key) and pagination.
pub fn select_list(
    dialect: Dialect,
    table: &TableModel,
    filters: &[Filter],
    sort: &[SortKey],
    page: &Page,
) -> Result<Statement, AppError> {
    let mut q = QueryBuf::new(dialect);
    let where_sql = where_clause(&mut q, table, filters)?;
    let order_sql = order_clause(table, sort)?;
    let page_sql = page_clause(&mut q, page);
    let sql = format!(
        "SELECT {} FROM {}{}{}{}",
        select_columns(dialect, table),
        quoted(&table.name),
        where_sql,
        order_sql,
        page_sql
    );
    Ok(q.finish(sql))
}

/// Total rows matching the filters, ignoring sort and pagination.
pub fn count(dialect: Dialect, table: &TableModel, filters: &[Filter]) -> Result<Statement, AppError> {
    let mut q = QueryBuf::new(dialect);
    let where_sql = where_clause(&mut q, table, filters)?;
    let sql = format!("SELECT COUNT(*) FROM {}{}", quoted(&table.name), where_sql);
    Ok(q.finish(sql))
}

/// SELECT by primary key (single column PK only).
pub fn select_by_id(dialect: Dialect, table: &TableModel, id: SqlValue) -> Result<Statement, AppError> {
    let pk = table.id_column()?;
    let mut q = QueryBuf::new(dialect);
    let ph = q.bind(id, Some(pk));
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_columns(dialect, table),
        quoted(&table.name),
        quoted(&pk.name),
        ph
    );
    Ok(q.finish(sql))
}

/// Resolve body keys to columns (closed-field) and coerce values, in table column order.
/// Primary-key columns are dropped when `skip` says so.
fn resolve_row<'t>(
    dialect: Dialect,
    table: &'t TableModel,
    row: &Map<String, Value>,
    skip: impl Fn(&ColumnModel) -> bool,
) -> Result<Vec<(&'t ColumnModel, SqlValue)>, AppError> {
    let mut by_name: HashMap<&str, SqlValue> = HashMap::new();
    for (key, value) in row {
        let col = table.require_column(key)?;
        if skip(col) {
            continue;
        }
        let v = column_to_sql(value, col, dialect)?;
        if by_name.insert(col.name.as_str(), v).is_some() {
            return Err(AppError::BadRequest(format!("column '{}' supplied more than once", col.name)));
        }
    }
    Ok(table
        .columns
        .iter()
        .filter_map(|c| by_name.remove(c.name.as_str()).map(|v| (c, v)))
        .collect())
}

/// INSERT for one or many rows. Consecutive rows with the same column set share one
/// multi-row VALUES statement. Autoincrement keys in the payload are ignored.
pub fn insert(dialect: Dialect, table: &TableModel, rows: &[Map<String, Value>]) -> Result<Vec<InsertPlan>, AppError> {
    let generated = table.generated_key();
    let client_key = match generated {
        Some(_) => None,
        None => table.id_column().ok(),
    };

    let mut resolved = Vec::with_capacity(rows.len());
    for row in rows {
        let values = resolve_row(dialect, table, row, |c| c.primary_key && c.autoincrement)?;
        let key = client_key.and_then(|pk| {
            values
                .iter()
                .find(|(c, _)| c.name == pk.name)
                .map(|(_, v)| v.clone())
        });
        let mut echo = Map::new();
        for (c, v) in &values {
            echo.insert(c.name.clone(), from_sql(v.clone(), c.kind));
        }
        resolved.push((values, InsertedRow { key, echo: Value::Object(echo) }));
    }

    let returning = match (dialect.returns_generated_key(), generated) {
        (true, Some(pk)) => format!(" RETURNING {}", quoted(&pk.name)),
        _ => String::new(),
    };

    let mut plans = Vec::new();
    let mut start = 0;
    while start < resolved.len() {
        let shape: Vec<&str> = resolved[start].0.iter().map(|(c, _)| c.name.as_str()).collect();
        let mut end = start + 1;
        // DEFAULT VALUES cannot carry more than one row
        if !shape.is_empty() {
            while end < resolved.len()
                && resolved[end].0.iter().map(|(c, _)| c.name.as_str()).eq(shape.iter().copied())
            {
                end += 1;
            }
        }

        let mut q = QueryBuf::new(dialect);
        let mut group_rows = Vec::with_capacity(end - start);
        let sql = if shape.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES{}", quoted(&table.name), returning)
        } else {
            let mut tuples = Vec::with_capacity(end - start);
            for (values, _) in &resolved[start..end] {
                let phs: Vec<String> = values.iter().map(|(c, v)| q.bind(v.clone(), Some(c))).collect();
                tuples.push(format!("({})", phs.join(", ")));
            }
            let cols: Vec<String> = shape.iter().map(|n| quoted(n)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES {}{}",
                quoted(&table.name),
                cols.join(", "),
                tuples.join(", "),
                returning
            )
        };
        for (_, row) in &resolved[start..end] {
            group_rows.push(row.clone());
        }
        plans.push(InsertPlan {
            statement: q.finish(sql),
            rows: group_rows,
        });
        start = end;
    }
    Ok(plans)
}

/// UPDATE by id: SET only columns present in body. Primary-key columns are never updated.
pub fn update(
    dialect: Dialect,
    table: &TableModel,
    id: SqlValue,
    body: &Map<String, Value>,
) -> Result<Statement, AppError> {
    let pk = table.id_column()?;
    let values = resolve_row(dialect, table, body, |c| c.primary_key)?;
    if values.is_empty() {
        return Err(AppError::BadRequest("no updatable fields in body".into()));
    }
    let mut q = QueryBuf::new(dialect);
    let sets: Vec<String> = values
        .into_iter()
        .map(|(c, v)| format!("{} = {}", quoted(&c.name), q.bind(v, Some(c))))
        .collect();
    let id_ph = q.bind(id, Some(pk));
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quoted(&table.name),
        sets.join(", "),
        quoted(&pk.name),
        id_ph
    );
    Ok(q.finish(sql))
}

/// DELETE by id.
pub fn delete(dialect: Dialect, table: &TableModel, id: SqlValue) -> Result<Statement, AppError> {
    let pk = table.id_column()?;
    let mut q = QueryBuf::new(dialect);
    let ph = q.bind(id, Some(pk));
    let sql = format!("DELETE FROM {} WHERE {} = {}", quoted(&table.name), quoted(&pk.name), ph);
    Ok(q.finish(sql))
}
