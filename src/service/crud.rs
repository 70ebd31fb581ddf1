//! Generic CRUD execution: one code path for every table in the registry.

use crate::db::Database;
use crate::error::AppError;
use crate::mapper::{map_rows, map_single};
use crate::request::{ParsedRequest, Payload};
use crate::schema::TableModel;
use crate::sql::{count, delete, insert, key_value, select_by_id, select_list, update, SqlValue};
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

pub struct CrudService;

/// Run `fut` under the per-operation deadline. Dropping the future on expiry drops any open
/// transaction, which rolls it back.
async fn within<T, F>(deadline: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    tokio::time::timeout(deadline, fut).await.map_err(|_| AppError::Timeout)?
}

impl CrudService {
    /// List rows matching the request's filters, sorted and paginated. Returns the page and the
    /// total number of matching rows.
    pub async fn list(
        db: &Database,
        table: &TableModel,
        req: &ParsedRequest,
        deadline: Duration,
    ) -> Result<(Vec<Value>, u64), AppError> {
        let dialect = db.dialect();
        let select = select_list(dialect, table, &req.filters, &req.sort, &req.page)?;
        let total = count(dialect, table, &req.filters)?;
        within(deadline, async {
            let rows = db.fetch_all(&select).await?;
            let total = db.fetch_all(&total).await?;
            Ok::<_, AppError>((map_rows(rows, table), scalar_count(total)?))
        })
        .await
    }

    /// Fetch one row by primary key.
    pub async fn read(db: &Database, table: &TableModel, id: &str, deadline: Duration) -> Result<Value, AppError> {
        let (_, key) = key_value(table, id)?;
        let st = select_by_id(db.dialect(), table, key)?;
        within(deadline, async { map_single(db.fetch_all(&st).await?, table, id) }).await
    }

    /// Insert one row or a batch, all inside one transaction. Each created row is read back by key
    /// so the response matches a later read. A single-object payload returns an object, an array
    /// payload returns an array in payload order.
    pub async fn create(
        db: &Database,
        table: &TableModel,
        payload: &Payload,
        deadline: Duration,
    ) -> Result<Value, AppError> {
        let dialect = db.dialect();
        let plans = insert(dialect, table, payload.rows())?;
        let generated = table.generated_key().is_some();

        let created = within(deadline, async {
            let mut tx = db.begin().await?;
            let mut out = Vec::with_capacity(payload.rows().len());
            for plan in &plans {
                let keys = tx.insert(&plan.statement, plan.rows.len(), generated).await?;
                for (i, row) in plan.rows.iter().enumerate() {
                    let key = if generated { keys.get(i).cloned() } else { row.key.clone() };
                    let Some(key) = key else {
                        out.push(row.echo.clone());
                        continue;
                    };
                    let st = select_by_id(dialect, table, key)?;
                    let reread = map_rows(tx.fetch_all(&st).await?, table).into_iter().next();
                    out.push(reread.unwrap_or_else(|| row.echo.clone()));
                }
            }
            tx.commit().await?;
            Ok::<_, AppError>(out)
        })
        .await?;

        tracing::debug!(table = %table.name, rows = created.len(), "created");
        Ok(match payload {
            Payload::One(_) => created.into_iter().next().unwrap_or(Value::Null),
            Payload::Many(_) => Value::Array(created),
        })
    }

    /// Partial update by id; returns the row as stored afterwards.
    pub async fn update(
        db: &Database,
        table: &TableModel,
        id: &str,
        body: &Map<String, Value>,
        deadline: Duration,
    ) -> Result<Value, AppError> {
        let dialect = db.dialect();
        let (_, key) = key_value(table, id)?;
        let st = update(dialect, table, key.clone(), body)?;
        let reread = select_by_id(dialect, table, key)?;
        within(deadline, async {
            if db.execute(&st).await? == 0 {
                return Err(not_found(table, id));
            }
            map_single(db.fetch_all(&reread).await?, table, id)
        })
        .await
    }

    /// Delete by id. Zero affected rows is NotFound.
    pub async fn delete(db: &Database, table: &TableModel, id: &str, deadline: Duration) -> Result<(), AppError> {
        let (_, key) = key_value(table, id)?;
        let st = delete(db.dialect(), table, key)?;
        within(deadline, async {
            match db.execute(&st).await? {
                0 => Err(not_found(table, id)),
                _ => Ok(()),
            }
        })
        .await
    }
}

fn not_found(table: &TableModel, id: &str) -> AppError {
    AppError::NotFound(format!("{}/{}", table.name, id))
}

fn scalar_count(rows: Vec<Vec<SqlValue>>) -> Result<u64, AppError> {
    match rows.first().and_then(|r| r.first()) {
        Some(SqlValue::Integer(n)) => Ok((*n).max(0) as u64),
        other => Err(AppError::Internal(format!("unexpected COUNT result {:?}", other))),
    }
}
