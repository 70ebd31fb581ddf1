//! Read-only view of the loaded table models.

use crate::error::AppError;
use crate::response::success_one;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

pub async fn list_tables(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let tables = serde_json::to_value(state.registry.all()).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(success_one(tables))
}

pub async fn describe_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let model = state.registry.get(&table)?;
    let model = serde_json::to_value(model).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(success_one(model))
}
