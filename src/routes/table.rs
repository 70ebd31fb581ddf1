//! Table routes. Paths are parameterized; handlers resolve the table through the registry.

use crate::handlers::{collection, describe_table, item, list_tables, method_not_allowed};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn table_routes(state: AppState) -> Router {
    Router::new()
        .route("/:table", get(collection).post(collection).fallback(method_not_allowed))
        .route(
            "/:table/:id",
            get(item).put(item).patch(item).delete(item).fallback(method_not_allowed),
        )
        .with_state(state)
}

/// GET /_schema and GET /_schema/:table.
pub fn schema_routes(state: AppState) -> Router {
    Router::new()
        .route("/_schema", get(list_tables).fallback(method_not_allowed))
        .route("/_schema/:table", get(describe_table).fallback(method_not_allowed))
        .with_state(state)
}
