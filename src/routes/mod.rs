//! Router assembly.

mod common;
mod table;

pub use common::common_routes;
pub use table::{schema_routes, table_routes};

use crate::config::Settings;
use crate::error::AppError;
use crate::handlers::not_found;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Full application: ancillary routes at the root, table routes under `base_path`.
pub fn app(state: AppState, base_path: &str, body_limit: usize) -> Router {
    let tables = schema_routes(state.clone()).merge(table_routes(state.clone()));
    let tables = if base_path.is_empty() {
        tables
    } else {
        Router::new().nest(base_path, tables)
    };
    common_routes(state)
        .merge(tables)
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::map_response(envelope_rejections))
        .layer(TraceLayer::new_for_http())
}

/// The body-limit layer and axum's extractors answer in plain text; give those the JSON envelope.
async fn envelope_rejections(res: Response) -> Response {
    let is_json = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    match res.status() {
        StatusCode::PAYLOAD_TOO_LARGE if !is_json => AppError::PayloadTooLarge.into_response(),
        StatusCode::METHOD_NOT_ALLOWED if !is_json => AppError::MethodNotAllowed.into_response(),
        _ => res,
    }
}

/// [`app`] configured from settings.
pub fn app_from_settings(state: AppState, settings: &Settings) -> Router {
    app(state, &settings.base_path, settings.body_limit)
}
