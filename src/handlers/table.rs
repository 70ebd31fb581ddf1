//! Generic table handlers: every request goes registry -> translate -> CrudService -> envelope.
//!
//! The table is resolved before anything else is parsed, so an unknown table is a 404 whatever
//! the query string or body holds.

use crate::error::AppError;
use crate::request::{translate, Intent, ParsedRequest, Payload};
use crate::response::{created, success_many, success_one};
use crate::schema::TableModel;
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

fn query_pairs(uri: &Uri) -> Result<Vec<(String, String)>, AppError> {
    Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(pairs)| pairs)
        .map_err(|e| AppError::BadRequest(format!("malformed query string: {}", e.body_text())))
}

/// `/{table}`: list (GET) and create (POST).
pub async fn collection(
    State(state): State<AppState>,
    method: Method,
    Path(table): Path<String>,
    uri: Uri,
    body: Bytes,
) -> Result<Response, AppError> {
    let model = state.registry.get(&table)?;
    let req = translate(&method, &table, None, &query_pairs(&uri)?, &body)?;
    dispatch(&state, model, req).await
}

/// `/{table}/{id}`: read (GET), update (PUT, PATCH) and delete (DELETE).
pub async fn item(
    State(state): State<AppState>,
    method: Method,
    Path((table, id)): Path<(String, String)>,
    uri: Uri,
    body: Bytes,
) -> Result<Response, AppError> {
    let model = state.registry.get(&table)?;
    let req = translate(&method, &table, Some(&id), &query_pairs(&uri)?, &body)?;
    dispatch(&state, model, req).await
}

async fn dispatch(state: &AppState, table: &TableModel, req: ParsedRequest) -> Result<Response, AppError> {
    let db = &state.db;
    let deadline = state.deadline;
    let id = req.id.as_deref().unwrap_or_default();

    let response = match req.intent {
        Intent::List => {
            let (rows, total) = CrudService::list(db, table, &req, deadline).await?;
            success_many(rows, total).into_response()
        }
        Intent::GetOne => success_one(CrudService::read(db, table, id, deadline).await?).into_response(),
        Intent::Create => {
            let payload = req
                .body
                .as_ref()
                .ok_or_else(|| AppError::BadRequest("missing request body".into()))?;
            created(CrudService::create(db, table, payload, deadline).await?).into_response()
        }
        Intent::Update => {
            let body = match &req.body {
                Some(Payload::One(body)) => body,
                _ => return Err(AppError::BadRequest("body must be a JSON object".into())),
            };
            success_one(CrudService::update(db, table, id, body, deadline).await?).into_response()
        }
        Intent::Delete => {
            CrudService::delete(db, table, id, deadline).await?;
            StatusCode::NO_CONTENT.into_response()
        }
    };
    Ok(response)
}

/// Any path no route matches.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

/// A known path asked for with a method it does not serve.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
