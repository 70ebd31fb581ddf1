//! Typed errors and HTTP mapping.

use crate::response::Envelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::error::ErrorKind;
use thiserror::Error;

/// SQLSTATE class 22 (data exception): a bound value the column type cannot hold.
const DATA_EXCEPTION_CLASS: &str = "22";

/// Startup-fatal: the catalog could not be read, so no table can be served.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("catalog query failed: {0}")]
    Catalog(#[from] sqlx::Error),
    #[error("table '{table}': {message}")]
    Table { table: String, message: String },
}

/// Settings could not be read from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("unsupported database url scheme: {0}")]
    UnsupportedDatabase(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("database operation timed out")]
    Timeout,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Db(e) => match db_error_kind(e) {
                Some(ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation) => StatusCode::CONFLICT,
                Some(ErrorKind::NotNullViolation | ErrorKind::CheckViolation) => StatusCode::BAD_REQUEST,
                _ if is_data_exception(e) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the client. Raw driver text never leaves the process.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Db(e) => match db_error_kind(e) {
                Some(ErrorKind::UniqueViolation) => "conflict: unique constraint violated".into(),
                Some(ErrorKind::ForeignKeyViolation) => "conflict: foreign key constraint violated".into(),
                Some(ErrorKind::NotNullViolation) => "bad request: required column is missing".into(),
                Some(ErrorKind::CheckViolation) => "bad request: check constraint violated".into(),
                _ if is_data_exception(e) => "bad request: value does not fit the column type".into(),
                _ => "internal server error".into(),
            },
            AppError::Internal(_) => "internal server error".into(),
            other => other.to_string(),
        }
    }
}

fn db_error_kind(e: &sqlx::Error) -> Option<ErrorKind> {
    match e {
        sqlx::Error::Database(db) => Some(db.kind()),
        _ => None,
    }
}

/// PostgreSQL reports malformed or out-of-range input (`22003`, `22P02`, `22008`) under class 22.
/// SQLSTATE codes are five characters, which keeps SQLite's numeric result codes out.
fn is_data_exception(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| code.len() == 5 && code.starts_with(DATA_EXCEPTION_CLASS)),
        _ => false,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(Envelope::failure(self.client_message()))).into_response()
    }
}
