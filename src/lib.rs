//! Schema-driven REST backend: every table found in the database catalog gets CRUD routes.

pub mod coerce;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mapper;
pub mod request;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;

pub use config::Settings;
pub use db::Database;
pub use error::{AppError, ConfigError, SchemaError};
pub use response::{created, success_many, success_one, Envelope};
pub use routes::{app, app_from_settings, common_routes, schema_routes, table_routes};
pub use schema::{introspect, TableModel, TableRegistry};
pub use service::CrudService;
pub use sql::Dialect;
pub use state::AppState;
