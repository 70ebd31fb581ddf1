//! Shared application state for all routes. The registry is built before serving and never changes.

use crate::db::Database;
use crate::schema::TableRegistry;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub registry: Arc<TableRegistry>,
    /// Deadline for each database operation.
    pub deadline: Duration,
}

impl AppState {
    pub fn new(db: Database, registry: TableRegistry, deadline: Duration) -> Self {
        Self {
            db,
            registry: Arc::new(registry),
            deadline,
        }
    }
}
