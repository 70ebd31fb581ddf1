//! HTTP handlers for table CRUD and schema inspection.

pub mod schema;
pub mod table;
pub use schema::*;
pub use table::*;
