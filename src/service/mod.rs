//! CrudService: generic CRUD over the table registry using the safe SQL builder.

mod crud;
pub use crud::CrudService;
