//! Safe SQL builder: identifiers from the table model only, values as parameters.

mod builder;
pub mod dialect;
pub mod params;
pub use builder::*;
pub use dialect::{quoted, Dialect};
pub use params::*;
