//! CrudService: generic CRUD over the entity store, with payload validation.

mod crud;
mod validation;
pub use crud::{CrudService, ParentScope};
pub use validation::{RequestValidator, WriteMode};
