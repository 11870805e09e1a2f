//! Entity storage: the `EntityStore` trait with PostgreSQL and in-memory backends.

mod memory;
mod postgres;
mod traits;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};
pub use traits::{record_id, EntityStore, Filter, Record, RecordId, StoreHandle};

use crate::config::{EntityDef, EntityKind};
use crate::error::AppError;

pub(crate) const REQUIRED_MESSAGE: &str = "This field is required.";

pub(crate) fn unique_violation(entity: &EntityDef, column: &str) -> AppError {
    AppError::Conflict(format!("{} with this {} already exists", entity.kind, column))
}

pub(crate) fn reference_violation(column: &str, target: EntityKind, id: Option<RecordId>) -> AppError {
    match id {
        Some(id) => AppError::Reference(format!("{}: {} {} does not exist", column, target, id)),
        None => AppError::Reference(format!("{}: expected a {} key", column, target)),
    }
}
