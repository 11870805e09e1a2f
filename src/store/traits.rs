//! Storage abstraction: the same CRUD contract backed by PostgreSQL or by memory.

use crate::config::EntityDef;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One stored row, keyed by column name.
pub type Record = Map<String, Value>;

pub type RecordId = i64;

/// Row selection for `fetch_many`.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    All,
    Eq(&'static str, RecordId),
    /// Batch load for eager nesting; an empty list selects nothing.
    In(&'static str, Vec<RecordId>),
}

/// Referential integrity lives here: unique columns, foreign keys that must
/// point at existing rows, and cascade delete along every foreign key.
#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    /// Insert a row; the store assigns `id` and any creation timestamp.
    ///
    /// Fails with `Conflict` on a duplicate unique value, `Reference` when a
    /// foreign key points nowhere, and `Validation` when a column is missing.
    async fn insert(&self, entity: &EntityDef, values: Record) -> Result<Record, AppError>;

    async fn fetch(&self, entity: &EntityDef, id: RecordId) -> Result<Option<Record>, AppError>;

    /// Rows matching `filter`, sorted by the entity's sort key then `id`.
    async fn fetch_many(&self, entity: &EntityDef, filter: &Filter) -> Result<Vec<Record>, AppError>;

    /// Overwrite the given columns. `Ok(None)` when `id` does not exist.
    async fn update(
        &self,
        entity: &EntityDef,
        id: RecordId,
        values: Record,
    ) -> Result<Option<Record>, AppError>;

    /// Delete a row and, transitively, every row referencing it. `Ok(false)` when absent.
    async fn delete(&self, entity: &EntityDef, id: RecordId) -> Result<bool, AppError>;

    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> Result<(), AppError>;
}

pub type StoreHandle = Arc<dyn EntityStore>;

/// Integer key stored under `column`, if present.
pub fn record_id(record: &Record, column: &str) -> Option<RecordId> {
    record.get(column).and_then(Value::as_i64)
}
