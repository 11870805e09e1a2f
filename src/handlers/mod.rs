//! HTTP handlers for entity CRUD.

pub mod entity;
pub use entity::dispatch;
