//! Forestry inventory backend: projects, stands, plots and trees over a REST API,
//! stored in PostgreSQL or in memory.

pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;
pub mod views;

pub use config::{forestry_schema, validate, Schema, Settings};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use response::{success_many, success_one};
pub use routes::{app, RouteTable};
pub use service::CrudService;
pub use state::AppState;
pub use store::{ensure_database_exists, EntityStore, MemoryStore, PgStore, StoreHandle};
pub use views::{Projection, ViewBuilder};
