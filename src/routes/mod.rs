//! HTTP surface: `/api/v1` entity routes from the route table plus health/readiness/version.

mod common;
mod entity;
pub mod table;

pub use common::common_routes;
pub use entity::entity_routes;
pub use table::RouteTable;

use crate::config::Settings;
use crate::error::ConfigError;
use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub const API_PREFIX: &str = "/api/v1";

/// Validate the route table against the state's schema and build the full application router.
pub fn app(state: AppState, settings: &Settings) -> Result<Router, ConfigError> {
    let table = RouteTable::forestry();
    table.validate(&state.schema)?;
    tracing::debug!(routes = %table.describe(), "route table");

    Ok(Router::new()
        .nest(API_PREFIX, entity_routes(&table, state.clone()))
        .merge(common_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(settings.body_limit_bytes)),
        ))
}
