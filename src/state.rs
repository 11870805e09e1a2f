//! Shared application state for all routes.

use crate::config::Schema;
use crate::store::StoreHandle;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    /// Validated once at startup; never mutated afterwards.
    pub schema: Arc<Schema>,
}

impl AppState {
    pub fn new(store: StoreHandle, schema: Arc<Schema>) -> Self {
        AppState { store, schema }
    }
}
