//! Entity CRUD routes built from the route table. Each (verb, template) pair gets a
//! handler that carries its endpoint; routes sharing a template share one MethodRouter.

use crate::handlers::dispatch;
use crate::routes::table::RouteTable;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::MethodRouter,
    Router,
};
use std::collections::{BTreeMap, HashMap};

pub fn entity_routes(table: &RouteTable, state: AppState) -> Router {
    let mut by_template: BTreeMap<&str, MethodRouter<AppState>> = BTreeMap::new();
    for route in table.routes() {
        let endpoint = route.endpoint;
        let handler = move |State(state): State<AppState>,
                            params: Option<Path<HashMap<String, String>>>,
                            body: Bytes| async move {
            let params = params.map(|Path(p)| p).unwrap_or_default();
            dispatch(state, endpoint, params, body).await
        };
        let methods = by_template
            .remove(route.template.as_str())
            .unwrap_or_else(MethodRouter::new)
            .on(route.verb.filter(), handler);
        by_template.insert(route.template.as_str(), methods);
    }

    let mut router = Router::new();
    for (template, methods) in by_template {
        router = router.route(template, methods);
    }
    router.with_state(state)
}
