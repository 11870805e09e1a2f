//! Entity handlers: one dispatcher per route-table endpoint (list, create, retrieve, replace, update, delete).

use crate::error::AppError;
use crate::response::{success_many, success_one, success_one_ok};
use crate::routes::table::{Action, Endpoint};
use crate::service::{CrudService, WriteMode};
use crate::state::AppState;
use crate::store::RecordId;
use crate::views::ViewBuilder;
use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::collections::HashMap;

fn path_id(params: &HashMap<String, String>, name: &str) -> Result<RecordId, AppError> {
    let raw = params
        .get(name)
        .ok_or_else(|| AppError::BadRequest(format!("missing path parameter {}", name)))?;
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid {}: '{}'", name, raw)))
}

/// An empty body is treated as `{}` so missing fields surface as validation errors.
fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))
}

pub async fn dispatch(
    state: AppState,
    endpoint: Endpoint,
    params: HashMap<String, String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let entity = state.schema.entity(endpoint.entity)?;
    let store = state.store.as_ref();
    let views = ViewBuilder::new(store, &state.schema);
    let scope = match endpoint.scope {
        Some(scope) => Some((scope.column, path_id(&params, scope.param)?)),
        None => None,
    };

    match endpoint.action {
        Action::List => {
            let rows = CrudService::list(store, entity, scope).await?;
            let data = views.many(entity, rows, endpoint.projection).await?;
            Ok(success_many(data).into_response())
        }
        Action::Create => {
            let row = CrudService::create(store, entity, parse_body(&body)?, scope).await?;
            let data = views.one(entity, row, endpoint.projection).await?;
            Ok(success_one(data).into_response())
        }
        Action::Retrieve => {
            let row = CrudService::retrieve(store, entity, path_id(&params, "id")?).await?;
            let data = views.one(entity, row, endpoint.projection).await?;
            Ok(success_one_ok(data).into_response())
        }
        Action::Replace | Action::Update => {
            let mode = if endpoint.action == Action::Replace {
                WriteMode::Replace
            } else {
                WriteMode::Partial
            };
            let id = path_id(&params, "id")?;
            let row = CrudService::update(store, entity, id, parse_body(&body)?, mode).await?;
            let data = views.one(entity, row, endpoint.projection).await?;
            Ok(success_one_ok(data).into_response())
        }
        Action::Delete => {
            CrudService::delete(store, entity, path_id(&params, "id")?).await?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}
