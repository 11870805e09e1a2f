//! Generic CRUD over any `EntityStore`: validate, persist, map missing keys to 404.

use crate::config::EntityDef;
use crate::error::AppError;
use crate::service::validation::{RequestValidator, WriteMode};
use crate::store::{EntityStore, Filter, Record, RecordId};
use serde_json::Value;

/// Parent key taken from the request path: (owner column, parent id).
pub type ParentScope = (&'static str, RecordId);

pub struct CrudService;

impl CrudService {
    /// All rows, or the rows owned by one parent. An unknown parent yields an empty list.
    pub async fn list(
        store: &dyn EntityStore,
        entity: &EntityDef,
        scope: Option<ParentScope>,
    ) -> Result<Vec<Record>, AppError> {
        let filter = match scope {
            Some((column, id)) => Filter::Eq(column, id),
            None => Filter::All,
        };
        store.fetch_many(entity, &filter).await
    }

    /// Validate and insert. A path parent overrides any owner key in the body.
    pub async fn create(
        store: &dyn EntityStore,
        entity: &EntityDef,
        mut body: Value,
        scope: Option<ParentScope>,
    ) -> Result<Record, AppError> {
        if let (Some((column, id)), Value::Object(map)) = (scope, &mut body) {
            map.insert(column.to_string(), Value::from(id));
        }
        let values = RequestValidator::validate(entity, body, WriteMode::Create)?;
        let row = store.insert(entity, values).await?;
        tracing::info!(entity = %entity.kind, id = ?row.get("id"), "created");
        Ok(row)
    }

    pub async fn retrieve(store: &dyn EntityStore, entity: &EntityDef, id: RecordId) -> Result<Record, AppError> {
        store.fetch(entity, id).await?.ok_or_else(|| not_found(entity, id))
    }

    /// PUT (`Replace`) or PATCH (`Partial`).
    pub async fn update(
        store: &dyn EntityStore,
        entity: &EntityDef,
        id: RecordId,
        body: Value,
        mode: WriteMode,
    ) -> Result<Record, AppError> {
        let values = RequestValidator::validate(entity, body, mode)?;
        store
            .update(entity, id, values)
            .await?
            .ok_or_else(|| not_found(entity, id))
    }

    /// Delete and cascade to every dependent row.
    pub async fn delete(store: &dyn EntityStore, entity: &EntityDef, id: RecordId) -> Result<(), AppError> {
        if store.delete(entity, id).await? {
            tracing::info!(entity = %entity.kind, id, "deleted");
            Ok(())
        } else {
            Err(not_found(entity, id))
        }
    }
}

fn not_found(entity: &EntityDef, id: RecordId) -> AppError {
    AppError::NotFound(format!("{} {}", entity.kind, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{forestry_schema, EntityKind, Schema};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (MemoryStore, Arc<Schema>) {
        let schema = Arc::new(forestry_schema());
        (MemoryStore::new(schema.clone()), schema)
    }

    #[tokio::test]
    async fn path_parent_overrides_body() {
        let (store, schema) = setup();
        let projects = schema.get(EntityKind::Project).unwrap();
        let stands = schema.get(EntityKind::Stand).unwrap();
        for name in ["A", "B"] {
            let body = json!({"name": name, "land_owner": "O", "measurement_system": "metric"});
            CrudService::create(&store, projects, body, None).await.unwrap();
        }
        let body = json!({"project_id": 1, "identification": 1, "location": "L", "origin_year": 1990, "size": 2.0});
        let stand = CrudService::create(&store, stands, body, Some(("project_id", 2))).await.unwrap();
        assert_eq!(stand["project_id"], json!(2));

        let under_b = CrudService::list(&store, stands, Some(("project_id", 2))).await.unwrap();
        assert_eq!(under_b.len(), 1);
        let under_missing = CrudService::list(&store, stands, Some(("project_id", 99))).await.unwrap();
        assert!(under_missing.is_empty());
    }

    #[tokio::test]
    async fn nested_create_under_missing_parent_is_a_reference_error() {
        let (store, schema) = setup();
        let plots = schema.get(EntityKind::Plot).unwrap();
        let body = json!({"number": 1, "latitude": 1.0, "longitude": 2.0, "slope": 0.0, "aspect": "S"});
        let err = CrudService::create(&store, plots, body, Some(("stand_id", 5))).await.unwrap_err();
        assert!(matches!(err, AppError::Reference(_)), "{err}");
    }

    #[tokio::test]
    async fn missing_keys_are_not_found() {
        let (store, schema) = setup();
        let projects = schema.get(EntityKind::Project).unwrap();
        assert!(matches!(
            CrudService::retrieve(&store, projects, 1).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            CrudService::update(&store, projects, 1, json!({"name": "X"}), WriteMode::Partial).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            CrudService::delete(&store, projects, 1).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn patch_merges_and_put_replaces() {
        let (store, schema) = setup();
        let projects = schema.get(EntityKind::Project).unwrap();
        let body = json!({"name": "A", "land_owner": "O", "measurement_system": "metric"});
        let created = CrudService::create(&store, projects, body, None).await.unwrap();
        let patched = CrudService::update(&store, projects, 1, json!({"land_owner": "P"}), WriteMode::Partial)
            .await
            .unwrap();
        assert_eq!(patched["name"], json!("A"));
        assert_eq!(patched["land_owner"], json!("P"));
        assert_eq!(patched["date"], created["date"]);

        let err = CrudService::update(&store, projects, 1, json!({"name": "B"}), WriteMode::Replace)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
