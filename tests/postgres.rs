//! PostgreSQL smoke test. Runs only when FOREST_TEST_DATABASE_URL points at a database
//! the test may create a schema in; otherwise it returns early.

use forest_inventory::{apply_migrations, forestry_schema, AppError, EntityStore, PgStore};
use forest_inventory::config::EntityKind;
use forest_inventory::store::{record_id, Filter};
use serde_json::json;

#[tokio::test]
async fn postgres_store_enforces_constraints_and_cascades() {
    let Ok(url) = std::env::var("FOREST_TEST_DATABASE_URL") else {
        return;
    };
    let db_schema = format!("forest_test_{}", std::process::id());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .unwrap();
    let schema = forestry_schema();
    apply_migrations(&pool, &schema, &db_schema).await.unwrap();
    // Idempotent.
    apply_migrations(&pool, &schema, &db_schema).await.unwrap();
    let store = PgStore::new(pool.clone(), db_schema.clone());
    store.ping().await.unwrap();

    let entity = |kind| schema.get(kind).unwrap();
    let obj = |v: serde_json::Value| v.as_object().unwrap().clone();

    let project = store
        .insert(
            entity(EntityKind::Project),
            obj(json!({"name": "Test Project A", "land_owner": "Test Owner A", "measurement_system": "metric"})),
        )
        .await
        .unwrap();
    let project_id = record_id(&project, "id").unwrap();
    assert!(project["date"].is_string());

    let stand = obj(json!({"project_id": project_id, "identification": 3, "location": "Test County", "origin_year": 1945, "size": 12.5}));
    let created = store.insert(entity(EntityKind::Stand), stand.clone()).await.unwrap();
    assert_eq!(created["size"], json!(12.5));

    let dup = store.insert(entity(EntityKind::Stand), stand).await.unwrap_err();
    assert!(matches!(dup, AppError::Conflict(_)), "{dup}");

    let dangling = obj(json!({"project_id": project_id + 1000, "identification": 4, "location": "X", "origin_year": 1, "size": 1.0}));
    let err = store.insert(entity(EntityKind::Stand), dangling).await.unwrap_err();
    assert!(matches!(err, AppError::Reference(_)), "{err}");

    let stands = store
        .fetch_many(entity(EntityKind::Stand), &Filter::Eq("project_id", project_id))
        .await
        .unwrap();
    assert_eq!(stands.len(), 1);

    assert!(store.delete(entity(EntityKind::Project), project_id).await.unwrap());
    let stands = store.fetch_many(entity(EntityKind::Stand), &Filter::All).await.unwrap();
    assert!(stands.is_empty());

    sqlx::query(&format!("DROP SCHEMA \"{}\" CASCADE", db_schema))
        .execute(&pool)
        .await
        .unwrap();
}
