//! forest-inventory server: reads settings from the environment, prepares the store, serves the API.

use forest_inventory::{
    app, apply_migrations, ensure_database_exists, forestry_schema, validate, AppState, MemoryStore, PgStore,
    Settings, StoreHandle,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("forest_inventory=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let schema = Arc::new(forestry_schema());
    validate(&schema)?;

    let store: StoreHandle = match &settings.database_url {
        Some(database_url) => {
            ensure_database_exists(database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(database_url)
                .await?;
            apply_migrations(&pool, &schema, &settings.db_schema).await?;
            tracing::info!(schema = %settings.db_schema, "using PostgreSQL store");
            Arc::new(PgStore::new(pool, settings.db_schema.clone()))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
            Arc::new(MemoryStore::new(schema.clone()))
        }
    };

    let router = app(AppState::new(store, schema), &settings)?;
    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("forest-inventory listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
