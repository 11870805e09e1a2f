//! PostgreSQL backend. Constraints (unique, foreign key with cascade, choice
//! checks) live in the tables created by `migration`; this module maps their
//! violations back onto the error taxonomy.

use crate::config::{ColumnKind, EntityDef};
use crate::error::{AppError, ConfigError, FieldErrors};
use crate::sql::{self, QueryBuf};
use crate::store::traits::{record_id, EntityStore, Filter, Record, RecordId};
use crate::store::{reference_violation, unique_violation, REQUIRED_MESSAGE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgDatabaseError, PgRow};
use sqlx::{ConnectOptions, PgPool, Row};
use std::str::FromStr;

const NOT_NULL_VIOLATION: &str = "23502";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema_name: String,
}

impl PgStore {
    pub fn new(pool: PgPool, schema_name: impl Into<String>) -> Self {
        PgStore {
            pool,
            schema_name: schema_name.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run(&self, entity: &EntityDef, q: QueryBuf, values: Option<&Record>) -> Result<Vec<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = p.bind_to(query);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(entity, values, e))?;
        rows.iter().map(|row| decode_row(entity, row)).collect()
    }

    async fn run_one(&self, entity: &EntityDef, q: QueryBuf, values: Option<&Record>) -> Result<Option<Record>, AppError> {
        Ok(self.run(entity, q, values).await?.into_iter().next())
    }
}

fn decode_row(entity: &EntityDef, row: &PgRow) -> Result<Record, AppError> {
    let mut record = Record::new();
    for col in &entity.columns {
        let value = match col.kind {
            ColumnKind::Serial | ColumnKind::Integer | ColumnKind::ForeignKey { .. } => {
                row.try_get::<Option<i64>, _>(col.name)?.map(Value::from)
            }
            ColumnKind::Float => row.try_get::<Option<f64>, _>(col.name)?.map(Value::from),
            ColumnKind::Text { .. } | ColumnKind::Choice(_) => {
                row.try_get::<Option<String>, _>(col.name)?.map(Value::from)
            }
            ColumnKind::CreatedAt => row
                .try_get::<Option<DateTime<Utc>>, _>(col.name)?
                .map(|t| Value::from(t.to_rfc3339())),
        };
        record.insert(col.name.to_string(), value.unwrap_or(Value::Null));
    }
    Ok(record)
}

/// Constraint names follow PostgreSQL's defaults: `{table}_{column}_key`,
/// `{table}_{column}_fkey`, `{table}_{column}_check`.
fn classify(entity: &EntityDef, values: Option<&Record>, err: sqlx::Error) -> AppError {
    let Some(db) = err.as_database_error() else {
        return AppError::Db(err);
    };
    let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
    let constraint = db.constraint().unwrap_or_default().to_string();
    let null_column = db
        .try_downcast_ref::<PgDatabaseError>()
        .and_then(|e| e.column())
        .map(String::from);
    let column = |suffix: &str| {
        entity
            .columns
            .iter()
            .find(|c| constraint == format!("{}_{}_{}", entity.table, c.name, suffix))
    };

    match code.as_str() {
        UNIQUE_VIOLATION => match column("key") {
            Some(col) => unique_violation(entity, col.name),
            None => AppError::Conflict(format!("{} violates {}", entity.kind, constraint)),
        },
        FOREIGN_KEY_VIOLATION => match column("fkey").and_then(|c| c.foreign_target().map(|t| (c, t))) {
            Some((col, target)) => reference_violation(col.name, target, values.and_then(|v| record_id(v, col.name))),
            None => AppError::Reference(format!("{} violates {}", entity.kind, constraint)),
        },
        NOT_NULL_VIOLATION => {
            let field = null_column.unwrap_or_else(|| "non_field_errors".to_string());
            AppError::Validation(FieldErrors::single(&field, REQUIRED_MESSAGE))
        }
        CHECK_VIOLATION => match column("check") {
            Some(col) => AppError::Validation(FieldErrors::single(col.name, "Not a valid choice.")),
            None => AppError::Db(err),
        },
        _ => AppError::Db(err),
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn insert(&self, entity: &EntityDef, values: Record) -> Result<Record, AppError> {
        let q = sql::insert(&self.schema_name, entity, &values);
        self.run_one(entity, q, Some(&values))
            .await?
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn fetch(&self, entity: &EntityDef, id: RecordId) -> Result<Option<Record>, AppError> {
        let q = sql::select_by_id(&self.schema_name, entity, id);
        self.run_one(entity, q, None).await
    }

    async fn fetch_many(&self, entity: &EntityDef, filter: &Filter) -> Result<Vec<Record>, AppError> {
        let q = sql::select_many(&self.schema_name, entity, filter);
        self.run(entity, q, None).await
    }

    async fn update(&self, entity: &EntityDef, id: RecordId, values: Record) -> Result<Option<Record>, AppError> {
        let q = sql::update(&self.schema_name, entity, id, &values);
        self.run_one(entity, q, Some(&values)).await
    }

    async fn delete(&self, entity: &EntityDef, id: RecordId) -> Result<bool, AppError> {
        let q = sql::delete(&self.schema_name, entity, id);
        tracing::debug!(sql = %q.sql, id, "delete");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = p.bind_to(query);
        }
        let deleted = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(entity, None, e))?;
        Ok(deleted.is_some())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url).map_err(|e| ConfigError::InvalidSetting {
        name: "DATABASE_URL",
        reason: e.to_string(),
    })?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let path_start = url.rfind('/').ok_or_else(|| ConfigError::InvalidSetting {
        name: "DATABASE_URL",
        reason: "no database path".into(),
    })? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}
