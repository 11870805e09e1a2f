//! Apply the schema mapping table to the database: DDL for the schema, tables, constraints and
//! owner-column indexes. Tables are created parents first so foreign keys resolve.
//! Only additive: every statement is IF NOT EXISTS.

use crate::config::{validate, ColumnDef, ColumnKind, EntityDef, Schema, PRIMARY_KEY};
use crate::error::{AppError, ConfigError};
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;
use std::collections::HashSet;

pub async fn apply_migrations(pool: &PgPool, schema: &Schema, db_schema: &str) -> Result<(), AppError> {
    validate(schema)?;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(db_schema)))
        .execute(pool)
        .await?;

    for entity in creation_order(schema)? {
        let ddl = create_table_sql(db_schema, schema, entity)?;
        tracing::debug!(table = entity.table, sql = %ddl, "ensure table");
        sqlx::query(&ddl).execute(pool).await?;
        for sql in owner_index_sql(db_schema, entity) {
            sqlx::query(&sql).execute(pool).await?;
        }
    }
    tracing::info!(schema = db_schema, tables = schema.entities().len(), "migrations applied");
    Ok(())
}

/// Entities ordered so every foreign-key target precedes the tables referencing it.
pub fn creation_order(schema: &Schema) -> Result<Vec<&EntityDef>, ConfigError> {
    let mut ordered: Vec<&EntityDef> = Vec::new();
    let mut placed = HashSet::new();
    while ordered.len() < schema.entities().len() {
        let before = ordered.len();
        for entity in schema.entities() {
            if placed.contains(&entity.kind) {
                continue;
            }
            let ready = entity
                .foreign_keys()
                .filter_map(ColumnDef::foreign_target)
                .all(|t| t == entity.kind || placed.contains(&t));
            if ready {
                placed.insert(entity.kind);
                ordered.push(entity);
            }
        }
        if ordered.len() == before {
            return Err(ConfigError::Validation("foreign keys form a cycle".into()));
        }
    }
    Ok(ordered)
}

fn column_sql(db_schema: &str, schema: &Schema, table: &str, col: &ColumnDef) -> Result<String, ConfigError> {
    let name = quoted(col.name);
    let constraint = |suffix: &str| quoted(&format!("{}_{}_{}", table, col.name, suffix));
    let mut def = match &col.kind {
        ColumnKind::Serial => return Ok(format!("{} BIGSERIAL PRIMARY KEY", name)),
        ColumnKind::Integer => format!("{} BIGINT NOT NULL", name),
        ColumnKind::Float => format!("{} DOUBLE PRECISION NOT NULL", name),
        ColumnKind::Text { max_length } => format!("{} VARCHAR({}) NOT NULL", name, max_length),
        ColumnKind::Choice(choices) => {
            let width = choices.iter().map(|c| c.len()).max().unwrap_or(1);
            let values: Vec<String> = choices.iter().map(|c| format!("'{}'", c.replace('\'', "''"))).collect();
            format!(
                "{} VARCHAR({}) NOT NULL CONSTRAINT {} CHECK ({} IN ({}))",
                name,
                width,
                constraint("check"),
                name,
                values.join(", ")
            )
        }
        ColumnKind::CreatedAt => format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", name),
        ColumnKind::ForeignKey { target, .. } => {
            let target = schema.entity(*target)?;
            format!(
                "{} BIGINT NOT NULL CONSTRAINT {} REFERENCES {} ({}) ON DELETE CASCADE",
                name,
                constraint("fkey"),
                qualified_table(db_schema, target.table),
                quoted(PRIMARY_KEY)
            )
        }
    };
    if col.unique {
        def.push_str(&format!(" CONSTRAINT {} UNIQUE", constraint("key")));
    }
    Ok(def)
}

pub fn create_table_sql(db_schema: &str, schema: &Schema, entity: &EntityDef) -> Result<String, ConfigError> {
    let col_defs = entity
        .columns
        .iter()
        .map(|c| column_sql(db_schema, schema, entity.table, c))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(db_schema, entity.table),
        col_defs.join(",\n  ")
    ))
}

/// Scoped lists filter on the owner column.
fn owner_index_sql(db_schema: &str, entity: &EntityDef) -> Vec<String> {
    entity
        .owner_column()
        .map(|col| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quoted(&format!("{}_{}_idx", entity.table, col.name)),
                qualified_table(db_schema, entity.table),
                quoted(col.name)
            )
        })
        .into_iter()
        .collect()
}
