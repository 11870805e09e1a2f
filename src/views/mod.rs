//! Response shaping. Each endpoint picks a `Projection`; nested levels and
//! expanded references are loaded with one batched query per level.

mod stand;

pub use stand::StandSummary;

use crate::config::{ColumnDef, EntityDef, EntityKind, Schema, PRIMARY_KEY};
use crate::error::{AppError, ConfigError};
use crate::store::{record_id, EntityStore, Filter, Record, RecordId};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    /// Stored fields as-is.
    Flat,
    /// Non-owner foreign keys replaced by the referenced record.
    Expanded,
    /// Owned children embedded recursively.
    Detail,
    /// Denormalized stand summary.
    Aggregated,
}

impl Projection {
    pub fn as_str(self) -> &'static str {
        match self {
            Projection::Flat => "flat",
            Projection::Expanded => "expanded",
            Projection::Detail => "detail",
            Projection::Aggregated => "aggregated",
        }
    }
}

/// Key under which a parent embeds its children in `Detail` views.
pub fn child_key(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Project => "projects",
        EntityKind::SampleDesign => "sample_design",
        EntityKind::Stand => "stands",
        EntityKind::Plot => "plots",
        EntityKind::TreeReference => "tree_references",
        EntityKind::Tree => "trees",
    }
}

pub struct ViewBuilder<'a> {
    store: &'a dyn EntityStore,
    schema: &'a Schema,
}

impl<'a> ViewBuilder<'a> {
    pub fn new(store: &'a dyn EntityStore, schema: &'a Schema) -> Self {
        ViewBuilder { store, schema }
    }

    pub async fn one(&self, entity: &EntityDef, record: Record, projection: Projection) -> Result<Value, AppError> {
        let mut shaped = self.many(entity, vec![record], projection).await?;
        Ok(shaped.pop().unwrap_or(Value::Null))
    }

    pub async fn many(
        &self,
        entity: &EntityDef,
        records: Vec<Record>,
        projection: Projection,
    ) -> Result<Vec<Value>, AppError> {
        let rows = match projection {
            Projection::Flat => records,
            Projection::Expanded => self.expand(entity, records).await?,
            Projection::Detail => self.nest(entity, records).await?,
            Projection::Aggregated => {
                let mut out = Vec::with_capacity(records.len());
                for stand in records {
                    let summary = self.stand_summary(stand).await?;
                    out.push(serde_json::to_value(summary).map_err(|e| ConfigError::Validation(e.to_string()))?);
                }
                return Ok(out);
            }
        };
        Ok(rows.into_iter().map(Value::Object).collect())
    }

    /// Replace each reference key with the full referenced row.
    async fn expand(&self, entity: &EntityDef, mut rows: Vec<Record>) -> Result<Vec<Record>, AppError> {
        let references: Vec<&ColumnDef> = entity.foreign_keys().filter(|c| !c.is_owner()).collect();
        for col in references {
            let Some(target) = col.foreign_target() else { continue };
            let target = self.schema.entity(target)?;
            let by_id = self.load_by_id(target, ids_in(&rows, col.name)).await?;
            for row in &mut rows {
                if let Some(referenced) = record_id(row, col.name).and_then(|id| by_id.get(&id)) {
                    row.insert(col.name.to_string(), Value::Object(referenced.clone()));
                }
            }
        }
        Ok(rows)
    }

    /// Embed owned children level by level (Project → Stand → Plot → Tree).
    fn nest<'b>(&'b self, entity: &'b EntityDef, mut rows: Vec<Record>) -> BoxFuture<'b, Result<Vec<Record>, AppError>> {
        Box::pin(async move {
            let parent_ids = ids_in(&rows, PRIMARY_KEY);
            for (child, owner) in self.schema.children(entity.kind) {
                let children = self
                    .store
                    .fetch_many(child, &Filter::In(owner.name, parent_ids.clone()))
                    .await?;
                let children = self.nest(child, children).await?;
                let mut grouped: HashMap<RecordId, Vec<Value>> = HashMap::new();
                for row in children {
                    if let Some(parent) = record_id(&row, owner.name) {
                        grouped.entry(parent).or_default().push(Value::Object(row));
                    }
                }
                for row in &mut rows {
                    let embedded = record_id(row, PRIMARY_KEY)
                        .and_then(|id| grouped.remove(&id))
                        .unwrap_or_default();
                    row.insert(child_key(child.kind).to_string(), Value::Array(embedded));
                }
            }
            Ok(rows)
        })
    }

    async fn load_by_id(&self, entity: &EntityDef, ids: Vec<RecordId>) -> Result<HashMap<RecordId, Record>, AppError> {
        let rows = self.store.fetch_many(entity, &Filter::In(PRIMARY_KEY, ids)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| record_id(&row, PRIMARY_KEY).map(|id| (id, row)))
            .collect())
    }
}

/// Distinct integer keys under `column`, in first-seen order.
fn ids_in(rows: &[Record], column: &str) -> Vec<RecordId> {
    let mut ids = Vec::new();
    for id in rows.iter().filter_map(|r| record_id(r, column)) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
