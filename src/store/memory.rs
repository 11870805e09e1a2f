//! In-memory store for development and tests. One lock guards every table, so
//! each write (constraint checks and cascades included) is atomic.

use crate::config::{ColumnKind, EntityDef, EntityKind, Schema, PRIMARY_KEY};
use crate::error::{AppError, FieldErrors};
use crate::store::traits::{record_id, EntityStore, Filter, Record, RecordId};
use crate::store::{reference_violation, unique_violation, REQUIRED_MESSAGE};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<EntityKind, BTreeMap<RecordId, Record>>,
    next_id: HashMap<EntityKind, RecordId>,
}

impl Tables {
    fn table(&self, kind: EntityKind) -> Option<&BTreeMap<RecordId, Record>> {
        self.rows.get(&kind)
    }

    fn contains(&self, kind: EntityKind, id: RecordId) -> bool {
        self.table(kind).map_or(false, |t| t.contains_key(&id))
    }

    fn allocate_id(&mut self, kind: EntityKind) -> RecordId {
        let next = self.next_id.entry(kind).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }
}

pub struct MemoryStore {
    schema: Arc<Schema>,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(schema: Arc<Schema>) -> Self {
        MemoryStore {
            schema,
            tables: RwLock::new(Tables::default()),
        }
    }

    fn check_constraints(
        tables: &Tables,
        entity: &EntityDef,
        record: &Record,
        self_id: Option<RecordId>,
    ) -> Result<(), AppError> {
        let mut missing = FieldErrors::new();
        for col in entity.writable_columns() {
            if record.get(col.name).map_or(true, Value::is_null) {
                missing.add(col.name, REQUIRED_MESSAGE);
            }
        }
        missing.into_result()?;

        for col in entity.foreign_keys() {
            let ColumnKind::ForeignKey { target, .. } = col.kind else { continue };
            let id = record_id(record, col.name);
            if !id.map_or(false, |id| tables.contains(target, id)) {
                return Err(reference_violation(col.name, target, id));
            }
        }

        for col in entity.columns.iter().filter(|c| c.unique) {
            let value = record.get(col.name);
            let taken = tables.table(entity.kind).map_or(false, |rows| {
                rows.iter()
                    .any(|(id, row)| Some(*id) != self_id && row.get(col.name) == value)
            });
            if taken {
                return Err(unique_violation(entity, col.name));
            }
        }
        Ok(())
    }

    /// Depth-first walk of every row reachable through foreign keys pointing at (kind, id).
    fn collect_cascade(
        &self,
        tables: &Tables,
        kind: EntityKind,
        id: RecordId,
        out: &mut Vec<(EntityKind, RecordId)>,
        seen: &mut HashSet<(EntityKind, RecordId)>,
    ) {
        if !seen.insert((kind, id)) {
            return;
        }
        out.push((kind, id));
        for (child, col) in self.schema.referencing(kind) {
            let Some(rows) = tables.table(child.kind) else { continue };
            let dependents: Vec<RecordId> = rows
                .iter()
                .filter(|(_, row)| record_id(row, col.name) == Some(id))
                .map(|(child_id, _)| *child_id)
                .collect();
            for child_id in dependents {
                self.collect_cascade(tables, child.kind, child_id, out, seen);
            }
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert(&self, entity: &EntityDef, values: Record) -> Result<Record, AppError> {
        let mut tables = self.tables.write();
        let mut record = Record::new();
        for col in &entity.columns {
            match col.kind {
                ColumnKind::Serial => {}
                ColumnKind::CreatedAt => {
                    record.insert(col.name.into(), Value::String(chrono::Utc::now().to_rfc3339()));
                }
                _ => {
                    record.insert(col.name.into(), values.get(col.name).cloned().unwrap_or(Value::Null));
                }
            }
        }
        Self::check_constraints(&tables, entity, &record, None)?;

        let id = tables.allocate_id(entity.kind);
        record.insert(PRIMARY_KEY.into(), Value::from(id));
        tables
            .rows
            .entry(entity.kind)
            .or_default()
            .insert(id, record.clone());
        tracing::debug!(entity = %entity.kind, id, "inserted");
        Ok(record)
    }

    async fn fetch(&self, entity: &EntityDef, id: RecordId) -> Result<Option<Record>, AppError> {
        let tables = self.tables.read();
        Ok(tables.table(entity.kind).and_then(|t| t.get(&id)).cloned())
    }

    async fn fetch_many(&self, entity: &EntityDef, filter: &Filter) -> Result<Vec<Record>, AppError> {
        let tables = self.tables.read();
        let Some(rows) = tables.table(entity.kind) else {
            return Ok(Vec::new());
        };
        let mut out: Vec<Record> = rows
            .values()
            .filter(|row| match filter {
                Filter::All => true,
                Filter::Eq(col, id) => record_id(row, col) == Some(*id),
                Filter::In(col, ids) => record_id(row, col).map_or(false, |v| ids.contains(&v)),
            })
            .cloned()
            .collect();
        sort_records(entity, &mut out);
        Ok(out)
    }

    async fn update(
        &self,
        entity: &EntityDef,
        id: RecordId,
        values: Record,
    ) -> Result<Option<Record>, AppError> {
        let mut tables = self.tables.write();
        let Some(mut record) = tables.table(entity.kind).and_then(|t| t.get(&id)).cloned() else {
            return Ok(None);
        };
        for (key, value) in values {
            if entity.column(&key).map_or(false, |c| !c.is_read_only()) {
                record.insert(key, value);
            }
        }
        Self::check_constraints(&tables, entity, &record, Some(id))?;
        tables
            .rows
            .entry(entity.kind)
            .or_default()
            .insert(id, record.clone());
        tracing::debug!(entity = %entity.kind, id, "updated");
        Ok(Some(record))
    }

    async fn delete(&self, entity: &EntityDef, id: RecordId) -> Result<bool, AppError> {
        let mut tables = self.tables.write();
        if !tables.contains(entity.kind, id) {
            return Ok(false);
        }
        let mut doomed = Vec::new();
        self.collect_cascade(&tables, entity.kind, id, &mut doomed, &mut HashSet::new());
        for (kind, row_id) in &doomed {
            if let Some(rows) = tables.rows.get_mut(kind) {
                rows.remove(row_id);
            }
        }
        tracing::debug!(entity = %entity.kind, id, removed = doomed.len(), "deleted with cascade");
        Ok(true)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

fn sort_records(entity: &EntityDef, rows: &mut [Record]) {
    let keys = entity.full_order();
    rows.sort_by(|a, b| {
        for key in &keys {
            let ord = compare_values(a.get(key.column), b.get(key.column));
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::forestry_schema;
    use serde_json::json;

    fn store() -> (MemoryStore, Arc<Schema>) {
        let schema = Arc::new(forestry_schema());
        (MemoryStore::new(schema.clone()), schema)
    }

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    async fn insert(store: &MemoryStore, schema: &Schema, kind: EntityKind, value: Value) -> Record {
        store.insert(schema.get(kind).unwrap(), rec(value)).await.unwrap()
    }

    async fn project(store: &MemoryStore, schema: &Schema, name: &str) -> RecordId {
        let row = insert(
            store,
            schema,
            EntityKind::Project,
            json!({"name": name, "land_owner": "Owner", "measurement_system": "metric"}),
        )
        .await;
        record_id(&row, "id").unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_timestamp() {
        let (store, schema) = store();
        let row = insert(
            &store,
            &schema,
            EntityKind::Project,
            json!({"name": "A", "land_owner": "O", "measurement_system": "english"}),
        )
        .await;
        assert_eq!(row["id"], json!(1));
        assert!(row["date"].as_str().unwrap().contains('T'));
        let second = project(&store, &schema, "B").await;
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn unique_identification_spans_projects() {
        let (store, schema) = store();
        let a = project(&store, &schema, "A").await;
        let b = project(&store, &schema, "B").await;
        let stands = schema.get(EntityKind::Stand).unwrap();
        let stand = |project_id: RecordId| {
            rec(json!({"project_id": project_id, "identification": 3, "location": "L", "origin_year": 1945, "size": 1.5}))
        };
        store.insert(stands, stand(a)).await.unwrap();
        let err = store.insert(stands, stand(b)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err}");
    }

    #[tokio::test]
    async fn update_may_keep_its_own_unique_value() {
        let (store, schema) = store();
        let p = project(&store, &schema, "A").await;
        let stands = schema.get(EntityKind::Stand).unwrap();
        let row = store
            .insert(
                stands,
                rec(json!({"project_id": p, "identification": 3, "location": "L", "origin_year": 1945, "size": 1.5})),
            )
            .await
            .unwrap();
        let id = record_id(&row, "id").unwrap();
        let updated = store
            .update(stands, id, rec(json!({"identification": 3, "location": "M"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["location"], json!("M"));
        assert!(store.update(stands, 99, Record::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dangling_foreign_key_is_a_reference_error() {
        let (store, schema) = store();
        let err = store
            .insert(
                schema.get(EntityKind::Stand).unwrap(),
                rec(json!({"project_id": 42, "identification": 1, "location": "L", "origin_year": 2000, "size": 1.0})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Reference(_)), "{err}");
    }

    #[tokio::test]
    async fn missing_column_is_a_validation_error() {
        let (store, schema) = store();
        let err = store
            .insert(schema.get(EntityKind::Project).unwrap(), rec(json!({"name": "A"})))
            .await
            .unwrap_err();
        let AppError::Validation(fields) = err else { panic!("expected validation error") };
        assert!(fields.get("land_owner").is_some());
        assert!(fields.get("measurement_system").is_some());
    }

    #[tokio::test]
    async fn deleting_project_cascades_to_trees() {
        let (store, schema) = store();
        let p = project(&store, &schema, "A").await;
        let stand = insert(
            &store,
            &schema,
            EntityKind::Stand,
            json!({"project_id": p, "identification": 1, "location": "L", "origin_year": 2000, "size": 1.0}),
        )
        .await;
        let plot = insert(
            &store,
            &schema,
            EntityKind::Plot,
            json!({"stand_id": stand["id"], "number": 7, "latitude": 1.0, "longitude": 2.0, "slope": 3.0, "aspect": "N"}),
        )
        .await;
        let reference = insert(
            &store,
            &schema,
            EntityKind::TreeReference,
            json!({"symbol": "DF", "scientific_name": "Pseudotsuga menziesii", "common_name": "Douglas-fir", "family": "Pinaceae", "max_density_index": 595}),
        )
        .await;
        let tree = insert(
            &store,
            &schema,
            EntityKind::Tree,
            json!({"plot_id": plot["id"], "symbol": reference["id"], "count": 1, "dbh": 12.5, "height": 80.0, "live_crown_ratio": 40}),
        )
        .await;

        assert!(store.delete(schema.get(EntityKind::Project).unwrap(), p).await.unwrap());
        for (kind, row) in [(EntityKind::Stand, &stand), (EntityKind::Plot, &plot), (EntityKind::Tree, &tree)] {
            let id = record_id(row, "id").unwrap();
            assert!(store.fetch(schema.get(kind).unwrap(), id).await.unwrap().is_none());
        }
        let refs = schema.get(EntityKind::TreeReference).unwrap();
        assert!(store.fetch(refs, 1).await.unwrap().is_some());
        assert!(!store.delete(schema.get(EntityKind::Project).unwrap(), p).await.unwrap());
    }

    #[tokio::test]
    async fn fetch_many_orders_projects_by_name_descending() {
        let (store, schema) = store();
        for name in ["Beta", "Alpha", "Gamma"] {
            project(&store, &schema, name).await;
        }
        let rows = store
            .fetch_many(schema.get(EntityKind::Project).unwrap(), &Filter::All)
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["Gamma", "Beta", "Alpha"]);
    }

    #[tokio::test]
    async fn fetch_many_in_filter_selects_subset() {
        let (store, schema) = store();
        let a = project(&store, &schema, "A").await;
        let b = project(&store, &schema, "B").await;
        let designs = schema.get(EntityKind::SampleDesign).unwrap();
        for p in [a, b, b] {
            store
                .insert(
                    designs,
                    rec(json!({"project_id": p, "sample_type": "BAF", "factor": 20, "variable": "DBH", "min_value": 0.0, "max_value": 40.0})),
                )
                .await
                .unwrap();
        }
        let only_b = store.fetch_many(designs, &Filter::In("project_id", vec![b])).await.unwrap();
        assert_eq!(only_b.len(), 2);
        let none = store.fetch_many(designs, &Filter::In("project_id", vec![])).await.unwrap();
        assert!(none.is_empty());
    }
}
