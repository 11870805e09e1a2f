//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from entity definitions.

use crate::config::{ColumnDef, EntityDef, PRIMARY_KEY};
use crate::sql::params::SqlParam;
use crate::store::{Filter, Record, RecordId};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from the schema mapping table).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: SqlParam) -> usize {
        self.params.push(v);
        self.params.len()
    }

    fn push_id(&mut self, id: RecordId) -> usize {
        self.push_param(SqlParam::Int(Some(id)))
    }
}

fn select_column_list(entity: &EntityDef) -> String {
    entity
        .columns
        .iter()
        .map(|c| quoted(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_clause(entity: &EntityDef) -> String {
    let keys: Vec<String> = entity
        .full_order()
        .iter()
        .map(|k| {
            if k.descending {
                format!("{} DESC", quoted(k.column))
            } else {
                quoted(k.column)
            }
        })
        .collect();
    format!(" ORDER BY {}", keys.join(", "))
}

/// SELECT by primary key.
pub fn select_by_id(schema: &str, entity: &EntityDef, id: RecordId) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_id(id);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}",
        select_column_list(entity),
        qualified_table(schema, entity.table),
        quoted(PRIMARY_KEY),
        n
    );
    q
}

/// SELECT with an optional key filter, ordered by the entity's sort key.
pub fn select_many(schema: &str, entity: &EntityDef, filter: &Filter) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = match filter {
        Filter::All => String::new(),
        Filter::Eq(col, id) => {
            let n = q.push_id(*id);
            format!(" WHERE {} = ${}", quoted(col), n)
        }
        Filter::In(_, ids) if ids.is_empty() => " WHERE 1 = 0".to_string(),
        Filter::In(col, ids) => {
            let placeholders: Vec<String> = ids.iter().map(|id| format!("${}", q.push_id(*id))).collect();
            format!(" WHERE {} IN ({})", quoted(col), placeholders.join(", "))
        }
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{}",
        select_column_list(entity),
        qualified_table(schema, entity.table),
        where_clause,
        order_clause(entity)
    );
    q
}

fn writable_values<'a>(entity: &'a EntityDef, record: &'a Record) -> impl Iterator<Item = (&'a ColumnDef, &'a Value)> {
    entity
        .writable_columns()
        .filter_map(move |c| record.get(c.name).map(|v| (c, v)))
}

/// INSERT the writable columns present in `record`; `id` and creation timestamps come from column defaults.
pub fn insert(schema: &str, entity: &EntityDef, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (col, value) in writable_values(entity, record) {
        let n = q.push_param(SqlParam::from_json(&col.kind, value));
        cols.push(quoted(col.name));
        placeholders.push(format!("${}", n));
    }
    let table = qualified_table(schema, entity.table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, select_column_list(entity))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            select_column_list(entity)
        )
    };
    q
}

/// UPDATE by id: SET only writable columns present in `record`. With nothing to set, degrades to a SELECT.
pub fn update(schema: &str, entity: &EntityDef, id: RecordId, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (col, value) in writable_values(entity, record) {
        let n = q.push_param(SqlParam::from_json(&col.kind, value));
        sets.push(format!("{} = ${}", quoted(col.name), n));
    }
    if sets.is_empty() {
        return select_by_id(schema, entity, id);
    }
    let n = q.push_id(id);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        qualified_table(schema, entity.table),
        sets.join(", "),
        quoted(PRIMARY_KEY),
        n,
        select_column_list(entity)
    );
    q
}

/// DELETE by id; foreign keys cascade in the database.
pub fn delete(schema: &str, entity: &EntityDef, id: RecordId) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_id(id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${} RETURNING {}",
        qualified_table(schema, entity.table),
        quoted(PRIMARY_KEY),
        n,
        quoted(PRIMARY_KEY)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{forestry_schema, EntityKind};
    use serde_json::json;

    fn entity(kind: EntityKind) -> EntityDef {
        forestry_schema().get(kind).unwrap().clone()
    }

    #[test]
    fn select_many_orders_projects_by_name_desc_then_id() {
        let q = select_many("forest", &entity(EntityKind::Project), &Filter::All);
        assert_eq!(
            q.sql,
            r#"SELECT "id", "name", "land_owner", "date", "measurement_system" FROM "forest"."projects" ORDER BY "name" DESC, "id""#
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn select_many_scoped_and_batched() {
        let stands = entity(EntityKind::Stand);
        let q = select_many("forest", &stands, &Filter::Eq("project_id", 7));
        assert!(q.sql.contains(r#"WHERE "project_id" = $1 ORDER BY "identification", "id""#));
        assert_eq!(q.params, vec![SqlParam::Int(Some(7))]);

        let q = select_many("forest", &stands, &Filter::In("project_id", vec![1, 2]));
        assert!(q.sql.contains(r#"WHERE "project_id" IN ($1, $2)"#));
        assert_eq!(q.params.len(), 2);

        let q = select_many("forest", &stands, &Filter::In("project_id", vec![]));
        assert!(q.sql.contains("WHERE 1 = 0"));
    }

    #[test]
    fn insert_skips_read_only_columns() {
        let record = json!({"id": 9, "date": "x", "name": "A", "land_owner": "B", "measurement_system": "metric"});
        let q = insert("forest", &entity(EntityKind::Project), record.as_object().unwrap());
        assert_eq!(
            q.sql,
            r#"INSERT INTO "forest"."projects" ("name", "land_owner", "measurement_system") VALUES ($1, $2, $3) RETURNING "id", "name", "land_owner", "date", "measurement_system""#
        );
        assert_eq!(q.params[2], SqlParam::Text(Some("metric".into())));
    }

    #[test]
    fn update_binds_id_last() {
        let record = json!({"slope": 12.5});
        let q = update("forest", &entity(EntityKind::Plot), 3, record.as_object().unwrap());
        assert!(q.sql.starts_with(r#"UPDATE "forest"."plots" SET "slope" = $1 WHERE "id" = $2 RETURNING"#));
        assert_eq!(q.params, vec![SqlParam::Float(Some(12.5)), SqlParam::Int(Some(3))]);
    }

    #[test]
    fn empty_update_is_a_select() {
        let q = update("forest", &entity(EntityKind::Plot), 3, &Record::new());
        assert!(q.sql.starts_with("SELECT "));
        assert_eq!(q.params, vec![SqlParam::Int(Some(3))]);
    }

    #[test]
    fn quoting_escapes_double_quotes() {
        assert_eq!(quoted(r#"we"ird"#), r#""we""ird""#);
    }
}
