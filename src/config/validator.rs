//! Schema validation: referential integrity, unique names, tree-shaped ownership.

use crate::config::types::{ColumnKind, EntityKind, Schema, PRIMARY_KEY};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(schema: &Schema) -> Result<(), ConfigError> {
    let kinds: HashSet<EntityKind> = schema.entities().iter().map(|e| e.kind).collect();
    let mut tables = HashSet::new();
    let mut path_segments = HashSet::new();

    for entity in schema.entities() {
        if !tables.insert(entity.table) {
            return Err(ConfigError::DuplicateTable(entity.table.to_string()));
        }
        if !path_segments.insert(entity.path_segment) {
            return Err(ConfigError::DuplicatePathSegment(entity.path_segment.to_string()));
        }

        let serials: Vec<&str> = entity
            .columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Serial)
            .map(|c| c.name)
            .collect();
        if serials != [PRIMARY_KEY] {
            return Err(ConfigError::InvalidPrimaryKey {
                table: entity.table.to_string(),
                column: serials.join(","),
            });
        }

        let mut names = HashSet::new();
        for col in &entity.columns {
            if !names.insert(col.name) {
                return Err(ConfigError::Validation(format!(
                    "{}: duplicate column {}",
                    entity.table, col.name
                )));
            }
            if let Some(target) = col.foreign_target() {
                if !kinds.contains(&target) {
                    return Err(ConfigError::MissingReference {
                        kind: "entity",
                        id: format!("{} (from {}.{})", target, entity.table, col.name),
                    });
                }
            }
            if let ColumnKind::Choice(choices) = col.kind {
                if choices.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "{}.{}: choice column without choices",
                        entity.table, col.name
                    )));
                }
            }
        }

        if entity.columns.iter().filter(|c| c.is_owner()).count() > 1 {
            return Err(ConfigError::Validation(format!(
                "{}: more than one owner column",
                entity.table
            )));
        }

        for key in &entity.order_by {
            if entity.column(key.column).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: "sort column",
                    id: format!("{}.{}", entity.table, key.column),
                });
            }
        }
    }

    // Follow owner edges upward from every entity; revisiting a kind means a cycle.
    for entity in schema.entities() {
        let mut seen = HashSet::new();
        let mut current = entity;
        while let Some(owner) = current.owner_column().and_then(|c| c.foreign_target()) {
            if !seen.insert(current.kind) {
                return Err(ConfigError::OwnershipCycle(entity.table.to_string()));
            }
            current = schema.entity(owner)?;
        }
    }

    Ok(())
}
