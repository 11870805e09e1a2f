//! Schema mapping table: entities, columns, constraints and sort keys consumed by the stores.

use std::fmt;

/// Every record type the service stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Project,
    SampleDesign,
    Stand,
    Plot,
    TreeReference,
    Tree,
}

impl EntityKind {
    /// Human-readable name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::SampleDesign => "sample design",
            EntityKind::Stand => "stand",
            EntityKind::Plot => "plot",
            EntityKind::TreeReference => "tree reference",
            EntityKind::Tree => "tree",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ColumnKind {
    /// Auto-assigned integer key.
    Serial,
    Integer,
    Float,
    Text { max_length: u32 },
    Choice(&'static [&'static str]),
    /// Set by the store on insert, never written afterwards.
    CreatedAt,
    /// Integer key of another entity; deleting the target deletes this row.
    ForeignKey { target: EntityKind, owner: bool },
}

#[derive(Clone, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub unique: bool,
}

impl ColumnDef {
    pub fn serial(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Serial)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Integer)
    }

    pub fn float(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Float)
    }

    pub fn text(name: &'static str, max_length: u32) -> Self {
        Self::new(name, ColumnKind::Text { max_length })
    }

    pub fn choice(name: &'static str, choices: &'static [&'static str]) -> Self {
        Self::new(name, ColumnKind::Choice(choices))
    }

    pub fn created_at(name: &'static str) -> Self {
        Self::new(name, ColumnKind::CreatedAt)
    }

    /// Hierarchy parent edge (used for scoped lists and nested creates).
    pub fn owner(name: &'static str, target: EntityKind) -> Self {
        Self::new(name, ColumnKind::ForeignKey { target, owner: true })
    }

    pub fn reference(name: &'static str, target: EntityKind) -> Self {
        Self::new(name, ColumnKind::ForeignKey { target, owner: false })
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn new(name: &'static str, kind: ColumnKind) -> Self {
        ColumnDef {
            name,
            kind,
            unique: false,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.kind, ColumnKind::Serial | ColumnKind::CreatedAt)
    }

    pub fn foreign_target(&self) -> Option<EntityKind> {
        match self.kind {
            ColumnKind::ForeignKey { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self.kind, ColumnKind::ForeignKey { owner: true, .. })
    }
}

#[derive(Clone, Debug)]
pub struct OrderKey {
    pub column: &'static str,
    pub descending: bool,
}

impl OrderKey {
    pub fn asc(column: &'static str) -> Self {
        OrderKey {
            column,
            descending: false,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        OrderKey {
            column,
            descending: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EntityDef {
    pub kind: EntityKind,
    pub table: &'static str,
    pub path_segment: &'static str,
    pub columns: Vec<ColumnDef>,
    /// Sort key for lists; `id` is always appended as the final tie-breaker.
    pub order_by: Vec<OrderKey>,
}

pub const PRIMARY_KEY: &str = "id";

impl EntityDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.is_read_only())
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.foreign_target().is_some())
    }

    pub fn owner_column(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.is_owner())
    }

    /// Sort key with the primary key tie-breaker appended.
    pub fn full_order(&self) -> Vec<OrderKey> {
        let mut keys = self.order_by.clone();
        if !keys.iter().any(|k| k.column == PRIMARY_KEY) {
            keys.push(OrderKey::asc(PRIMARY_KEY));
        }
        keys
    }
}

/// The full set of entity definitions, passed explicitly to stores and routers.
#[derive(Clone, Debug)]
pub struct Schema {
    entities: Vec<EntityDef>,
}

impl Schema {
    pub fn new(entities: Vec<EntityDef>) -> Self {
        Schema { entities }
    }

    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    pub fn get(&self, kind: EntityKind) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.kind == kind)
    }

    /// Entity lookup for kinds the schema is known to contain (checked by `validate`).
    pub fn entity(&self, kind: EntityKind) -> Result<&EntityDef, crate::error::ConfigError> {
        self.get(kind).ok_or(crate::error::ConfigError::MissingReference {
            kind: "entity",
            id: kind.label().to_string(),
        })
    }

    /// Every (entity, column) pair whose foreign key points at `target`.
    pub fn referencing(&self, target: EntityKind) -> Vec<(&EntityDef, &ColumnDef)> {
        let mut out = Vec::new();
        for entity in &self.entities {
            for col in entity.foreign_keys() {
                if col.foreign_target() == Some(target) {
                    out.push((entity, col));
                }
            }
        }
        out
    }

    /// Entities owned by `parent`, with the owning column.
    pub fn children(&self, parent: EntityKind) -> Vec<(&EntityDef, &ColumnDef)> {
        self.referencing(parent)
            .into_iter()
            .filter(|(_, col)| col.is_owner())
            .collect()
    }
}
