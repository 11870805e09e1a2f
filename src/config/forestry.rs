//! The forestry inventory schema: Project → Stand → Plot → Tree, plus the shared
//! TreeReference species catalog and per-project SampleDesign records.

use crate::config::types::{ColumnDef, EntityDef, EntityKind, OrderKey, Schema};
use std::str::FromStr;

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const CHOICES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("\"{}\" is not a valid choice.", other)),
                }
            }
        }
    };
}

choice_enum!(
    /// Unit system a project's measurements are recorded in.
    MeasurementSystem {
        English => "english",
        Metric => "metric",
    }
);

choice_enum!(
    /// Sampling method: fixed-radius frequency plots or basal-area-factor prisms.
    SampleType {
        Frq => "FRQ",
        Baf => "BAF",
    }
);

choice_enum!(
    Variable {
        Hgt => "HGT",
        Dbh => "DBH",
    }
);

const NAME_LENGTH: u32 = 255;

pub fn schema() -> Schema {
    Schema::new(vec![
        EntityDef {
            kind: EntityKind::Project,
            table: "projects",
            path_segment: "projects",
            columns: vec![
                ColumnDef::serial("id"),
                ColumnDef::text("name", NAME_LENGTH),
                ColumnDef::text("land_owner", NAME_LENGTH),
                ColumnDef::created_at("date"),
                ColumnDef::choice("measurement_system", MeasurementSystem::CHOICES),
            ],
            order_by: vec![OrderKey::desc("name")],
        },
        EntityDef {
            kind: EntityKind::SampleDesign,
            table: "sample_designs",
            path_segment: "sample-designs",
            columns: vec![
                ColumnDef::serial("id"),
                ColumnDef::owner("project_id", EntityKind::Project),
                ColumnDef::choice("sample_type", SampleType::CHOICES),
                ColumnDef::integer("factor"),
                ColumnDef::choice("variable", Variable::CHOICES),
                ColumnDef::float("min_value"),
                ColumnDef::float("max_value"),
            ],
            order_by: vec![],
        },
        EntityDef {
            kind: EntityKind::Stand,
            table: "stands",
            path_segment: "stands",
            columns: vec![
                ColumnDef::serial("id"),
                ColumnDef::owner("project_id", EntityKind::Project),
                // Unique across every project, not per project.
                ColumnDef::integer("identification").unique(),
                ColumnDef::text("location", NAME_LENGTH),
                ColumnDef::integer("origin_year"),
                ColumnDef::float("size"),
            ],
            order_by: vec![OrderKey::asc("identification")],
        },
        EntityDef {
            kind: EntityKind::Plot,
            table: "plots",
            path_segment: "plots",
            columns: vec![
                ColumnDef::serial("id"),
                ColumnDef::owner("stand_id", EntityKind::Stand),
                // Unique across every stand, not per stand.
                ColumnDef::integer("number").unique(),
                ColumnDef::float("latitude"),
                ColumnDef::float("longitude"),
                ColumnDef::float("slope"),
                ColumnDef::text("aspect", NAME_LENGTH),
            ],
            order_by: vec![OrderKey::asc("number")],
        },
        EntityDef {
            kind: EntityKind::TreeReference,
            table: "tree_references",
            path_segment: "tree-references",
            columns: vec![
                ColumnDef::serial("id"),
                ColumnDef::text("symbol", NAME_LENGTH),
                ColumnDef::text("scientific_name", NAME_LENGTH),
                ColumnDef::text("common_name", NAME_LENGTH),
                ColumnDef::text("family", NAME_LENGTH),
                ColumnDef::integer("max_density_index"),
            ],
            order_by: vec![OrderKey::asc("symbol")],
        },
        EntityDef {
            kind: EntityKind::Tree,
            table: "trees",
            path_segment: "trees",
            columns: vec![
                ColumnDef::serial("id"),
                ColumnDef::owner("plot_id", EntityKind::Plot),
                ColumnDef::reference("symbol", EntityKind::TreeReference),
                ColumnDef::integer("count"),
                ColumnDef::float("dbh"),
                ColumnDef::float("height"),
                ColumnDef::integer("live_crown_ratio"),
            ],
            order_by: vec![],
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate;

    #[test]
    fn forestry_schema_is_valid() {
        validate(&schema()).unwrap();
    }

    #[test]
    fn choices_parse_and_print() {
        assert_eq!("metric".parse::<MeasurementSystem>(), Ok(MeasurementSystem::Metric));
        assert_eq!(SampleType::Baf.as_str(), "BAF");
        assert_eq!(Variable::CHOICES, &["HGT", "DBH"]);
        assert!("imperial".parse::<MeasurementSystem>().is_err());
    }

    #[test]
    fn tree_reference_is_not_owned() {
        let schema = schema();
        assert!(schema.get(EntityKind::TreeReference).unwrap().owner_column().is_none());
        let referencing: Vec<_> = schema
            .referencing(EntityKind::TreeReference)
            .into_iter()
            .map(|(e, c)| (e.kind, c.name))
            .collect();
        assert_eq!(referencing, vec![(EntityKind::Tree, "symbol")]);
    }

    #[test]
    fn project_children_are_stands_and_sample_designs() {
        let schema = schema();
        let mut kinds: Vec<_> = schema
            .children(EntityKind::Project)
            .into_iter()
            .map(|(e, _)| e.kind)
            .collect();
        kinds.sort();
        assert_eq!(kinds, vec![EntityKind::SampleDesign, EntityKind::Stand]);
    }
}
