//! Denormalized stand view: the stand's own fields plus its project's owner,
//! name, unit system and sample designs, and each plot's trees (plot fields
//! are not included) with tree symbols resolved to the species code.

use super::ViewBuilder;
use crate::config::{EntityKind, MeasurementSystem, PRIMARY_KEY};
use crate::error::{AppError, ConfigError};
use crate::store::{record_id, Filter, Record};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct StandSummary {
    #[serde(flatten)]
    pub stand: Record,
    pub owner: String,
    pub project: String,
    pub measurement_system: MeasurementSystem,
    pub sample_design: Vec<Record>,
    pub num_plots: usize,
    pub plots: Vec<Vec<Record>>,
}

fn text(record: &Record, column: &str) -> String {
    record.get(column).and_then(Value::as_str).unwrap_or_default().to_string()
}

impl ViewBuilder<'_> {
    pub async fn stand_summary(&self, stand: Record) -> Result<StandSummary, AppError> {
        let projects = self.schema.entity(EntityKind::Project)?;
        let designs = self.schema.entity(EntityKind::SampleDesign)?;
        let plots = self.schema.entity(EntityKind::Plot)?;
        let trees = self.schema.entity(EntityKind::Tree)?;
        let references = self.schema.entity(EntityKind::TreeReference)?;

        let project_id = record_id(&stand, "project_id")
            .ok_or_else(|| AppError::NotFound("stand without project".into()))?;
        let project = self
            .store
            .fetch(projects, project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("project {}", project_id)))?;
        let measurement_system = text(&project, "measurement_system")
            .parse::<MeasurementSystem>()
            .map_err(|e| AppError::Config(ConfigError::Validation(e)))?;

        let sample_design = self
            .store
            .fetch_many(designs, &Filter::Eq("project_id", project_id))
            .await?;

        let stand_id = record_id(&stand, PRIMARY_KEY).unwrap_or_default();
        let plot_rows = self.store.fetch_many(plots, &Filter::Eq("stand_id", stand_id)).await?;
        let plot_ids = super::ids_in(&plot_rows, PRIMARY_KEY);
        let tree_rows = self.store.fetch_many(trees, &Filter::In("plot_id", plot_ids.clone())).await?;
        let symbols = self.load_by_id(references, super::ids_in(&tree_rows, "symbol")).await?;

        let mut by_plot: Vec<Vec<Record>> = vec![Vec::new(); plot_ids.len()];
        for mut tree in tree_rows {
            let Some(slot) = record_id(&tree, "plot_id").and_then(|p| plot_ids.iter().position(|id| *id == p)) else {
                continue;
            };
            if let Some(reference) = record_id(&tree, "symbol").and_then(|id| symbols.get(&id)) {
                tree.insert("symbol".into(), Value::String(text(reference, "symbol")));
            }
            by_plot[slot].push(tree);
        }

        Ok(StandSummary {
            owner: text(&project, "land_owner"),
            project: text(&project, "name"),
            measurement_system,
            sample_design,
            num_plots: plot_rows.len(),
            plots: by_plot,
            stand,
        })
    }
}
