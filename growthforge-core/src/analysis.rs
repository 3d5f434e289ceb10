use crate::{error::GrowthForgeError, logger::TrajectoryRow};
use growthforge_schemas::{
    fit::FitReport,
    metadata::{ConditionKey, LinegroupMetadata},
};
use std::{
    collections::{BTreeSet, HashMap},
    fs,
};

/// Replicate linegroups sharing one nominal starting concentration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationLevel {
    pub cs_conc: f64,
    pub linegroups: Vec<String>,
}

/// All metadata rows of one species × carbon source combination.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroup {
    pub key: ConditionKey,
    /// Ordered by descending concentration. Zero-concentration controls are
    /// not included.
    pub levels: Vec<ConcentrationLevel>,
    pub projects: BTreeSet<String>,
}

impl ConditionGroup {
    pub fn is_multi_project(&self) -> bool {
        self.projects.len() > 1
    }
}

fn first_appearance<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// Groups metadata by species (outer) and carbon source (inner), both in order
/// of first appearance. Every carbon source seen anywhere in `metadata` is
/// paired with every species, so some groups may have no levels.
pub fn group_conditions(metadata: &[LinegroupMetadata]) -> Vec<ConditionGroup> {
    let species = first_appearance(metadata.iter().map(|m| m.species.as_str()));
    let carbon_sources = first_appearance(metadata.iter().map(|m| m.carbon_source.as_str()));

    let mut groups = Vec::with_capacity(species.len() * carbon_sources.len());
    for sp in &species {
        for cs in &carbon_sources {
            let rows: Vec<&LinegroupMetadata> = metadata
                .iter()
                .filter(|m| m.species == *sp && m.carbon_source == *cs)
                .collect();

            let mut levels: Vec<ConcentrationLevel> = Vec::new();
            for row in rows.iter().filter(|m| m.cs_conc != 0.0) {
                match levels.iter_mut().find(|l| l.cs_conc == row.cs_conc) {
                    Some(level) => level.linegroups.push(row.linegroup.clone()),
                    None => levels.push(ConcentrationLevel {
                        cs_conc: row.cs_conc,
                        linegroups: vec![row.linegroup.clone()],
                    }),
                }
            }
            levels.sort_by(|a, b| b.cs_conc.total_cmp(&a.cs_conc));

            groups.push(ConditionGroup {
                key: ConditionKey::new(*sp, *cs),
                levels,
                projects: rows.iter().map(|m| m.project.clone()).collect(),
            });
        }
    }
    groups
}

/// Markdown table of every fitted combination.
pub fn summary_table(report: &FitReport) -> String {
    let mut table = String::from("| Species | Carbon Source | v_max | Km | Comments |\n");
    table.push_str("|---|---|---|---|---|\n");
    for condition in report.fitted() {
        let Some(params) = condition.parameters else {
            continue;
        };
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            condition.key.species,
            condition.key.carbon_source,
            params.v_max,
            params.km,
            condition.comment
        ));
    }
    table
}

/// Writes the full report, skipped levels included, as pretty-printed JSON.
pub fn write_report_json(report: &FitReport, path: &str) -> Result<(), GrowthForgeError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|e| GrowthForgeError::FileIO(path.to_string(), e))
}

pub fn load_report_json(path: &str) -> Result<FitReport, GrowthForgeError> {
    let content =
        fs::read_to_string(path).map_err(|e| GrowthForgeError::FileIO(path.to_string(), e))?;
    Ok(serde_json::from_str(&content)?)
}

/// Reads a trajectory log back, grouping rows by combination and
/// concentration in the order they were written.
pub fn load_trajectory_log(
    log_path: &str,
) -> Result<Vec<((ConditionKey, f64), Vec<TrajectoryRow>)>, GrowthForgeError> {
    let mut reader = csv::Reader::from_path(log_path)
        .map_err(|e| GrowthForgeError::CsvError(log_path.to_string(), e))?;

    let mut order: Vec<(ConditionKey, f64)> = Vec::new();
    let mut by_level: HashMap<(ConditionKey, u64), Vec<TrajectoryRow>> = HashMap::new();
    for result in reader.deserialize() {
        let row: TrajectoryRow =
            result.map_err(|e| GrowthForgeError::CsvError(log_path.to_string(), e))?;
        let key = ConditionKey::new(row.species.clone(), row.carbon_source.clone());
        let slot = (key.clone(), row.cs_conc.to_bits());
        if !by_level.contains_key(&slot) {
            order.push((key, row.cs_conc));
        }
        by_level.entry(slot).or_default().push(row);
    }

    Ok(order
        .into_iter()
        .map(|(key, conc)| {
            let rows = by_level.remove(&(key.clone(), conc.to_bits())).unwrap_or_default();
            ((key, conc), rows)
        })
        .collect())
}
