use anyhow::{Context, Result};
use growthforge_core::fitting::builder::load_settings_file;
use growthforge_schemas::{
    measurement::MergedRecord,
    metadata::LinegroupMetadata,
    settings::FitSettings,
};
use std::path::Path;
use tracing::info;

pub const METADATA_FILE: &str = "metadata.csv";
pub const MEASUREMENTS_FILE: &str = "measurements.csv";

/// Metadata and merged measurements exported for one or more projects.
pub struct ExperimentData {
    pub metadata: Vec<LinegroupMetadata>,
    pub records: Vec<MergedRecord>,
}

impl ExperimentData {
    /// Loads `metadata.csv` and `measurements.csv` from the specified directory.
    pub fn load(data_dir: &Path) -> Result<Self> {
        info!(dir = %data_dir.display(), "Loading experiment data");

        let metadata: Vec<LinegroupMetadata> = load_csv_rows(data_dir.join(METADATA_FILE))?;
        let records: Vec<MergedRecord> = load_csv_rows(data_dir.join(MEASUREMENTS_FILE))?;

        info!(
            linegroups = metadata.len(),
            measurements = records.len(),
            "Experiment data loaded"
        );
        Ok(Self { metadata, records })
    }
}

/// Generic helper to deserialize every row of a CSV file.
fn load_csv_rows<T, P>(path: P) -> Result<Vec<T>>
where
    P: AsRef<Path>,
    T: for<'de> serde::Deserialize<'de>,
{
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let mut rows = Vec::new();
    for (line, row) in reader.deserialize().enumerate() {
        let row: T =
            row.with_context(|| format!("Failed to parse row {} of {:?}", line + 1, path))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads fit settings from a YAML settings file, or the defaults when no
/// file is given.
pub fn load_settings(path: Option<&Path>) -> Result<FitSettings> {
    let Some(path) = path else {
        return Ok(FitSettings::default());
    };
    let path_str = path
        .to_str()
        .with_context(|| format!("Settings path is not valid UTF-8: {:?}", path))?;
    load_settings_file(path_str).with_context(|| format!("Failed to load settings from {:?}", path))
}

/// Conditions chosen for a run. An empty list selects every value.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub projects: Vec<String>,
    pub species: Vec<String>,
    pub carbon_sources: Vec<String>,
}

fn selects(choices: &[String], value: &str) -> bool {
    choices.is_empty() || choices.iter().any(|c| c == value)
}

impl Selection {
    pub fn filter(&self, metadata: &[LinegroupMetadata]) -> Vec<LinegroupMetadata> {
        metadata
            .iter()
            .filter(|m| {
                selects(&self.projects, &m.project)
                    && selects(&self.species, &m.species)
                    && selects(&self.carbon_sources, &m.carbon_source)
            })
            .cloned()
            .collect()
    }
}
