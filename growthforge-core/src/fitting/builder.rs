use crate::{
    analysis::group_conditions,
    error::GrowthForgeError,
    estimation::optimizer::make_rng,
    fitting::engine::FitEngine,
    logger::TrajectoryLogger,
    preprocess::series_by_linegroup,
    simulation::integrator::OdeOptions,
};
use growthforge_schemas::{
    file_formats::SettingsFile,
    measurement::MergedRecord,
    metadata::LinegroupMetadata,
    settings::{FitSettings, Interval},
};
use std::fs;
use tracing::info;

/// A fluent builder for constructing a `FitEngine`.
///
/// Collects the filtered metadata, the merged measurement table and the fit
/// settings, then validates them once in [`FitEngineBuilder::build`].
#[derive(Default)]
pub struct FitEngineBuilder {
    metadata: Vec<LinegroupMetadata>,
    records: Vec<MergedRecord>,
    settings: FitSettings,
    seed: Option<u64>,
    log_path: Option<String>,
}

impl FitEngineBuilder {
    /// Creates a builder with default settings and no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the linegroup metadata, already filtered to the selected conditions.
    pub fn with_metadata(mut self, metadata: Vec<LinegroupMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the merged measurement table.
    pub fn with_records(mut self, records: Vec<MergedRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn with_settings(mut self, settings: FitSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Seeds the multi-start sampler, overriding any seed in the settings.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Configures the engine to write fitted trajectories to the specified CSV file.
    pub fn with_trajectory_logging_to_file(mut self, path: &str) -> Self {
        self.log_path = Some(path.to_string());
        self
    }

    /// Consumes the builder and returns a ready `FitEngine`.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when no metadata was provided, `ConfigError` for
    /// inconsistent settings and `FileIO` when the trajectory log cannot be
    /// created.
    pub fn build(self) -> Result<FitEngine, GrowthForgeError> {
        if self.metadata.is_empty() {
            return Err(GrowthForgeError::NoData);
        }
        validate_settings(&self.settings)?;

        let logger = match self.log_path {
            Some(path) => Some(
                TrajectoryLogger::new(&path)
                    .map_err(|e| GrowthForgeError::FileIO(path.clone(), e))?,
            ),
            None => None,
        };

        let seed = self.seed.or(self.settings.seed);
        Ok(FitEngine {
            groups: group_conditions(&self.metadata),
            series: series_by_linegroup(&self.records),
            ode: OdeOptions::from(&self.settings.ode),
            settings: self.settings,
            rng: make_rng(seed),
            logger,
        })
    }
}

/// Reads a YAML settings file. Missing fields take their defaults.
pub fn load_settings_file(path: &str) -> Result<FitSettings, GrowthForgeError> {
    let content =
        fs::read_to_string(path).map_err(|e| GrowthForgeError::FileIO(path.to_string(), e))?;
    let file: SettingsFile = serde_yaml::from_str(&content)
        .map_err(|e| GrowthForgeError::YamlParsing(path.to_string(), e))?;
    info!(path, schema_version = %file.schema_version, "Loaded fit settings");
    Ok(file.settings)
}

fn check_interval(name: &str, interval: &Interval) -> Result<(), GrowthForgeError> {
    if interval.is_valid() {
        Ok(())
    } else {
        Err(GrowthForgeError::ConfigError(format!(
            "{name} must be a finite interval with min <= max, got [{}, {}]",
            interval.min, interval.max
        )))
    }
}

fn check_fraction(name: &str, value: f64) -> Result<(), GrowthForgeError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(GrowthForgeError::ConfigError(format!(
            "{name} must lie in [0, 1), got {value}"
        )))
    }
}

/// Rejects settings the estimators cannot work with.
pub fn validate_settings(settings: &FitSettings) -> Result<(), GrowthForgeError> {
    if settings.restarts == 0 {
        return Err(GrowthForgeError::ConfigError("restarts must be at least 1".into()));
    }
    if !settings.detectability_floor.is_finite() {
        return Err(GrowthForgeError::ConfigError(
            "detectability_floor must be finite".into(),
        ));
    }
    if !(settings.smoothing_sigma >= 0.0 && settings.smoothing_sigma.is_finite()) {
        return Err(GrowthForgeError::ConfigError(format!(
            "smoothing_sigma must be non-negative, got {}",
            settings.smoothing_sigma
        )));
    }

    check_fraction("single.yield_fraction", settings.single.yield_fraction)?;
    check_interval("single.km_bounds", &settings.single.km_bounds)?;
    check_interval("single.km_start", &settings.single.km_start)?;

    check_fraction("joint.yield_fraction", settings.joint.yield_fraction)?;
    check_interval("joint.km_bounds", &settings.joint.km_bounds)?;
    check_interval("joint.km_start", &settings.joint.km_start)?;
    check_interval("joint.v_start", &settings.joint.v_start)?;
    if !(settings.joint.v_max_bound > 0.0 && settings.joint.v_max_bound.is_finite()) {
        return Err(GrowthForgeError::ConfigError(format!(
            "joint.v_max_bound must be positive, got {}",
            settings.joint.v_max_bound
        )));
    }

    let ode = &settings.ode;
    if !(ode.rtol > 0.0 && ode.atol > 0.0) || ode.max_steps == 0 {
        return Err(GrowthForgeError::ConfigError(
            "ode tolerances must be positive and max_steps at least 1".into(),
        ));
    }
    Ok(())
}
