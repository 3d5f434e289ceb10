use crate::config::{load_settings, ExperimentData, Selection};
use crate::plotting::{self, LevelCurve};
use anyhow::{Context, Result};
use growthforge_core::{
    analysis,
    fitting::builder::FitEngineBuilder,
    preprocess::{average_replicates, drop_missing, series_by_linegroup},
    simulation::{
        chemostat::{self, critical_dilution},
        integrator::OdeOptions,
    },
};
use growthforge_schemas::{
    chemostat::ChemostatParameters,
    fit::{ConditionFit, FitReport},
    measurement::{MergedRecord, TimeSeries},
    settings::FitSettings,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

pub const NO_DATA_MESSAGE: &str = "No data found for the selected conditions";
const STEADY_STATE_POINTS: usize = 50;

/// Inputs of a fitting run, as collected from the command line.
pub struct FitRequest {
    pub data_dir: PathBuf,
    pub settings: Option<PathBuf>,
    pub selection: Selection,
    pub output: PathBuf,
    pub seed: Option<u64>,
}

/// Creates `<base>/<prefix>_<timestamp>` for the outputs of one run.
fn create_run_dir(base: &Path, prefix: &str) -> Result<PathBuf> {
    let dir = base.join(format!("{}_{}", prefix, chrono::Utc::now().format("%Y%m%d_%H%M%S")));
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    Ok(dir)
}

/// Loads the data, fits every selected combination and writes the reports.
///
/// Returns the run directory, or `None` when the selection matched nothing.
pub fn run_fit(request: &FitRequest) -> Result<Option<PathBuf>> {
    let settings = load_settings(request.settings.as_deref())?;
    let data = ExperimentData::load(&request.data_dir)?;
    let metadata = request.selection.filter(&data.metadata);
    if metadata.is_empty() {
        println!("{}", NO_DATA_MESSAGE);
        return Ok(None);
    }

    let output_dir = create_run_dir(&request.output, "fit")?;
    let log_path = output_dir.join("fit_trajectories.csv");
    let log_path_str = log_path
        .to_str()
        .with_context(|| format!("Output path is not valid UTF-8: {:?}", log_path))?;

    let mut builder = FitEngineBuilder::new()
        .with_metadata(metadata)
        .with_records(data.records.clone())
        .with_settings(settings.clone())
        .with_trajectory_logging_to_file(log_path_str);
    if let Some(seed) = request.seed {
        builder = builder.with_seed(seed);
    }
    let report = builder.build()?.run()?;

    write_reports(&output_dir, &report)?;
    plot_report(&output_dir, &report, &data.records, &settings)?;
    print_summary_report(&report, &output_dir);
    Ok(Some(output_dir))
}

fn write_reports(output_dir: &Path, report: &FitReport) -> Result<()> {
    fs::write(output_dir.join("fit_summary.md"), analysis::summary_table(report))
        .context("Failed to write fit summary")?;
    let json_path = output_dir.join("fit_results.json");
    analysis::write_report_json(report, &json_path.to_string_lossy())?;
    Ok(())
}

/// Observed (replicate-averaged, missing values dropped) and fitted curves of
/// every fitted level of a combination.
pub fn level_curves(
    condition: &ConditionFit,
    series: &HashMap<String, TimeSeries>,
    settings: &FitSettings,
) -> Vec<LevelCurve> {
    condition
        .levels
        .iter()
        .filter(|level| level.is_fitted())
        .map(|level| {
            let replicates: Vec<&TimeSeries> =
                level.linegroups.iter().filter_map(|lg| series.get(lg)).collect();
            let averaged = average_replicates(&replicates, settings.replicate_averaging);
            let observed = drop_missing(&averaged.time, &averaged.measurement);
            LevelCurve {
                cs_conc: level.cs_conc,
                observed: observed.time.into_iter().zip(observed.measurement).collect(),
                fitted: level.trajectory.iter().map(|p| (p.time, p.predicted)).collect(),
            }
        })
        .collect()
}

fn plot_report(
    output_dir: &Path,
    report: &FitReport,
    records: &[MergedRecord],
    settings: &FitSettings,
) -> Result<()> {
    let series = series_by_linegroup(records);
    for condition in report.fitted() {
        let curves = level_curves(condition, &series, settings);
        match plotting::plot_fit_comparison(output_dir, &condition.key, &curves) {
            Ok(path) => {
                info!(condition = %condition.key, path = %path.display(), "Saved fit figure")
            }
            Err(e) => warn!(condition = %condition.key, error = %e, "Could not render fit figure"),
        }
    }
    Ok(())
}

fn print_summary_report(report: &FitReport, output_dir: &Path) {
    println!("\n--- [Fit Summary] ---");
    println!("========================================");
    let mut fitted = 0;
    for condition in report.fitted() {
        let Some(params) = condition.parameters else {
            continue;
        };
        fitted += 1;
        let used = condition.levels.iter().filter(|l| l.is_fitted()).count();
        println!(
            "  - {:<30} | v_max: {:>8.4} 1/h | Km: {:>10.4} | levels: {}/{}",
            condition.key.to_string(),
            params.v_max,
            params.km,
            used,
            condition.levels.len()
        );
        if !condition.comment.is_empty() {
            println!("      {}", condition.comment);
        }
    }
    println!("----------------------------------------");
    println!(
        "Fitted {} of {} combinations. Results are in '{}'",
        fitted,
        report.conditions.len(),
        output_dir.display()
    );
    println!("========================================");
}

/// Simulates a chemostat and renders its dynamics and steady-state curves.
pub fn run_chemostat(params: &ChemostatParameters, hours: f64, output: &Path) -> Result<PathBuf> {
    let output_dir = create_run_dir(output, "chemostat")?;
    let run = chemostat::simulate(params, hours, &OdeOptions::default())?;
    let curve = chemostat::steady_state_curve(params, STEADY_STATE_POINTS);

    plotting::plot_chemostat_dynamics(&output_dir, &run)?;
    plotting::plot_steady_states(&output_dir, &curve)?;

    println!("\n--- [Chemostat] ---");
    println!("  - Washout dilution rate: {:.4} 1/h", critical_dilution(params));
    if params.dilution < critical_dilution(params) {
        println!(
            "  - Steady state at D = {:.3}: R* = {:.4} mM, N* = {:.4} OD",
            params.dilution,
            chemostat::r_star(params, params.dilution),
            chemostat::n_star(params, params.dilution)
        );
    } else {
        println!("  - D = {:.3} is beyond washout; the population is lost", params.dilution);
    }
    if let (Some(n), Some(r)) = (run.density.last(), run.resource.last()) {
        println!("  - After {} h: N = {:.4} OD, R = {:.4} mM", hours, n, r);
    }
    println!("Results are in '{}'", output_dir.display());
    Ok(output_dir)
}
