use growthforge_core::{
    analysis::{load_trajectory_log, summary_table},
    error::GrowthForgeError,
    fitting::{
        builder::FitEngineBuilder,
        engine::{MULTI_PROJECT_COMMENT, SINGLE_FIT_COMMENT},
    },
    simulation::{
        integrator::OdeOptions,
        monod::{simulate, MonodModel},
    },
};
use growthforge_schemas::{
    fit::{FitMethod, SkipReason},
    measurement::MergedRecord,
    metadata::{ConditionKey, LinegroupMetadata},
    settings::FitSettings,
};

const V: f64 = 0.5;
const KM: f64 = 2.0;
const Q: f64 = 0.3;
const N0: f64 = 0.02;

struct Plate {
    metadata: Vec<LinegroupMetadata>,
    records: Vec<MergedRecord>,
}

impl Plate {
    fn new() -> Self {
        Self {
            metadata: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Adds a linegroup whose readings follow exact Monod growth, sampled
    /// every 0.1 h for 30 h.
    fn well(
        mut self,
        linegroup: &str,
        species: &str,
        carbon_source: &str,
        conc: f64,
        project: &str,
    ) -> Self {
        let time: Vec<f64> = (0..300).map(|i| i as f64 * 0.1).collect();
        let model = MonodModel { v: V, km: KM, q: Q };
        let density = simulate(&model, N0, conc, &time, &OdeOptions::default())
            .unwrap()
            .density;
        self.records.extend(time.iter().zip(&density).map(|(&t, &n)| MergedRecord {
            linegroup: linegroup.into(),
            time: Some(t),
            measurement: Some(n),
        }));
        self.metadata.push(LinegroupMetadata {
            linegroup: linegroup.into(),
            species: species.into(),
            carbon_source: carbon_source.into(),
            cs_conc: conc,
            project: project.into(),
        });
        self
    }

    fn seeded_settings() -> FitSettings {
        FitSettings {
            seed: Some(2024),
            ..FitSettings::default()
        }
    }
}

#[test]
fn joint_fit_recovers_monod_parameters() {
    let plate = Plate::new()
        .well("lg1", "E. coli", "Glucose", 5.0, "p1")
        .well("lg2", "E. coli", "Glucose", 10.0, "p1")
        .well("lg3", "E. coli", "Glucose", 20.0, "p1")
        .well("lg0", "E. coli", "Glucose", 0.0, "p1");

    let report = FitEngineBuilder::new()
        .with_metadata(plate.metadata)
        .with_records(plate.records)
        .with_settings(Plate::seeded_settings())
        .build()
        .unwrap()
        .run()
        .unwrap();

    let fit = report.get(&ConditionKey::new("E. coli", "Glucose")).unwrap();
    assert_eq!(fit.method, Some(FitMethod::Joint));
    let params = fit.parameters.unwrap();
    assert!((params.v_max - V).abs() < 0.05, "v_max = {}", params.v_max);
    assert!((params.km - KM).abs() < 0.5, "km = {}", params.km);
    assert_eq!(fit.comment, "");

    let concs: Vec<f64> = fit.levels.iter().map(|l| l.cs_conc).collect();
    assert_eq!(concs, vec![20.0, 10.0, 5.0]);
    assert!(fit.levels.iter().all(|l| l.is_fitted()));
}

#[test]
fn single_concentration_reports_observed_growth_rate() {
    let plate = Plate::new().well("lg1", "E. coli", "Glucose", 10.0, "p1");
    let report = FitEngineBuilder::new()
        .with_metadata(plate.metadata)
        .with_records(plate.records)
        .with_seed(7)
        .build()
        .unwrap()
        .run()
        .unwrap();

    let fit = &report.conditions[0];
    assert_eq!(fit.method, Some(FitMethod::Single));
    assert_eq!(fit.comment, SINGLE_FIT_COMMENT);
    let params = fit.parameters.unwrap();
    assert!(params.v_max > 0.3 && params.v_max < V);
    assert!((0.0..=1000.0).contains(&params.km));
    assert_eq!(fit.levels.len(), 1);
    assert!(fit.levels[0].is_fitted());
}

#[test]
fn undetectable_level_is_left_out_of_the_joint_fit() {
    let plate = Plate::new()
        .well("lg1", "E. coli", "Glucose", 20.0, "p1")
        .well("lg2", "E. coli", "Glucose", 10.0, "p1")
        .well("lg3", "E. coli", "Glucose", 0.02, "p1");

    let report = FitEngineBuilder::new()
        .with_metadata(plate.metadata)
        .with_records(plate.records)
        .with_settings(Plate::seeded_settings())
        .build()
        .unwrap()
        .run()
        .unwrap();

    let fit = &report.conditions[0];
    assert_eq!(fit.method, Some(FitMethod::Joint));
    assert_eq!(fit.levels.len(), 3);
    assert!(fit.levels[0].is_fitted());
    assert!(fit.levels[1].is_fitted());
    assert!(fit.levels[2].trajectory.is_empty());
    assert!(matches!(
        fit.levels[2].skipped,
        Some(SkipReason::BelowDetectability { peak }) if peak < 0.05
    ));
}

#[test]
fn one_usable_level_falls_back_to_single_fit() {
    let plate = Plate::new()
        .well("lg1", "E. coli", "Acetate", 10.0, "p1")
        .well("lg2", "E. coli", "Acetate", 0.02, "p2");

    let report = FitEngineBuilder::new()
        .with_metadata(plate.metadata)
        .with_records(plate.records)
        .with_settings(Plate::seeded_settings())
        .build()
        .unwrap()
        .run()
        .unwrap();

    let fit = &report.conditions[0];
    assert_eq!(fit.method, Some(FitMethod::Single));
    assert_eq!(fit.comment, format!("{MULTI_PROJECT_COMMENT} {SINGLE_FIT_COMMENT}"));
    assert!(fit.levels[0].is_fitted());
    assert!(!fit.levels[1].is_fitted());
}

#[test]
fn seeded_runs_are_identical() {
    let run = || {
        let plate = Plate::new().well("lg1", "B. subtilis", "Glucose", 5.0, "p1");
        FitEngineBuilder::new()
            .with_metadata(plate.metadata)
            .with_records(plate.records)
            .with_seed(99)
            .build()
            .unwrap()
            .run()
            .unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn combinations_without_levels_are_reported_empty() {
    let plate = Plate::new()
        .well("lg1", "E. coli", "Glucose", 10.0, "p1")
        .well("lg2", "B. subtilis", "Acetate", 0.0, "p1");

    let report = FitEngineBuilder::new()
        .with_metadata(plate.metadata)
        .with_records(plate.records)
        .with_seed(5)
        .build()
        .unwrap()
        .run()
        .unwrap();

    // Species outer, carbon source inner, every pairing present.
    let keys: Vec<String> = report.conditions.iter().map(|c| c.key.to_string()).collect();
    assert_eq!(
        keys,
        [
            "E. coli / Glucose",
            "E. coli / Acetate",
            "B. subtilis / Glucose",
            "B. subtilis / Acetate"
        ]
    );
    assert_eq!(report.fitted().count(), 1);
    assert_eq!(summary_table(&report).lines().count(), 3);
}

#[test]
fn missing_linegroup_and_missing_cells_do_not_abort() {
    let mut plate = Plate::new().well("lg1", "E. coli", "Glucose", 10.0, "p1");
    plate.metadata.push(LinegroupMetadata {
        linegroup: "absent".into(),
        species: "E. coli".into(),
        carbon_source: "Glucose".into(),
        cs_conc: 5.0,
        project: "p1".into(),
    });
    for record in plate.records.iter_mut().step_by(17) {
        record.measurement = None;
    }

    let report = FitEngineBuilder::new()
        .with_metadata(plate.metadata)
        .with_records(plate.records)
        .with_seed(3)
        .build()
        .unwrap()
        .run()
        .unwrap();

    let fit = &report.conditions[0];
    assert_eq!(fit.method, Some(FitMethod::Single));
    assert_eq!(fit.levels[1].skipped, Some(SkipReason::NoUsableData));
}

#[test]
fn failed_simulations_are_reported_per_level() {
    let plate = Plate::new()
        .well("lg1", "E. coli", "Glucose", 20.0, "p1")
        .well("lg2", "E. coli", "Glucose", 10.0, "p1")
        .well("lg3", "E. coli", "Acetate", 10.0, "p1");
    let mut settings = Plate::seeded_settings();
    settings.restarts = 1;
    // Far too few steps for these tolerances: every simulation fails.
    settings.ode.rtol = 1e-13;
    settings.ode.atol = 1e-15;
    settings.ode.max_steps = 1;

    let report = FitEngineBuilder::new()
        .with_metadata(plate.metadata)
        .with_records(plate.records)
        .with_settings(settings)
        .build()
        .unwrap()
        .run()
        .unwrap();

    let joint = report.get(&ConditionKey::new("E. coli", "Glucose")).unwrap();
    assert!(joint.parameters.is_none());
    assert_eq!(joint.levels.len(), 2);
    for level in &joint.levels {
        assert!(!level.is_fitted());
        assert!(matches!(level.skipped, Some(SkipReason::FitFailed { .. })));
    }

    let single = report.get(&ConditionKey::new("E. coli", "Acetate")).unwrap();
    assert!(single.parameters.is_none());
    assert_eq!(single.levels.len(), 1);
    assert!(matches!(single.levels[0].skipped, Some(SkipReason::FitFailed { .. })));
}

#[test]
fn fitted_trajectories_are_logged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fit_trajectories.csv");
    let path = path.to_str().unwrap();
    let plate = Plate::new().well("lg1", "E. coli", "Glucose", 10.0, "p1");

    let report = FitEngineBuilder::new()
        .with_metadata(plate.metadata)
        .with_records(plate.records)
        .with_seed(11)
        .with_trajectory_logging_to_file(path)
        .build()
        .unwrap()
        .run()
        .unwrap();

    let logged = load_trajectory_log(path).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].1.len(), report.conditions[0].levels[0].trajectory.len());
}

#[test]
fn empty_metadata_is_an_error() {
    let result = FitEngineBuilder::new().with_records(Vec::new()).build();
    assert!(matches!(result, Err(GrowthForgeError::NoData)));
}
