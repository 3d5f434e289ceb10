use crate::{
    analysis::{ConcentrationLevel, ConditionGroup},
    error::GrowthForgeError,
    estimation::{
        joint::{fit_joint, simulate_level},
        single::fit_single,
        FitArgs,
    },
    logger::TrajectoryLogger,
    preprocess::{average_replicates, preprocess},
    simulation::integrator::OdeOptions,
    window::select_window,
};
use growthforge_schemas::{
    fit::{ConditionFit, FitMethod, FitReport, LevelFit, SkipReason},
    measurement::TimeSeries,
    settings::FitSettings,
};
use rand::rngs::StdRng;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const SINGLE_FIT_COMMENT: &str = "Single concentration fit.";
pub const MULTI_PROJECT_COMMENT: &str = "Data from multiple projects. Verify protocols.";

pub struct FitEngine {
    pub(super) groups: Vec<ConditionGroup>,
    pub(super) series: HashMap<String, TimeSeries>,
    pub(super) settings: FitSettings,
    pub(super) ode: OdeOptions,
    pub(super) rng: StdRng,
    pub(super) logger: Option<TrajectoryLogger>,
}

fn append_comment(comment: &mut String, note: &str) {
    if !comment.is_empty() {
        comment.push(' ');
    }
    comment.push_str(note);
}

fn skipped_level(level: &ConcentrationLevel, reason: SkipReason) -> LevelFit {
    LevelFit {
        cs_conc: level.cs_conc,
        linegroups: level.linegroups.clone(),
        trajectory: Vec::new(),
        skipped: Some(reason),
    }
}

fn fit_failed(error: &GrowthForgeError) -> SkipReason {
    SkipReason::FitFailed { error: error.to_string() }
}

/// Puts `outcome` at `index` of the already recorded levels, or makes it the
/// only level when none were recorded.
fn place_level(mut others: Vec<LevelFit>, index: usize, outcome: LevelFit) -> Vec<LevelFit> {
    if others.is_empty() {
        vec![outcome]
    } else {
        others[index] = outcome;
        others
    }
}

impl FitEngine {
    /// Fits every species × carbon source combination.
    ///
    /// Data-quality problems never abort the run: they are logged and turned
    /// into skipped levels or empty outcomes. Only a failing trajectory log
    /// surfaces as an error.
    pub fn run(&mut self) -> Result<FitReport, GrowthForgeError> {
        info!(combinations = self.groups.len(), "Starting Monod fits");
        let groups = self.groups.clone();
        let mut report = FitReport::default();

        for group in &groups {
            let outcome = self.fit_condition(group);
            match outcome.parameters {
                Some(p) => info!(
                    condition = %group.key,
                    method = ?outcome.method,
                    v_max = p.v_max,
                    km = p.km,
                    "Fitted"
                ),
                None if !group.levels.is_empty() => {
                    warn!(condition = %group.key, "No usable concentration level, skipping")
                }
                None => debug!(condition = %group.key, "No data for combination"),
            }

            if let Some(logger) = &mut self.logger {
                for level in outcome.levels.iter().filter(|l| l.is_fitted()) {
                    logger.log_level(&outcome.key, level)?;
                }
            }
            report.conditions.push(outcome);
        }

        info!(fitted = report.fitted().count(), "Fitting complete");
        Ok(report)
    }

    fn fit_condition(&mut self, group: &ConditionGroup) -> ConditionFit {
        let comment = if group.is_multi_project() {
            MULTI_PROJECT_COMMENT.to_string()
        } else {
            String::new()
        };

        match group.levels.len() {
            0 => ConditionFit::empty(group.key.clone(), comment),
            1 => self.fit_single_level(group, 0, Vec::new(), comment),
            _ => self.fit_joint_levels(group, comment),
        }
    }

    /// Averages, cleans and windows one concentration level.
    fn prepare_level(
        &self,
        level: &ConcentrationLevel,
        yield_fraction: f64,
    ) -> Result<FitArgs, SkipReason> {
        let replicates: Vec<&TimeSeries> = level
            .linegroups
            .iter()
            .filter_map(|lg| {
                let series = self.series.get(lg);
                if series.is_none() {
                    let error = GrowthForgeError::LinegroupNotFound(lg.clone());
                    warn!(%error, "Ignoring replicate");
                }
                series
            })
            .collect();
        if replicates.is_empty() {
            return Err(SkipReason::NoUsableData);
        }

        let averaged = average_replicates(&replicates, self.settings.replicate_averaging);
        let cleaned = preprocess(&averaged, self.settings.smoothing_sigma);
        let peak = cleaned.peak().ok_or(SkipReason::NoUsableData)?;
        if peak < self.settings.detectability_floor {
            return Err(SkipReason::BelowDetectability { peak });
        }

        let window = select_window(&cleaned, level.cs_conc, yield_fraction).map_err(|e| {
            debug!(cs_conc = level.cs_conc, error = %e, "Growth window rejected");
            SkipReason::InsufficientGrowth
        })?;
        FitArgs::from_window(window).ok_or(SkipReason::InsufficientGrowth)
    }

    /// Fits the level at `index` on its own. Every other level keeps the
    /// outcome already recorded for it in `others`, or is left out when
    /// `others` is empty.
    fn fit_single_level(
        &mut self,
        group: &ConditionGroup,
        index: usize,
        others: Vec<LevelFit>,
        mut comment: String,
    ) -> ConditionFit {
        let level = &group.levels[index];
        let prepared = self.prepare_level(level, self.settings.single.yield_fraction);
        let mut outcome = ConditionFit::empty(group.key.clone(), comment.clone());

        let args = match prepared {
            Ok(args) => args,
            Err(reason) => {
                warn!(condition = %group.key, cs_conc = level.cs_conc, ?reason, "Level skipped");
                outcome.levels = place_level(others, index, skipped_level(level, reason));
                return outcome;
            }
        };

        let fit = match fit_single(
            &args,
            &self.settings.single,
            self.settings.restarts,
            &mut self.rng,
            &self.ode,
        ) {
            Ok(fit) => fit,
            Err(e) => {
                warn!(condition = %group.key, error = %e, "Single-level fit failed");
                outcome.levels = place_level(others, index, skipped_level(level, fit_failed(&e)));
                return outcome;
            }
        };

        let fitted = LevelFit {
            cs_conc: level.cs_conc,
            linegroups: level.linegroups.clone(),
            trajectory: fit.trajectory,
            skipped: None,
        };
        let levels = place_level(others, index, fitted);

        append_comment(&mut comment, SINGLE_FIT_COMMENT);
        ConditionFit {
            key: group.key.clone(),
            method: Some(FitMethod::Single),
            parameters: Some(fit.parameters.rounded(self.settings.report_precision)),
            levels,
            comment,
        }
    }

    fn fit_joint_levels(&mut self, group: &ConditionGroup, comment: String) -> ConditionFit {
        let yield_fraction = self.settings.joint.yield_fraction;
        let prepared: Vec<Result<FitArgs, SkipReason>> = group
            .levels
            .iter()
            .map(|level| self.prepare_level(level, yield_fraction))
            .collect();

        let mut levels: Vec<LevelFit> = Vec::with_capacity(group.levels.len());
        let mut usable: Vec<(usize, FitArgs)> = Vec::new();
        for (index, (level, result)) in group.levels.iter().zip(prepared).enumerate() {
            match result {
                Ok(args) => {
                    usable.push((index, args));
                    levels.push(LevelFit {
                        cs_conc: level.cs_conc,
                        linegroups: level.linegroups.clone(),
                        trajectory: Vec::new(),
                        skipped: None,
                    });
                }
                Err(reason) => {
                    warn!(
                        condition = %group.key,
                        cs_conc = level.cs_conc,
                        ?reason,
                        "Level skipped"
                    );
                    levels.push(skipped_level(level, reason));
                }
            }
        }

        match usable.len() {
            0 => ConditionFit {
                levels,
                ..ConditionFit::empty(group.key.clone(), comment)
            },
            1 => {
                let index = usable[0].0;
                info!(condition = %group.key, "One usable level, falling back to single-level fit");
                self.fit_single_level(group, index, levels, comment)
            }
            _ => {
                let args: Vec<FitArgs> = usable.iter().map(|(_, a)| a.clone()).collect();
                let fit = match fit_joint(
                    &args,
                    &self.settings.joint,
                    self.settings.restarts,
                    &mut self.rng,
                    &self.ode,
                ) {
                    Ok(fit) => fit,
                    Err(e) => {
                        warn!(condition = %group.key, error = %e, "Joint fit failed");
                        for (index, _) in &usable {
                            levels[*index].skipped = Some(fit_failed(&e));
                        }
                        return ConditionFit {
                            levels,
                            ..ConditionFit::empty(group.key.clone(), comment)
                        };
                    }
                };

                for (index, level_args) in &usable {
                    match simulate_level(level_args, &fit.parameters, &self.ode) {
                        Ok(trajectory) => levels[*index].trajectory = trajectory,
                        Err(e) => {
                            warn!(
                                condition = %group.key,
                                cs_conc = levels[*index].cs_conc,
                                error = %e,
                                "Could not simulate fitted trajectory"
                            );
                            levels[*index].skipped = Some(fit_failed(&e));
                        }
                    }
                }

                ConditionFit {
                    key: group.key.clone(),
                    method: Some(FitMethod::Joint),
                    parameters: Some(fit.parameters.rounded(self.settings.report_precision)),
                    levels,
                    comment,
                }
            }
        }
    }
}
