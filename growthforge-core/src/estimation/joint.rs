//! Shared `(v_max, Km)` estimate across several starting concentrations.
//!
//! Each level is simulated in nondimensional form, so levels with very
//! different inocula contribute on a comparable scale.

use super::{
    optimizer::{multi_start, sample_uniform, NelderMeadOptions},
    trajectory_points, FitArgs,
};
use crate::{
    error::{GrowthForgeError, Result},
    simulation::{
        integrator::OdeOptions,
        monod::{simulate, simulate_scaled, MonodModel, ScaledMonod},
    },
};
use growthforge_schemas::{
    fit::{FitParameters, TrajectoryPoint},
    settings::{Interval, JointFitSettings},
};
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct JointFit {
    pub parameters: FitParameters,
    pub residual: f64,
}

/// Squared residual of one level relative to its starting density.
fn level_residual(args: &FitArgs, km: f64, v: f64, opts: &OdeOptions) -> f64 {
    let model = ScaledMonod::new(km, args.total_yield, args.n0, args.c0);
    match simulate_scaled(&model, v, &args.time, opts) {
        Ok(scaled) => args
            .measurement
            .iter()
            .zip(&scaled)
            .map(|(observed, predicted)| (observed / args.n0 - predicted).powi(2))
            .sum(),
        Err(_) => f64::INFINITY,
    }
}

/// Sum of nondimensional squared residuals over every level.
pub fn joint_objective(levels: &[FitArgs], km: f64, v: f64, opts: &OdeOptions) -> f64 {
    levels
        .iter()
        .map(|args| level_residual(args, km, v, opts))
        .sum()
}

/// Search box of the joint fit. The growth rate cannot fall below the
/// fastest growth seen directly in any level.
pub fn joint_bounds(levels: &[FitArgs], settings: &JointFitSettings) -> [Interval; 2] {
    let empirical = levels
        .iter()
        .map(|args| args.empirical_rate)
        .fold(f64::NEG_INFINITY, f64::max);
    let v_min = empirical.min(settings.v_max_bound);
    [settings.km_bounds, Interval::new(v_min, settings.v_max_bound)]
}

/// Fits `(Km, v_max)` shared by every level.
///
/// Errors when `levels` is empty or when no evaluated parameter pair could be
/// simulated for every level.
pub fn fit_joint<R: Rng>(
    levels: &[FitArgs],
    settings: &JointFitSettings,
    restarts: usize,
    rng: &mut R,
    ode: &OdeOptions,
) -> Result<JointFit> {
    if levels.is_empty() {
        return Err(GrowthForgeError::ConfigError(
            "joint fit needs at least one concentration level".into(),
        ));
    }
    let bounds = joint_bounds(levels, settings);
    let objective = |x: &[f64]| joint_objective(levels, x[0], x[1], ode);

    let best = multi_start(
        &objective,
        &bounds,
        restarts.max(1),
        rng,
        |rng: &mut R| {
            vec![
                bounds[0].clamp(sample_uniform(rng, &settings.km_start)),
                bounds[1].clamp(sample_uniform(rng, &settings.v_start)),
            ]
        },
        &NelderMeadOptions::default(),
    )
    .ok_or_else(|| GrowthForgeError::Optimization("every restart failed".into()))?;
    if !best.value.is_finite() {
        return Err(GrowthForgeError::Optimization(
            "no parameters inside the bounds could be simulated".into(),
        ));
    }

    Ok(JointFit {
        parameters: FitParameters {
            km: best.x[0],
            v_max: best.x[1],
        },
        residual: best.value,
    })
}

/// Physical-unit trajectory of one level under the fitted parameters, on the
/// level's original timestamps.
pub fn simulate_level(
    args: &FitArgs,
    parameters: &FitParameters,
    opts: &OdeOptions,
) -> Result<Vec<TrajectoryPoint>> {
    let model = MonodModel {
        v: parameters.v_max,
        km: parameters.km,
        q: args.total_yield,
    };
    let traj = simulate(&model, args.n0, args.c0, &args.elapsed(), opts)?;
    Ok(trajectory_points(&args.time, &traj.density))
}
