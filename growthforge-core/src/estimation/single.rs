//! Growth rate and half-saturation constant from a single concentration.
//!
//! With one concentration the two parameters are poorly separable, so the
//! growth rate is read directly off the data (largest log-slope) and only
//! `Km` is optimized against the simulated trajectory.

use super::{
    optimizer::{multi_start, sample_uniform, NelderMeadOptions},
    trajectory_points, FitArgs,
};
use crate::{
    error::{GrowthForgeError, Result},
    simulation::{
        integrator::OdeOptions,
        monod::{simulate, MonodModel},
    },
};
use growthforge_schemas::{
    fit::{FitParameters, TrajectoryPoint},
    settings::SingleFitSettings,
};
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct SingleFit {
    pub parameters: FitParameters,
    pub residual: f64,
    /// Predicted density on the window's timestamps.
    pub trajectory: Vec<TrajectoryPoint>,
}

/// Sum of squared differences between observed and simulated density for a
/// fixed growth rate `v`. Failed simulations score `+inf`.
pub fn km_residual(args: &FitArgs, v: f64, km: f64, opts: &OdeOptions) -> f64 {
    let model = MonodModel { v, km, q: args.total_yield };
    match simulate(&model, args.n0, args.c0, &args.elapsed(), opts) {
        Ok(traj) => args
            .measurement
            .iter()
            .zip(&traj.density)
            .map(|(observed, predicted)| (observed - predicted).powi(2))
            .sum(),
        Err(_) => f64::INFINITY,
    }
}

/// Fits `Km` with `v_max` fixed to the empirical growth rate.
///
/// Never fails on poor convergence: the best of `restarts` searches is kept.
/// Errors only when the final trajectory cannot be simulated.
pub fn fit_single<R: Rng>(
    args: &FitArgs,
    settings: &SingleFitSettings,
    restarts: usize,
    rng: &mut R,
    ode: &OdeOptions,
) -> Result<SingleFit> {
    let v_max = args.empirical_rate;
    let bounds = [settings.km_bounds];
    let objective = |x: &[f64]| km_residual(args, v_max, x[0], ode);

    let best = multi_start(
        &objective,
        &bounds,
        restarts.max(1),
        rng,
        |rng: &mut R| vec![sample_uniform(rng, &settings.km_start)],
        &NelderMeadOptions::default(),
    )
    .ok_or_else(|| GrowthForgeError::Optimization("every restart failed".into()))?;

    let km = best.x[0];
    let model = MonodModel { v: v_max, km, q: args.total_yield };
    let traj = simulate(&model, args.n0, args.c0, &args.elapsed(), ode)?;

    Ok(SingleFit {
        parameters: FitParameters { v_max, km },
        residual: best.value,
        trajectory: trajectory_points(&args.time, &traj.density),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::optimizer::make_rng;
    use crate::window::max_log_slope;

    fn monod_args(v: f64, km: f64, q: f64, n0: f64, c0: f64) -> FitArgs {
        let time: Vec<f64> = (0..60).map(|i| 2.0 + i as f64 * 0.25).collect();
        let model = MonodModel { v, km, q };
        let elapsed: Vec<f64> = time.iter().map(|t| t - 2.0).collect();
        let traj = simulate(&model, n0, c0, &elapsed, &OdeOptions::default()).unwrap();
        let empirical_rate = max_log_slope(&time, &traj.density).unwrap();
        FitArgs {
            time,
            measurement: traj.density,
            c0,
            n0,
            total_yield: q,
            empirical_rate,
        }
    }

    #[test]
    fn growth_rate_is_the_observed_log_slope() {
        let args = monod_args(0.5, 2.0, 0.3, 0.02, 10.0);
        let mut rng = make_rng(Some(1));
        let settings = SingleFitSettings::default();
        let fit = fit_single(&args, &settings, 10, &mut rng, &OdeOptions::default())
            .unwrap();

        assert_eq!(fit.parameters.v_max, args.empirical_rate);
        assert!(fit.parameters.v_max < 0.5);
        assert!(fit.parameters.km.is_finite());
        assert!((0.0..=1000.0).contains(&fit.parameters.km));
        assert_eq!(fit.trajectory.len(), args.time.len());
        assert_eq!(fit.trajectory[0].time, 2.0);
    }

    #[test]
    fn fitted_km_beats_distant_candidates() {
        let args = monod_args(0.4, 1.0, 0.25, 0.01, 5.0);
        let opts = OdeOptions::default();
        let mut rng = make_rng(Some(9));
        let fit = fit_single(&args, &SingleFitSettings::default(), 10, &mut rng, &opts).unwrap();

        for km in [20.0, 500.0] {
            assert!(fit.residual <= km_residual(&args, fit.parameters.v_max, km, &opts));
        }
    }
}
