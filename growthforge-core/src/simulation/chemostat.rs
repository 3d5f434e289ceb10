//! Continuous culture of one species on a single supplied resource.
//!
//! ```text
//! dN/dt = v * R/(R + Km) * N - D * N
//! dR/dt = D * M - v * R/(R + Km) * N / q - D * R
//! ```

use super::{
    integrator::{solve_at, OdeOptions, State},
    monod::saturation,
};
use crate::error::{GrowthForgeError, Result};
use growthforge_schemas::chemostat::{ChemostatParameters, SteadyState};
use ode_solvers::System;

/// Inoculum density of a simulated chemostat run.
pub const INITIAL_DENSITY: f64 = 0.05;
/// Smallest dilution rate of a steady-state sweep.
const MIN_DILUTION: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct ChemostatModel {
    pub params: ChemostatParameters,
}

impl System<f64, State> for ChemostatModel {
    fn system(&self, _t: f64, y: &State, dydt: &mut State) {
        let p = &self.params;
        let growth = p.v * saturation(y[1], p.km) * y[0];
        dydt[0] = growth - p.dilution * y[0];
        let consumption = if p.q > 0.0 { growth / p.q } else { 0.0 };
        dydt[1] = p.dilution * p.supply - consumption - p.dilution * y[1];
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChemostatRun {
    pub time: Vec<f64>,
    pub density: Vec<f64>,
    pub resource: Vec<f64>,
}

/// Evenly spaced grid of `points` samples covering `[start, end]`.
pub fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (points - 1) as f64;
            (0..points).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Simulates `hours` of operation from an inoculum of [`INITIAL_DENSITY`] in
/// a vessel filled with supply medium, sampled ten times per hour.
pub fn simulate(
    params: &ChemostatParameters,
    hours: f64,
    opts: &OdeOptions,
) -> Result<ChemostatRun> {
    if !(hours > 0.0) {
        return Err(GrowthForgeError::ConfigError(format!(
            "chemostat duration must be positive, got {hours}"
        )));
    }
    let time = linspace(0.0, hours, (hours * 10.0).round() as usize);
    let model = ChemostatModel { params: params.clone() };
    let states = solve_at(&model, State::new(INITIAL_DENSITY, params.supply), &time, opts)?;
    let (density, resource) = states.into_iter().map(|s| (s[0], s[1])).unzip();
    Ok(ChemostatRun {
        time,
        density,
        resource,
    })
}

/// Dilution rate above which the population washes out.
pub fn critical_dilution(params: &ChemostatParameters) -> f64 {
    params.supply * params.v / (params.km + params.supply)
}

/// Steady-state resource concentration at dilution rate `dilution`.
pub fn r_star(params: &ChemostatParameters, dilution: f64) -> f64 {
    dilution * params.km / (params.v - dilution)
}

/// Steady-state population density at dilution rate `dilution`.
pub fn n_star(params: &ChemostatParameters, dilution: f64) -> f64 {
    params.q * (params.supply - r_star(params, dilution))
}

/// Steady states over `points` dilution rates up to the washout threshold.
pub fn steady_state_curve(params: &ChemostatParameters, points: usize) -> Vec<SteadyState> {
    linspace(MIN_DILUTION, critical_dilution(params), points)
        .into_iter()
        .map(|dilution| SteadyState {
            dilution,
            r_star: r_star(params, dilution),
            n_star: n_star(params, dilution),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn steady_states_zero_the_right_hand_side() {
        let params = ChemostatParameters::default();
        for state in steady_state_curve(&params, 20).iter().take(19) {
            let mut p = params.clone();
            p.dilution = state.dilution;
            let mut dydt = State::zeros();
            let steady = State::new(state.n_star, state.r_star);
            ChemostatModel { params: p }.system(0.0, &steady, &mut dydt);
            assert_relative_eq!(dydt[0], 0.0, epsilon = 1e-10);
            assert_relative_eq!(dydt[1], 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn washout_threshold_leaves_no_population() {
        let params = ChemostatParameters::default();
        let d_crit = critical_dilution(&params);
        assert_relative_eq!(d_crit, 10.0 * 0.3 / 11.0);
        assert_relative_eq!(r_star(&params, d_crit), params.supply, max_relative = 1e-12);
        assert_relative_eq!(n_star(&params, d_crit), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn long_run_converges_to_steady_state() {
        let params = ChemostatParameters::default();
        let run = simulate(&params, 300.0, &OdeOptions::default()).unwrap();
        assert_eq!(run.time.len(), 3000);
        assert_relative_eq!(*run.time.last().unwrap(), 300.0);
        assert_relative_eq!(
            *run.resource.last().unwrap(),
            r_star(&params, params.dilution),
            max_relative = 1e-3
        );
        assert_relative_eq!(
            *run.density.last().unwrap(),
            n_star(&params, params.dilution),
            max_relative = 1e-3
        );
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        let params = ChemostatParameters::default();
        assert!(simulate(&params, 0.0, &OdeOptions::default()).is_err());
    }
}
