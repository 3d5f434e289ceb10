//! Monod growth of a single population on one limiting resource.
//!
//! ```text
//! dN/dt =  v * C/(Km + C) * N
//! dC/dt = -v * C/(Km + C) * N / q
//! ```

use super::integrator::{solve_at, OdeOptions, State};
use crate::error::Result;
use ode_solvers::System;

/// Monod saturation `C / (Km + C)`.
///
/// Zero when the resource is exhausted (`C <= 0`) or when the ratio is not
/// defined, which covers the `C = Km = 0` limit.
pub fn saturation(c: f64, km: f64) -> f64 {
    if c <= 0.0 {
        return 0.0;
    }
    let denominator = km + c;
    if denominator <= 0.0 {
        return 0.0;
    }
    let ratio = c / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Monod kinetics in physical units. State is `[N, C]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonodModel {
    pub v: f64,
    pub km: f64,
    /// Biomass produced per unit resource consumed. A non-positive yield
    /// leaves the resource untouched.
    pub q: f64,
}

impl System<f64, State> for MonodModel {
    fn system(&self, _t: f64, y: &State, dydt: &mut State) {
        let growth = self.v * saturation(y[1], self.km) * y[0];
        dydt[0] = growth;
        dydt[1] = if self.q > 0.0 { -growth / self.q } else { 0.0 };
    }
}

/// Monod kinetics in nondimensional form.
///
/// With `tau = v * t`, `n = N / n0` and `c = C / c0` the system reduces to two
/// parameters, `km_ratio = Km / c0` and `q_scaled = q * c0 / n0`, and starts
/// from `[1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledMonod {
    pub km_ratio: f64,
    pub q_scaled: f64,
}

impl ScaledMonod {
    pub fn new(km: f64, q: f64, n0: f64, c0: f64) -> Self {
        Self {
            km_ratio: km / c0,
            q_scaled: q * c0 / n0,
        }
    }
}

impl System<f64, State> for ScaledMonod {
    fn system(&self, _t: f64, y: &State, dydt: &mut State) {
        let growth = saturation(y[1], self.km_ratio) * y[0];
        dydt[0] = growth;
        dydt[1] = if self.q_scaled > 0.0 { -growth / self.q_scaled } else { 0.0 };
    }
}

/// Population density and resource concentration sampled on a time grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonodTrajectory {
    pub time: Vec<f64>,
    pub density: Vec<f64>,
    pub resource: Vec<f64>,
}

/// Simulates `model` from `(n0, c0)` at `time[0]` and samples every entry of
/// `time`.
pub fn simulate(
    model: &MonodModel,
    n0: f64,
    c0: f64,
    time: &[f64],
    opts: &OdeOptions,
) -> Result<MonodTrajectory> {
    let states = solve_at(model, State::new(n0, c0), time, opts)?;
    let (density, resource) = states.into_iter().map(|s| (s[0], s[1])).unzip();
    Ok(MonodTrajectory {
        time: time.to_vec(),
        density,
        resource,
    })
}

/// Simulates the nondimensional system on `time` shifted to start at zero and
/// scaled by `v`, returning the density relative to its starting value.
pub fn simulate_scaled(
    model: &ScaledMonod,
    v: f64,
    time: &[f64],
    opts: &OdeOptions,
) -> Result<Vec<f64>> {
    let Some(&t0) = time.first() else {
        return Ok(Vec::new());
    };
    let tau: Vec<f64> = time.iter().map(|t| (t - t0) * v).collect();
    let states = solve_at(model, State::new(1.0, 1.0), &tau, opts)?;
    Ok(states.into_iter().map(|s| s[0]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn saturation_is_guarded_at_the_singularity() {
        assert_eq!(saturation(0.0, 0.0), 0.0);
        assert_eq!(saturation(-1e-12, 0.0), 0.0);
        assert_eq!(saturation(1.0, -1.0), 0.0);
        assert_eq!(saturation(2.0, 0.0), 1.0);
        assert_relative_eq!(saturation(2.0, 2.0), 0.5);

        let mut dydt = State::new(f64::NAN, f64::NAN);
        MonodModel { v: 1.0, km: 0.0, q: 0.3 }.system(0.0, &State::new(0.1, 0.0), &mut dydt);
        assert_eq!(dydt, State::new(0.0, 0.0));
    }

    #[test]
    fn biomass_plus_converted_resource_is_conserved() {
        let model = MonodModel { v: 0.5, km: 2.0, q: 0.3 };
        let time: Vec<f64> = (0..50).map(|i| i as f64 * 0.5).collect();
        let traj = simulate(&model, 0.01, 10.0, &time, &OdeOptions::default()).unwrap();
        for (n, c) in traj.density.iter().zip(&traj.resource) {
            assert_relative_eq!(n + model.q * c, 0.01 + 0.3 * 10.0, max_relative = 1e-7);
            assert!(*c >= -1e-9);
        }
        // Saturates at n0 + q * c0 once the resource is exhausted.
        assert_relative_eq!(*traj.density.last().unwrap(), 3.01, max_relative = 1e-4);
    }

    #[test]
    fn scaled_system_matches_physical_units() {
        let (v, km, q, n0, c0) = (0.7, 1.5, 0.25, 0.02, 8.0);
        let time = [3.0, 3.4, 4.0, 5.5, 7.0, 9.25, 12.0];
        let opts = OdeOptions::default();

        let shifted: Vec<f64> = time.iter().map(|t| t - time[0]).collect();
        let physical = simulate(&MonodModel { v, km, q }, n0, c0, &shifted, &opts).unwrap();
        let scaled = simulate_scaled(&ScaledMonod::new(km, q, n0, c0), v, &time, &opts).unwrap();

        for (n, s) in physical.density.iter().zip(&scaled) {
            assert_relative_eq!(n / n0, *s, max_relative = 1e-6);
        }
    }

    #[test]
    fn zero_resource_means_no_growth() {
        let model = MonodModel { v: 1.0, km: 0.0, q: 0.5 };
        let traj = simulate(&model, 0.1, 0.0, &[0.0, 1.0, 2.0], &OdeOptions::default()).unwrap();
        assert_eq!(traj.density, vec![0.1, 0.1, 0.1]);
        assert!(traj.density.iter().all(|n| n.is_finite()));
    }
}
