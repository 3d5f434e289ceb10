//! Dormand–Prince 5(4) integration with output on a caller-supplied time grid.
//!
//! The solver is restarted between consecutive grid points, so irregular
//! plate-reader sampling is reproduced exactly without interpolation.

use crate::error::{GrowthForgeError, Result};
use growthforge_schemas::settings::OdeTolerances;
use ode_solvers::dop_shared::OutputType;
use ode_solvers::dopri5::Dopri5;
use ode_solvers::{System, Vector2};

/// State of every two-compartment system in this crate: population density
/// first, resource concentration second.
pub type State = Vector2<f64>;

#[derive(Debug, Clone)]
pub struct OdeOptions {
    pub rtol: f64,
    pub atol: f64,
    /// Step limit for the integration between two consecutive grid points.
    pub max_steps: usize,
}

impl Default for OdeOptions {
    fn default() -> Self {
        OdeOptions::from(&OdeTolerances::default())
    }
}

impl From<&OdeTolerances> for OdeOptions {
    fn from(tolerances: &OdeTolerances) -> Self {
        Self {
            rtol: tolerances.rtol,
            atol: tolerances.atol,
            max_steps: tolerances.max_steps,
        }
    }
}

/// Integrates `sys` over `[t0, t1]` and returns the state at `t1`.
fn advance<S>(sys: &S, y: State, t0: f64, t1: f64, opts: &OdeOptions) -> Result<State>
where
    S: System<f64, State> + Clone,
{
    let n_max = u32::try_from(opts.max_steps).unwrap_or(u32::MAX);
    let mut stepper = Dopri5::from_param(
        sys.clone(),
        t0,
        t1,
        t1 - t0,
        y,
        opts.rtol,
        opts.atol,
        0.9,
        0.04,
        0.2,
        10.0,
        t1 - t0,
        0.0,
        n_max,
        1000,
        OutputType::Sparse,
    );
    stepper.integrate().map_err(|e| {
        GrowthForgeError::Integration(format!("{e:?} between t={t0:.6e} and t={t1:.6e}"))
    })?;

    // Sparse output records every accepted step; the last one ends at `t1`.
    let Some(end) = stepper.y_out().last().copied() else {
        return Err(GrowthForgeError::Integration(format!(
            "no accepted step between t={t0:.6e} and t={t1:.6e}"
        )));
    };
    if end.iter().any(|v| !v.is_finite()) {
        return Err(GrowthForgeError::Integration(format!("non-finite state at t={t1:.6e}")));
    }
    Ok(end)
}

/// Integrates `sys` from state `y0` at `times[0]` and returns the state at
/// every entry of `times`.
///
/// `times` must be finite and non-decreasing. The first returned state is
/// `y0` itself.
pub fn solve_at<S>(sys: &S, y0: State, times: &[f64], opts: &OdeOptions) -> Result<Vec<State>>
where
    S: System<f64, State> + Clone,
{
    if y0.iter().any(|v| !v.is_finite()) {
        return Err(GrowthForgeError::Integration("initial state is not finite".into()));
    }
    if times.is_empty() {
        return Ok(Vec::new());
    }
    if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] < w[0]) {
        return Err(GrowthForgeError::Integration(
            "output times must be finite and non-decreasing".into(),
        ));
    }

    let mut out = Vec::with_capacity(times.len());
    let mut y = y0;
    out.push(y);
    for w in times.windows(2) {
        if w[1] > w[0] {
            y = advance(sys, y, w[0], w[1], opts)?;
        }
        out.push(y);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Two independent exponential decays.
    #[derive(Clone)]
    struct Decay(f64, f64);

    impl System<f64, State> for Decay {
        fn system(&self, _t: f64, y: &State, dy: &mut State) {
            dy[0] = -self.0 * y[0];
            dy[1] = -self.1 * y[1];
        }
    }

    #[derive(Clone)]
    struct Oscillator;

    impl System<f64, State> for Oscillator {
        fn system(&self, _t: f64, y: &State, dy: &mut State) {
            dy[0] = y[1];
            dy[1] = -y[0];
        }
    }

    #[test]
    fn decay_matches_analytic_solution_on_irregular_grid() {
        let times = [0.0, 0.1, 0.15, 1.0, 3.7, 3.7, 10.0];
        let opts = OdeOptions::default();
        let states = solve_at(&Decay(0.5, 0.1), State::new(2.0, 1.0), &times, &opts).unwrap();
        assert_eq!(states.len(), times.len());
        for (t, y) in times.iter().zip(&states) {
            assert_relative_eq!(y[0], 2.0 * (-0.5 * t).exp(), max_relative = 1e-6);
            assert_relative_eq!(y[1], (-0.1 * t).exp(), max_relative = 1e-6);
        }
    }

    #[test]
    fn oscillator_keeps_phase_over_several_periods() {
        let times: Vec<f64> = (0..=40).map(|i| i as f64 * 0.5).collect();
        let opts = OdeOptions::default();
        let states = solve_at(&Oscillator, State::new(1.0, 0.0), &times, &opts).unwrap();
        let last = states.last().unwrap();
        assert_relative_eq!(last[0], 20f64.cos(), epsilon = 1e-5);
        assert_relative_eq!(last[1], -20f64.sin(), epsilon = 1e-5);
    }

    #[test]
    fn grid_starting_away_from_zero_is_supported() {
        let opts = OdeOptions::default();
        let states = solve_at(&Decay(1.0, 1.0), State::new(1.0, 1.0), &[5.0, 6.0], &opts).unwrap();
        assert_relative_eq!(states[1][0], (-1f64).exp(), max_relative = 1e-7);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let opts = OdeOptions::default();
        let y0 = State::new(1.0, 1.0);
        assert!(solve_at(&Decay(1.0, 1.0), State::new(f64::NAN, 1.0), &[0.0, 1.0], &opts).is_err());
        assert!(solve_at(&Decay(1.0, 1.0), y0, &[1.0, 0.0], &opts).is_err());
        assert!(solve_at(&Decay(1.0, 1.0), y0, &[], &opts).unwrap().is_empty());

        let starved = OdeOptions { max_steps: 2, ..OdeOptions::default() };
        assert!(matches!(
            solve_at(&Oscillator, y0, &[0.0, 100.0], &starved),
            Err(GrowthForgeError::Integration(_))
        ));
    }
}
