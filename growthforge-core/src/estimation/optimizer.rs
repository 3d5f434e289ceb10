//! Box-constrained Nelder–Mead minimization with randomized multi-start.
//!
//! The simplex moves freely and every trial point is projected onto the box
//! before evaluation. Objective values that are not finite (failed
//! simulations) rank as `+inf`, so the simplex moves away from them instead of
//! aborting.

use argmin::core::{CostFunction, Error, Executor};
use argmin::solver::neldermead::NelderMead;
use growthforge_schemas::settings::Interval;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct NelderMeadOptions {
    pub max_iterations: u64,
    /// Standard deviation of the simplex objective values at which a search
    /// stops.
    pub sd_tolerance: f64,
    /// Relative size of the initial simplex.
    pub initial_step: f64,
    /// Local searches restarted from the previous optimum.
    pub polish_rounds: usize,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1_000,
            sd_tolerance: 1e-14,
            initial_step: 0.05,
            polish_rounds: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: u64,
    pub status: String,
}

pub fn project(x: &mut [f64], bounds: &[Interval]) {
    for (xi, b) in x.iter_mut().zip(bounds) {
        *xi = b.clamp(*xi);
    }
}

/// An objective restricted to a box.
struct BoundedProblem<'a, F> {
    objective: &'a F,
    bounds: &'a [Interval],
}

impl<F: Fn(&[f64]) -> f64> BoundedProblem<'_, F> {
    fn projected(&self, x: &[f64]) -> Vec<f64> {
        let mut point = x.to_vec();
        project(&mut point, self.bounds);
        point
    }
}

impl<F: Fn(&[f64]) -> f64> CostFunction for BoundedProblem<'_, F> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        let value = (self.objective)(&self.projected(param));
        Ok(if value.is_nan() { f64::INFINITY } else { value })
    }
}

fn initial_simplex(start: &[f64], bounds: &[Interval], initial_step: f64) -> Vec<Vec<f64>> {
    let mut simplex = vec![start.to_vec()];
    for i in 0..start.len() {
        let mut vertex = start.to_vec();
        let step = if vertex[i] != 0.0 {
            initial_step * vertex[i]
        } else {
            0.00025
        };
        vertex[i] += step;
        if vertex[i] > bounds[i].max {
            vertex[i] = start[i] - step;
        }
        simplex.push(vertex);
    }
    simplex
}

fn nelder_mead<F>(
    problem: BoundedProblem<'_, F>,
    x0: &[f64],
    opts: &NelderMeadOptions,
) -> Result<Minimum, Error>
where
    F: Fn(&[f64]) -> f64,
{
    let start = problem.projected(x0);
    let solver = NelderMead::new(initial_simplex(&start, problem.bounds, opts.initial_step))
        .with_sd_tolerance(opts.sd_tolerance)?;
    let bounds = problem.bounds;
    let result = Executor::new(problem, solver)
        .configure(|state| state.max_iters(opts.max_iterations))
        .run()?;

    let state = result.state();
    let mut x = state.best_param.clone().unwrap_or(start);
    project(&mut x, bounds);
    Ok(Minimum {
        x,
        value: state.best_cost,
        iterations: state.iter,
        status: state.termination_status.to_string(),
    })
}

/// Minimizes `objective` inside `bounds` starting from `x0`.
///
/// Errors only when the simplex cannot be set up, which the box projection
/// rules out for finite starting points.
pub fn minimize_bounded<F>(
    objective: &F,
    x0: &[f64],
    bounds: &[Interval],
    opts: &NelderMeadOptions,
) -> Result<Minimum, Error>
where
    F: Fn(&[f64]) -> f64,
{
    let problem = || BoundedProblem { objective, bounds };
    let mut best = nelder_mead(problem(), x0, opts)?;
    for _ in 0..opts.polish_rounds {
        let polished = nelder_mead(problem(), &best.x, opts)?;
        let iterations = best.iterations + polished.iterations;
        let improved = polished.value < best.value;
        if polished.value <= best.value {
            best = Minimum { iterations, ..polished };
        } else {
            best.iterations = iterations;
        }
        if !improved {
            break;
        }
    }
    Ok(best)
}

/// RNG for multi-start sampling: reproducible when seeded, entropy otherwise.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Uniform draw from `interval`.
pub fn sample_uniform<R: Rng>(rng: &mut R, interval: &Interval) -> f64 {
    if interval.max > interval.min {
        rng.gen_range(interval.min..interval.max)
    } else {
        interval.min
    }
}

/// Best of `restarts` independent bounded minimizations.
///
/// Every starting point is drawn from `rng` before any search runs, so the
/// result depends only on the RNG state and not on scheduling. Searches run
/// in parallel; ties keep the earliest restart. Restarts whose search fails
/// are logged and left out. Returns `None` when no restart produced a result.
pub fn multi_start<F, R, S>(
    objective: &F,
    bounds: &[Interval],
    restarts: usize,
    rng: &mut R,
    mut sample_start: S,
    opts: &NelderMeadOptions,
) -> Option<Minimum>
where
    F: Fn(&[f64]) -> f64 + Sync,
    R: Rng,
    S: FnMut(&mut R) -> Vec<f64>,
{
    let starts: Vec<Vec<f64>> = (0..restarts).map(|_| sample_start(rng)).collect();

    let results: Vec<Result<Minimum, Error>> = starts
        .par_iter()
        .map(|x0| minimize_bounded(objective, x0, bounds, opts))
        .collect();

    let mut best: Option<Minimum> = None;
    for (i, (start, result)) in starts.iter().zip(results).enumerate() {
        match result {
            Ok(found) => {
                debug!(
                    restart = i,
                    ?start,
                    x = ?found.x,
                    value = found.value,
                    iterations = found.iterations,
                    status = %found.status,
                    "multi-start restart finished"
                );
                if best.as_ref().map_or(true, |b| found.value < b.value) {
                    best = Some(found);
                }
            }
            Err(e) => debug!(restart = i, ?start, error = %e, "multi-start restart failed"),
        }
    }
    best
}
