//! Estimation of Monod parameters from windowed growth curves.

pub mod joint;
pub mod optimizer;
pub mod single;

use crate::window::{max_log_slope, GrowthWindow};
use growthforge_schemas::fit::TrajectoryPoint;

/// Everything the estimators need from one usable concentration level.
#[derive(Debug, Clone, PartialEq)]
pub struct FitArgs {
    pub time: Vec<f64>,
    pub measurement: Vec<f64>,
    /// Resource available at the start of the window.
    pub c0: f64,
    /// Density at the start of the window.
    pub n0: f64,
    pub total_yield: f64,
    /// Largest observed log-slope. Bounds the joint fit's growth rate from
    /// below and is the growth rate of single-level fits.
    pub empirical_rate: f64,
}

impl FitArgs {
    /// Returns `None` when no finite growth rate can be read off the window.
    pub fn from_window(window: GrowthWindow) -> Option<Self> {
        let empirical_rate = max_log_slope(&window.time, &window.measurement)?;
        Some(Self {
            empirical_rate,
            c0: window.c0,
            n0: window.n0,
            total_yield: window.total_yield,
            time: window.time,
            measurement: window.measurement,
        })
    }

    /// Window time shifted so the simulation starts at zero.
    pub fn elapsed(&self) -> Vec<f64> {
        let t0 = self.time.first().copied().unwrap_or(0.0);
        self.time.iter().map(|t| t - t0).collect()
    }
}

/// Pairs the window's original timestamps with predicted densities.
pub(crate) fn trajectory_points(time: &[f64], predicted: &[f64]) -> Vec<TrajectoryPoint> {
    time.iter()
        .zip(predicted)
        .map(|(&time, &predicted)| TrajectoryPoint { time, predicted })
        .collect()
}
