//! Selection of the time window over which growth dynamics are fitted.

use growthforge_schemas::measurement::TimeSeries;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("series is empty")]
    Empty,
    #[error("no positive measurement to use as baseline")]
    NoBaseline,
    #[error("measurement never exceeds {threshold:.4} of yield above baseline")]
    ThresholdNotReached { threshold: f64 },
    #[error("growth window [{start}, {end}) holds fewer than two samples")]
    WindowTooShort { start: usize, end: usize },
}

/// Fitting inputs derived from one cleaned concentration level.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthWindow {
    /// Baseline of the full series: the first strictly positive measurement.
    pub baseline: f64,
    /// Biomass produced per unit substrate, `(max - baseline) / c0`.
    pub total_yield: f64,
    pub min_time_index: usize,
    pub max_time_index: usize,
    pub time: Vec<f64>,
    pub measurement: Vec<f64>,
    /// Density at the start of the window.
    pub n0: f64,
    /// Substrate assumed available at the start of the window, `c0 * (1 - f)`.
    pub c0: f64,
}

/// First measurement strictly greater than zero.
pub fn baseline(measurement: &[f64]) -> Option<f64> {
    measurement.iter().copied().find(|&m| m > 0.0)
}

/// Index of the first maximum.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Trims a cleaned series to the part where growth has started (at least a
/// fraction `yield_fraction` of the total yield produced) and has not yet
/// peaked.
///
/// The window is the half-open index range `[min_time_index, max_time_index)`.
pub fn select_window(
    series: &TimeSeries,
    c0: f64,
    yield_fraction: f64,
) -> Result<GrowthWindow, WindowError> {
    let measurement = &series.measurement[..series.len()];
    let max_time_index = argmax(measurement).ok_or(WindowError::Empty)?;
    let baseline = baseline(measurement).ok_or(WindowError::NoBaseline)?;

    let total_yield = (measurement[max_time_index] - baseline) / c0;
    let threshold = total_yield * yield_fraction;
    let min_time_index = measurement
        .iter()
        .position(|&m| (m - baseline) / c0 > threshold)
        .ok_or(WindowError::ThresholdNotReached { threshold })?;

    if max_time_index < min_time_index + 2 {
        return Err(WindowError::WindowTooShort {
            start: min_time_index,
            end: max_time_index,
        });
    }

    let time = series.time[min_time_index..max_time_index].to_vec();
    let measurement = measurement[min_time_index..max_time_index].to_vec();
    Ok(GrowthWindow {
        baseline,
        total_yield,
        min_time_index,
        max_time_index,
        n0: measurement[0],
        c0: c0 * (1.0 - yield_fraction),
        time,
        measurement,
    })
}

/// Largest pointwise slope of `ln(measurement)` over time.
///
/// Used as a closed-form growth-rate proxy and as the lower bound of the
/// joint fit's growth-rate search. Non-finite slopes are ignored.
pub fn max_log_slope(time: &[f64], measurement: &[f64]) -> Option<f64> {
    time.windows(2)
        .zip(measurement.windows(2))
        .map(|(t, m)| (m[1].ln() - m[0].ln()) / (t[1] - t[0]))
        .filter(|slope| slope.is_finite())
        .fold(None, |acc, s| Some(acc.map_or(s, |a: f64| a.max(s))))
}
