//! Cleaning of optical density time series before fitting.
//!
//! Replicate linegroups of one concentration level are first combined into a
//! single series, then positions with a missing time or measurement are
//! dropped and the measurement is smoothed with a Gaussian kernel.

use growthforge_schemas::{
    measurement::{MergedRecord, TimeSeries},
    settings::ReplicateAveraging,
};
use std::collections::HashMap;

/// Kernel half-width in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Splits the merged table into one time-sorted series per linegroup.
pub fn series_by_linegroup(records: &[MergedRecord]) -> HashMap<String, TimeSeries> {
    let mut rows: HashMap<String, Vec<(f64, f64)>> = HashMap::new();
    for record in records {
        rows.entry(record.linegroup.clone()).or_default().push((
            record.time.unwrap_or(f64::NAN),
            record.measurement.unwrap_or(f64::NAN),
        ));
    }

    rows.into_iter()
        .map(|(linegroup, mut points)| {
            // Missing times sort last.
            points.sort_by(|a, b| match (a.0.is_nan(), b.0.is_nan()) {
                (false, false) => a.0.total_cmp(&b.0),
                (a_nan, b_nan) => a_nan.cmp(&b_nan),
            });
            let (time, measurement) = points.into_iter().unzip();
            (linegroup, TimeSeries::new(time, measurement))
        })
        .collect()
}

/// Combines replicate series of one concentration level into a single series.
///
/// With [`ReplicateAveraging::FirstGrid`] the first replicate's time grid is
/// kept and measurements are averaged index by index over the shortest
/// replicate. With [`ReplicateAveraging::Interpolated`] every replicate is
/// linearly interpolated onto the first replicate's grid; replicates that do
/// not cover a time point are left out of that point's mean.
pub fn average_replicates(replicates: &[&TimeSeries], policy: ReplicateAveraging) -> TimeSeries {
    let Some(first) = replicates.first() else {
        return TimeSeries::default();
    };

    match policy {
        ReplicateAveraging::FirstGrid => {
            let len = replicates.iter().map(|r| r.len()).min().unwrap_or(0);
            let count = replicates.len() as f64;
            let measurement = (0..len)
                .map(|i| replicates.iter().map(|r| r.measurement[i]).sum::<f64>() / count)
                .collect();
            TimeSeries::new(first.time[..len].to_vec(), measurement)
        }
        ReplicateAveraging::Interpolated => {
            let cleaned: Vec<TimeSeries> = replicates
                .iter()
                .map(|r| drop_missing(&r.time, &r.measurement))
                .collect();
            let len = first.len();
            let measurement = first.time[..len]
                .iter()
                .map(|&t| {
                    if t.is_nan() {
                        return f64::NAN;
                    }
                    let values: Vec<f64> =
                        cleaned.iter().filter_map(|r| interpolate(r, t)).collect();
                    if values.is_empty() {
                        f64::NAN
                    } else {
                        values.iter().sum::<f64>() / values.len() as f64
                    }
                })
                .collect();
            TimeSeries::new(first.time[..len].to_vec(), measurement)
        }
    }
}

/// Linear interpolation inside the sampled span of a clean, time-sorted series.
pub fn interpolate(series: &TimeSeries, t: f64) -> Option<f64> {
    let times = &series.time;
    let first = *times.first()?;
    let last = *times.last()?;
    if t < first || t > last {
        return None;
    }
    let upper = times.partition_point(|&x| x < t);
    if upper < times.len() && times[upper] == t {
        return Some(series.measurement[upper]);
    }
    let (t0, t1) = (times[upper - 1], times[upper]);
    let (m0, m1) = (series.measurement[upper - 1], series.measurement[upper]);
    Some(m0 + (m1 - m0) * (t - t0) / (t1 - t0))
}

/// Removes positions where the time is missing, then positions where the
/// measurement is missing.
pub fn drop_missing(time: &[f64], measurement: &[f64]) -> TimeSeries {
    let (time, measurement) = time
        .iter()
        .zip(measurement)
        .filter(|(t, _)| !t.is_nan())
        .filter(|(_, m)| !m.is_nan())
        .map(|(&t, &m)| (t, m))
        .unzip();
    TimeSeries::new(time, measurement)
}

/// One-dimensional Gaussian filter with half-sample symmetric boundaries.
pub fn gaussian_filter1d(values: &[f64], sigma: f64) -> Vec<f64> {
    if values.is_empty() || sigma <= 0.0 {
        return values.to_vec();
    }

    let radius = (TRUNCATE * sigma + 0.5) as i64;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let norm: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= norm);

    let n = values.len() as i64;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .zip(-radius..=radius)
                .map(|(w, offset)| w * values[reflect_index(i + offset, n)])
                .sum()
        })
        .collect()
}

fn reflect_index(i: i64, n: i64) -> usize {
    let m = i.rem_euclid(2 * n);
    (if m < n { m } else { 2 * n - 1 - m }) as usize
}

/// Drops missing samples and smooths the remaining measurements.
pub fn preprocess(series: &TimeSeries, sigma: f64) -> TimeSeries {
    let mut cleaned = drop_missing(&series.time, &series.measurement);
    cleaned.measurement = gaussian_filter1d(&cleaned.measurement, sigma);
    cleaned
}
