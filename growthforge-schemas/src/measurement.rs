use serde::{Deserialize, Serialize};

/// One row of the merged measurement table.
///
/// Empty cells in the exported CSV deserialize to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub linegroup: String,
    pub time: Option<f64>,
    pub measurement: Option<f64>,
}

/// Time-ordered optical density readings of a single linegroup or of a
/// replicate-averaged concentration level. Missing values are stored as NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub time: Vec<f64>,
    pub measurement: Vec<f64>,
}

impl TimeSeries {
    pub fn new(time: Vec<f64>, measurement: Vec<f64>) -> Self {
        Self { time, measurement }
    }

    pub fn len(&self) -> usize {
        self.time.len().min(self.measurement.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest finite measurement, or `None` when every value is missing.
    pub fn peak(&self) -> Option<f64> {
        self.measurement
            .iter()
            .copied()
            .filter(|m| m.is_finite())
            .fold(None, |acc, m| Some(acc.map_or(m, |a: f64| a.max(m))))
    }
}
