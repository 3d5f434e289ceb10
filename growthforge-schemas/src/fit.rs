use crate::metadata::ConditionKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    Single,
    Joint,
}

/// Why a concentration level did not contribute to a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkipReason {
    NoUsableData,
    BelowDetectability { peak: f64 },
    InsufficientGrowth,
    /// The level was usable but the fit or its trajectory simulation failed.
    FitFailed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParameters {
    pub v_max: f64,
    pub km: f64,
}

impl FitParameters {
    pub fn rounded(&self, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        Self {
            v_max: (self.v_max * scale).round() / scale,
            km: (self.km * scale).round() / scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub time: f64,
    pub predicted: f64,
}

/// Model trajectory of one concentration level. `trajectory` is empty when the
/// level was excluded, in which case `skipped` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelFit {
    pub cs_conc: f64,
    pub linegroups: Vec<String>,
    pub trajectory: Vec<TrajectoryPoint>,
    pub skipped: Option<SkipReason>,
}

impl LevelFit {
    pub fn is_fitted(&self) -> bool {
        !self.trajectory.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionFit {
    pub key: ConditionKey,
    pub method: Option<FitMethod>,
    pub parameters: Option<FitParameters>,
    /// One entry per nominal concentration, in the condition's level order.
    pub levels: Vec<LevelFit>,
    pub comment: String,
}

impl ConditionFit {
    pub fn empty(key: ConditionKey, comment: String) -> Self {
        Self {
            key,
            method: None,
            parameters: None,
            levels: Vec::new(),
            comment,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.parameters.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub conditions: Vec<ConditionFit>,
}

impl FitReport {
    pub fn fitted(&self) -> impl Iterator<Item = &ConditionFit> {
        self.conditions.iter().filter(|c| c.is_fitted())
    }

    pub fn get(&self, key: &ConditionKey) -> Option<&ConditionFit> {
        self.conditions.iter().find(|c| &c.key == key)
    }
}
