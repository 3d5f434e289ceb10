use serde::{Deserialize, Serialize};

/// Kinetic and operating parameters of a single-species chemostat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemostatParameters {
    /// Half-saturation constant [mM].
    pub km: f64,
    /// Maximum growth rate [1/h].
    pub v: f64,
    /// Yield [OD/mM].
    pub q: f64,
    /// Supply concentration of the limiting resource [mM].
    pub supply: f64,
    /// Dilution rate [1/h].
    pub dilution: f64,
}

impl Default for ChemostatParameters {
    fn default() -> Self {
        Self {
            km: 1.0,
            v: 0.3,
            q: 0.1,
            supply: 10.0,
            dilution: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteadyState {
    pub dilution: f64,
    pub r_star: f64,
    pub n_star: f64,
}
