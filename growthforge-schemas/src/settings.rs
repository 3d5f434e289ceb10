use serde::{Deserialize, Serialize};

/// Closed interval `[min, max]` used for optimizer bounds and sampling ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// How replicate linegroups of one concentration level are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicateAveraging {
    /// Keep the first replicate's time grid and average values index by index.
    #[default]
    FirstGrid,
    /// Interpolate every replicate onto the first replicate's grid before averaging.
    Interpolated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdeTolerances {
    pub rtol: f64,
    pub atol: f64,
    /// Step limit between two consecutive output times.
    pub max_steps: usize,
}

impl Default for OdeTolerances {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-10,
            max_steps: 100_000,
        }
    }
}

/// Search space of the Km-only fit used when a condition has one usable level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleFitSettings {
    pub yield_fraction: f64,
    pub km_bounds: Interval,
    pub km_start: Interval,
}

impl Default for SingleFitSettings {
    fn default() -> Self {
        Self {
            yield_fraction: 0.02,
            km_bounds: Interval::new(0.0, 1000.0),
            km_start: Interval::new(0.0, 20.0),
        }
    }
}

/// Search space of the shared (Km, v) fit across concentration levels.
///
/// The lower bound on `v` is not configured here: it is the largest growth
/// rate observed directly in the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointFitSettings {
    pub yield_fraction: f64,
    pub km_bounds: Interval,
    pub v_max_bound: f64,
    pub km_start: Interval,
    pub v_start: Interval,
}

impl Default for JointFitSettings {
    fn default() -> Self {
        Self {
            yield_fraction: 0.05,
            km_bounds: Interval::new(1e-6, 1000.0),
            v_max_bound: 10.0,
            km_start: Interval::new(0.001, 20.0),
            v_start: Interval::new(0.05, 2.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    /// Levels whose peak OD stays below this value are not fitted.
    pub detectability_floor: f64,
    pub restarts: usize,
    /// Seed for the multi-start sampler. `None` draws from system entropy.
    pub seed: Option<u64>,
    pub smoothing_sigma: f64,
    pub replicate_averaging: ReplicateAveraging,
    /// Decimal places of the reported `v_max` and `Km`.
    pub report_precision: u32,
    pub single: SingleFitSettings,
    pub joint: JointFitSettings,
    pub ode: OdeTolerances,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            detectability_floor: 0.05,
            restarts: 10,
            seed: None,
            smoothing_sigma: 1.0,
            replicate_averaging: ReplicateAveraging::default(),
            report_precision: 4,
            single: SingleFitSettings::default(),
            joint: JointFitSettings::default(),
            ode: OdeTolerances::default(),
        }
    }
}
