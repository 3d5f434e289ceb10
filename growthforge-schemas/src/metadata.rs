use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-linegroup experimental conditions, one row per linegroup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinegroupMetadata {
    pub linegroup: String,
    pub species: String,
    pub carbon_source: String,
    pub cs_conc: f64,
    pub project: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConditionKey {
    pub species: String,
    pub carbon_source: String,
}

impl ConditionKey {
    pub fn new(species: impl Into<String>, carbon_source: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            carbon_source: carbon_source.into(),
        }
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.species, self.carbon_source)
    }
}
