use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrowthForgeError {
    #[error("No metadata rows were supplied for fitting")]
    NoData,

    #[error("Linegroup '{0}' has no measurements in the merged table")]
    LinegroupNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("ODE integration failed: {0}")]
    Integration(String),

    #[error("Optimization failed: {0}")]
    Optimization(String),

    #[error("I/O error for file '{0}': {1}")]
    FileIO(String, #[source] std::io::Error),

    #[error("Failed to parse YAML from '{0}': {1}")]
    YamlParsing(String, #[source] serde_yaml::Error),

    #[error("Failed to serialize JSON: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Failed to process CSV file '{0}': {1}")]
    CsvError(String, #[source] csv::Error),

    #[error("An error occurred during logging: {0}")]
    LoggingError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GrowthForgeError>;
