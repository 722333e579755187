use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The only failures a query can surface. Everything else degrades into
/// the returned outcome.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("Fatal configuration error: {0}")]
    Configuration(String),

    #[error("query was cancelled")]
    Cancelled,
}

impl From<ConfigError> for OrchestrationError {
    fn from(err: ConfigError) -> Self {
        OrchestrationError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;
