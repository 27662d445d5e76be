//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid JSON in {var}: {source}")]
    Env {
        var: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
