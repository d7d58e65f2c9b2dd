//! Configuration error type

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a mapping configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON document is malformed or does not match the schema
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// The YAML document is malformed or does not match the schema
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// `server` is empty
    #[error("OSC server address cannot be empty")]
    EmptyServer,

    /// `port` is zero
    #[error("OSC port must be between 1 and 65535")]
    InvalidPort,

    /// A control definition failed validation
    #[error("invalid control '{control}': {reason}")]
    Invalid { control: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(control: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            control: control.into(),
            reason: reason.into(),
        }
    }
}
