//! Error types for the api crate.

use thiserror::Error;

/// Result type alias for resource operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Resource model errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A spec field could not be expressed as a Datadog request.
    #[error("cannot translate monitor spec: {0}")]
    Translate(#[from] ddmon_datadog::Error),

    /// A manifest document is not a Monitor.
    #[error("invalid manifest: {reason}")]
    InvalidManifest { reason: String },

    /// YAML parse error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create an invalid manifest error.
    pub fn invalid_manifest(reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            reason: reason.into(),
        }
    }
}
