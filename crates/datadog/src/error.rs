//! Error types for the datadog crate.

use thiserror::Error;

/// Result type for Datadog API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the Datadog monitor API.
#[derive(Error, Debug)]
pub enum Error {
    /// The API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The monitor does not exist on the Datadog side.
    #[error("monitor {id} not found")]
    NotFound { id: i64 },

    /// A threshold value is not a decimal number.
    #[error("threshold '{field}' is not a number: {value:?}")]
    InvalidThreshold { field: String, value: String },

    /// The API answered with a body we could not interpret.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// Configuration error.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Create an API error from a status code and response body.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Create a not found error.
    pub const fn not_found(id: i64) -> Self {
        Self::NotFound { id }
    }

    /// Create an invalid threshold error.
    pub fn invalid_threshold(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidThreshold {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create a config error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Check if the monitor is already gone on the Datadog side.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is worth retrying later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Http(_) => true,
            _ => false,
        }
    }
}
