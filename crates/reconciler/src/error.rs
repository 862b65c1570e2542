//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Error)]
pub enum Error {
    /// Resource not found in the store.
    #[error("monitor '{key}' not found")]
    NotFound { key: String },

    /// Resource already exists in the store.
    #[error("monitor '{key}' already exists")]
    AlreadyExists { key: String },

    /// Optimistic-concurrency check failed on write.
    #[error("conflict writing '{key}': expected version {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Store operation failed.
    #[error("store operation '{operation}' failed: {reason}")]
    StoreFailed { operation: String, reason: String },

    /// Status contradicts itself and cannot be acted on.
    #[error("inconsistent status on '{key}': {reason}")]
    InconsistentStatus { key: String, reason: String },

    /// Datadog API call failed.
    #[error("Datadog API call failed: {0}")]
    External(#[from] ddmon_datadog::Error),

    /// Spec could not be translated.
    #[error(transparent)]
    Translate(#[from] ddmon_api::Error),

    /// Loop was stopped.
    #[error("reconciliation loop stopped")]
    LoopStopped,

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a not found error.
    pub fn not_found(key: impl ToString) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(key: impl ToString) -> Self {
        Self::AlreadyExists {
            key: key.to_string(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(key: impl ToString, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            key: key.to_string(),
            expected,
            actual,
        }
    }

    /// Create a store failed error.
    pub fn store_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an inconsistent status error.
    pub fn inconsistent_status(key: impl ToString, reason: impl Into<String>) -> Self {
        Self::InconsistentStatus {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Check if this error came from a store write conflict.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if a later reconcile of the same resource may succeed.
    ///
    /// Every per-resource failure is retryable; only loop-level errors are not.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::LoopStopped | Self::InvalidConfig { .. })
    }
}
