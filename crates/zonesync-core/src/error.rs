//! Error types for the zonesync system
//!
//! Transient I/O failures from sources and providers abort the current
//! reconcile tick and are retried on the next one; configuration errors
//! surface at construction time; malformed data is logged and tolerated at
//! the point it is observed.

use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the zonesync system
#[derive(Error, Debug)]
pub enum Error {
    /// Source-related errors (desired-state snapshot failed)
    #[error("source error: {0}")]
    Source(String),

    /// Registry-related errors (ownership layer)
    #[error("registry error: {0}")]
    Registry(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Invalid input at a component boundary
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Aggregated per-change failures from a partially applied batch
    #[error("{failed} of {total} changes failed: {details}")]
    PartialApply {
        failed: usize,
        total: usize,
        details: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Aggregate individual change failures into a single error
    pub fn partial_apply(failures: Vec<String>, total: usize) -> Self {
        Self::PartialApply {
            failed: failures.len(),
            total,
            details: failures.join("; "),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
