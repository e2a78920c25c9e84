//! Error taxonomy for the consistency engine.
//!
//! Errors split into two families. Transient failures from external calls
//! (network, timeout, model load, embedding generation, reasoning) are
//! retryable; structural failures (bad configuration, missing dependency,
//! mismatched vector lengths) are not. [`Error::is_retryable`] is the default
//! predicate used by [`crate::resilience::retry`].

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // ── Programmer errors ────────────────────────────────────────────────────
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    // ── Transient external-call errors ───────────────────────────────────────
    #[error("embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("reasoning call failed: {reason}")]
    ReasoningFailed { reason: String },

    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("timed out: {operation}")]
    Timeout { operation: String },

    #[error("model load failed: {reason}")]
    ModelLoadFailed { reason: String },

    // ── Degradation / availability ───────────────────────────────────────────
    /// Durable cache tier I/O. Never surfaced by the cache itself.
    #[error("cache I/O failed: {reason}")]
    CacheIo { reason: String },

    #[error("provider unavailable: {provider}, reason: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    // ── Structural errors ────────────────────────────────────────────────────
    #[error("invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("missing dependency: {what}")]
    MissingDependency { what: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn embedding_failed(reason: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            reason: reason.into(),
        }
    }

    pub fn reasoning_failed(reason: impl Into<String>) -> Self {
        Self::ReasoningFailed {
            reason: reason.into(),
        }
    }

    pub fn cache_io(reason: impl Into<String>) -> Self {
        Self::CacheIo {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether a failed attempt should be retried by default.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingFailed { .. }
                | Self::ReasoningFailed { .. }
                | Self::Network { .. }
                | Self::Timeout { .. }
                | Self::ModelLoadFailed { .. }
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::cache_io(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                operation: e
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "http request".into()),
            }
        } else if e.is_connect() || e.is_request() {
            Self::Network {
                reason: e.to_string(),
            }
        } else {
            Self::reasoning_failed(e.to_string())
        }
    }
}
