//! Crawler error types
//!
//! [`CrawlerError`] covers every failure inside the crawler. The variants encode the
//! error taxonomy directly:
//!
//! - **transient remote**: `Transient` (network, timeout, 5xx, 429) -- retried
//! - **non-transient remote**: `Rejected` (4xx), `Decode` (bad body) -- never retried
//! - **fatal**: `Enumeration` (repository list unavailable), `Report` (sink I/O)
//! - **internal**: `Config`, `Task`
//!
//! `From<CrawlerError> for ArtiscanError` lets callers propagate with `?`.

use artiscan_core::error::{ArtiscanError, ConfigError, RemoteError, ReportError};

/// Crawler domain error
#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    /// Network failure, timeout or retryable status
    #[error("transient failure in {operation}: {reason}")]
    Transient {
        /// Remote operation name
        operation: String,
        /// Failure detail
        reason: String,
    },

    /// Non-retryable HTTP status
    #[error("{operation} rejected with status {status}: {reason}")]
    Rejected {
        /// Remote operation name
        operation: String,
        /// HTTP status code
        status: u16,
        /// Failure detail
        reason: String,
    },

    /// Response body could not be decoded
    #[error("failed to decode {operation} response: {reason}")]
    Decode {
        /// Remote operation name
        operation: String,
        /// Decoder message
        reason: String,
    },

    /// Repository or artifact enumeration could not complete
    #[error("enumeration failed: {0}")]
    Enumeration(String),

    /// Report sink failure
    #[error("report error: {path}: {reason}")]
    Report {
        /// Output location
        path: String,
        /// Failure detail
        reason: String,
    },

    /// Configuration error
    #[error("config error: {field}: {reason}")]
    Config {
        /// Configuration field
        field: String,
        /// Failure detail
        reason: String,
    },

    /// Background task failure (join error)
    #[error("task error: {0}")]
    Task(String),
}

impl CrawlerError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub(crate) fn transient(operation: &str, reason: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(operation: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            operation: operation.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<CrawlerError> for ArtiscanError {
    fn from(err: CrawlerError) -> Self {
        match err {
            CrawlerError::Transient { .. } => {
                ArtiscanError::Remote(RemoteError::Transient(err.to_string()))
            }
            CrawlerError::Rejected { .. } | CrawlerError::Decode { .. } => {
                ArtiscanError::Remote(RemoteError::Rejected(err.to_string()))
            }
            CrawlerError::Enumeration(msg) => {
                ArtiscanError::Remote(RemoteError::Enumeration(msg))
            }
            CrawlerError::Report { path, reason } => {
                ArtiscanError::Report(ReportError::Write { path, reason })
            }
            CrawlerError::Config { field, reason } => {
                ArtiscanError::Config(ConfigError::InvalidValue { field, reason })
            }
            CrawlerError::Task(msg) => {
                ArtiscanError::Remote(RemoteError::Enumeration(format!("task failed: {msg}")))
            }
        }
    }
}
