//! Error types -- the top-level error taxonomy shared by every artiscan crate
//!
//! Domain crates keep their own richer error enums and convert into
//! [`ArtiscanError`] through `From` so callers can use `?` across crate boundaries.

/// artiscan top-level error type
#[derive(Debug, thiserror::Error)]
pub enum ArtiscanError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Remote store or lineage API error
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Report output error
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A configuration value is out of range or malformed
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Remote API errors, classified by how the run reacts to them
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Network failure, timeout or 5xx. Retried, then degraded to a skip.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Non-transient rejection (4xx) or undecodable response. Never retried.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Repository enumeration failed. Fatal to the run.
    #[error("repository enumeration failed: {0}")]
    Enumeration(String),
}

/// Report sink errors. Always fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Output location could not be created
    #[error("cannot create output location {path}: {reason}")]
    Location { path: String, reason: String },

    /// Writing rows failed
    #[error("failed to write report {path}: {reason}")]
    Write { path: String, reason: String },
}
