//! CLI-specific error types and exit code mapping

use artiscan_core::error::{ArtiscanError, RemoteError};
use artiscan_crawler::CrawlerError;

/// CLI-specific error type.
///
/// `exit_code()` maps each failure class to the process exit status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error.
    #[error("{0}")]
    Core(#[from] ArtiscanError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                  |
    /// |------|------------------------------------------|
    /// | 0    | Success                                  |
    /// | 1    | General / command error                  |
    /// | 2    | Configuration error                      |
    /// | 3    | Repository enumeration unavailable       |
    /// | 4    | Report could not be written              |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(ArtiscanError::Config(_)) => 2,
            Self::Core(ArtiscanError::Remote(RemoteError::Enumeration(_))) => 3,
            Self::Core(ArtiscanError::Report(_)) => 4,
            Self::Core(_) | Self::Command(_) | Self::JsonSerialize(_) | Self::Io(_) => 1,
        }
    }
}

impl From<CrawlerError> for CliError {
    fn from(e: CrawlerError) -> Self {
        Self::Core(e.into())
    }
}
