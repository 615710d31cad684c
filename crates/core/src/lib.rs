//! artiscan-core -- shared building blocks of the artiscan workspace
//!
//! - [`config`]: `artiscan.toml` parsing, environment overrides, validation
//! - [`error`]: top-level error taxonomy (`ArtiscanError`)
//! - [`metrics`]: metric names and descriptions
//! - [`types`]: repositories, artifact references, identities, report records

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- re-exports ---

pub use config::ArtiscanConfig;
pub use error::{ArtiscanError, ConfigError, RemoteError, ReportError};
pub use types::{
    ArtifactDetail, ArtifactRef, CanonicalIdentity, Ecosystem, NormalizedRecord, Repository,
    SkipReason, is_hex_checksum, normalize_unique_id, strip_sha256_prefix,
};
