//! Domain types shared across the workspace
//!
//! Repositories and artifact references are transient values discovered during a
//! crawl; [`NormalizedRecord`] is the terminal output row handed to a report sink.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix carried by every unique id and digest column.
pub const SHA256_PREFIX: &str = "sha256:";

/// Packaging format of a repository, which selects the path-parsing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// Container images (docker, OCI)
    Container,
    /// npm tarballs
    Npm,
    /// Generic archives (`<name>-<version>.<ext>`)
    Generic,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container => write!(f, "container"),
            Self::Npm => write!(f, "npm"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

impl Ecosystem {
    /// All supported ecosystems.
    pub const ALL: [Ecosystem; 3] = [Self::Container, Self::Npm, Self::Generic];

    /// Maps a store package type or a user-supplied name to an ecosystem
    /// (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "container" | "docker" | "oci" | "image" => Some(Self::Container),
            "npm" | "node" | "package-npm" => Some(Self::Npm),
            "generic" | "archive" | "package-generic" => Some(Self::Generic),
            _ => None,
        }
    }

    /// Value of the `resource_type` report column.
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::Container => "container-image",
            Self::Npm => "npm-package",
            Self::Generic => "generic-artifact",
        }
    }
}

/// A repository as enumerated from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Unique repository key
    pub key: String,
    /// Raw package type reported by the store (e.g. `docker`, `npm`)
    pub package_type: String,
}

impl Repository {
    pub fn new(key: impl Into<String>, package_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            package_type: package_type.into(),
        }
    }

    /// Ecosystem of this repository, `None` when the store type is not supported.
    pub fn ecosystem(&self) -> Option<Ecosystem> {
        Ecosystem::from_str_loose(&self.package_type)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.package_type)
    }
}

/// A store-relative artifact path inside one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub repository_key: String,
    pub raw_path: String,
}

impl ArtifactRef {
    pub fn new(repository_key: impl Into<String>, raw_path: impl Into<String>) -> Self {
        Self {
            repository_key: repository_key.into(),
            raw_path: raw_path.into(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository_key, self.raw_path)
    }
}

/// Logical identity of an artifact, independent of its physical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalIdentity {
    pub name: String,
    pub version_or_tag: String,
}

impl CanonicalIdentity {
    pub fn new(name: impl Into<String>, version_or_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_or_tag: version_or_tag.into(),
        }
    }
}

impl fmt::Display for CanonicalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version_or_tag)
    }
}

/// Per-artifact detail returned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDetail {
    /// SHA-256 checksum, absent when the store has none
    pub checksum_sha256: Option<String>,
}

/// Why an artifact did not make it into the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Path contains a reserved store bookkeeping segment
    ControlPath,
    /// Path has too few segments for its ecosystem
    MalformedPath,
    /// Filename does not match the ecosystem's name-version pattern
    UnparseableName,
    /// Detail fetch failed after retries or was rejected
    DetailUnavailable,
    /// Detail carries no usable sha256 checksum
    MissingChecksum,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ControlPath => "control-path",
            Self::MalformedPath => "malformed-path",
            Self::UnparseableName => "unparseable-name",
            Self::DetailUnavailable => "detail-unavailable",
            Self::MissingChecksum => "missing-checksum",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One report row.
///
/// Field order matches the derived ordering used to sort reports deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// `name:version_or_tag`
    pub resource_name: String,
    pub resource_type: String,
    /// `sha256:<checksum>`
    pub unique_id: String,
    pub lineage_id: String,
    /// Same value as `unique_id`
    pub digest: String,
    /// `repository_key/name`
    pub registry_path: String,
}

impl NormalizedRecord {
    /// Builds a record from a resolved identity and the artifact's checksum.
    pub fn new(
        repository_key: &str,
        ecosystem: Ecosystem,
        identity: &CanonicalIdentity,
        checksum: &str,
        lineage_id: impl Into<String>,
    ) -> Self {
        let unique_id = normalize_unique_id(checksum);
        Self {
            resource_name: identity.to_string(),
            resource_type: ecosystem.resource_type().to_owned(),
            digest: unique_id.clone(),
            unique_id,
            lineage_id: lineage_id.into(),
            registry_path: format!("{}/{}", repository_key, identity.name),
        }
    }
}

/// Returns `sha256:<hex>` with exactly one prefix, whatever the input carries.
pub fn normalize_unique_id(checksum: &str) -> String {
    format!("{SHA256_PREFIX}{}", strip_sha256_prefix(checksum))
}

/// Trims whitespace and every leading `sha256:` prefix (case-insensitive).
pub fn strip_sha256_prefix(checksum: &str) -> &str {
    let mut bare = checksum.trim();
    while bare
        .get(..SHA256_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(SHA256_PREFIX))
    {
        bare = &bare[SHA256_PREFIX.len()..];
    }
    bare
}

/// Whether a store checksum is a non-empty hex digest once its prefix is removed.
pub fn is_hex_checksum(checksum: &str) -> bool {
    let bare = strip_sha256_prefix(checksum);
    !bare.is_empty() && bare.bytes().all(|b| b.is_ascii_hexdigit())
}
