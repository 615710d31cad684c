//! Path identity resolution
//!
//! [`PathResolver::resolve`] turns a store-relative artifact path into a
//! [`CanonicalIdentity`], or explains why the path is not reportable. It performs
//! no I/O and no logging; callers log skips with their own context.
//!
//! # Rules
//!
//! | Ecosystem | Path | Identity |
//! |---|---|---|
//! | any | contains a cache-marker segment | skip `control-path` |
//! | container | `a/b/1.2.3/manifest.json` | `a/b` : `1.2.3` |
//! | container | `img/manifest.json` | `img` : `latest` |
//! | container | `manifest.json` | skip `malformed-path` |
//! | npm | `lodash/-/lodash-4.17.21.tgz` | `lodash` : `4.17.21` |
//! | npm | `@types/node/-/node-20.1.0.tgz` | `@types/node` : `20.1.0` |
//! | generic | `tools/app-1.2.3.tar.gz` | `app` : `1.2.3` |
//! | npm / generic | filename not matching the pattern | skip `unparseable-name` |

use std::collections::HashMap;

use regex::Regex;

use artiscan_core::types::{CanonicalIdentity, Ecosystem, SkipReason};

use crate::error::CrawlerError;

/// Tag used when a container path has no tag segment.
pub const FALLBACK_TAG: &str = "latest";

/// Default npm tarball pattern: `<name>-<semver>.tgz`
pub const NPM_PATTERN: &str = r"^(?P<name>.+)-(?P<version>\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?)\.tgz$";

/// Default generic archive pattern: `<name>-<major>.<minor>.<patch>.<ext>`
pub const GENERIC_PATTERN: &str =
    r"^(?P<name>.+)-(?P<version>\d+\.\d+\.\d+)\.(?:tar\.gz|tgz|tar|zip|jar|war|gz|bz2|xz)$";

/// Outcome of resolving one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Identity(CanonicalIdentity),
    Skip(SkipReason),
}

/// Resolves artifact paths to canonical identities.
#[derive(Debug, Clone)]
pub struct PathResolver {
    cache_markers: Vec<String>,
    patterns: HashMap<Ecosystem, Regex>,
}

impl PathResolver {
    /// Creates a resolver with the default flat-package patterns.
    pub fn new(cache_markers: Vec<String>) -> Self {
        let mut patterns = HashMap::new();
        // The default patterns are compile-time constants covered by tests.
        if let Ok(re) = Regex::new(NPM_PATTERN) {
            patterns.insert(Ecosystem::Npm, re);
        }
        if let Ok(re) = Regex::new(GENERIC_PATTERN) {
            patterns.insert(Ecosystem::Generic, re);
        }
        Self {
            cache_markers,
            patterns,
        }
    }

    /// Replaces the name-version pattern of a flat-package ecosystem.
    ///
    /// The pattern must define `name` and `version` capture groups.
    ///
    /// # Errors
    ///
    /// `CrawlerError::Config` when the pattern does not compile, lacks a capture
    /// group, or targets the container ecosystem (which is parsed by segments).
    pub fn with_pattern(mut self, ecosystem: Ecosystem, pattern: &str) -> Result<Self, CrawlerError> {
        if ecosystem == Ecosystem::Container {
            return Err(CrawlerError::config(
                "patterns",
                "container paths are resolved by segment, not by pattern",
            ));
        }
        let re = Regex::new(pattern)
            .map_err(|e| CrawlerError::config("patterns", format!("invalid regex for {ecosystem}: {e}")))?;
        let names: Vec<&str> = re.capture_names().flatten().collect();
        if !names.contains(&"name") || !names.contains(&"version") {
            return Err(CrawlerError::config(
                "patterns",
                format!("pattern for {ecosystem} must define 'name' and 'version' groups"),
            ));
        }
        self.patterns.insert(ecosystem, re);
        Ok(self)
    }

    /// Configured cache markers.
    pub fn cache_markers(&self) -> &[String] {
        &self.cache_markers
    }

    /// Resolves `raw_path` within a repository of the given ecosystem.
    pub fn resolve(&self, ecosystem: Ecosystem, raw_path: &str) -> Resolution {
        let segments: Vec<&str> = raw_path.split('/').filter(|s| !s.is_empty()).collect();

        if self.is_control_path(&segments) {
            return Resolution::Skip(SkipReason::ControlPath);
        }

        match ecosystem {
            Ecosystem::Container => resolve_container(&segments),
            Ecosystem::Npm | Ecosystem::Generic => self.resolve_flat(ecosystem, &segments),
        }
    }

    fn is_control_path(&self, segments: &[&str]) -> bool {
        segments
            .iter()
            .any(|seg| self.cache_markers.iter().any(|marker| marker == seg))
    }

    fn resolve_flat(&self, ecosystem: Ecosystem, segments: &[&str]) -> Resolution {
        let Some(file_name) = segments.last() else {
            return Resolution::Skip(SkipReason::MalformedPath);
        };
        let Some(re) = self.patterns.get(&ecosystem) else {
            return Resolution::Skip(SkipReason::UnparseableName);
        };
        let Some(caps) = re.captures(file_name) else {
            return Resolution::Skip(SkipReason::UnparseableName);
        };
        let (Some(name), Some(version)) = (caps.name("name"), caps.name("version")) else {
            return Resolution::Skip(SkipReason::UnparseableName);
        };

        let name = name.as_str();
        let version = version.as_str();
        if name.is_empty() || semver::Version::parse(version).is_err() {
            return Resolution::Skip(SkipReason::UnparseableName);
        }

        // Scoped npm tarballs live under `@scope/<name>/-/`; the filename drops the scope.
        let name = match segments.first() {
            Some(scope)
                if ecosystem == Ecosystem::Npm
                    && scope.starts_with('@')
                    && segments.len() > 1 =>
            {
                format!("{scope}/{name}")
            }
            _ => name.to_owned(),
        };

        Resolution::Identity(CanonicalIdentity::new(name, version))
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(vec![".jfrog".to_owned(), "_uploads".to_owned()])
    }
}

fn resolve_container(segments: &[&str]) -> Resolution {
    match segments.len() {
        0 | 1 => Resolution::Skip(SkipReason::MalformedPath),
        2 => Resolution::Identity(CanonicalIdentity::new(segments[0], FALLBACK_TAG)),
        n => Resolution::Identity(CanonicalIdentity::new(
            segments[..n - 2].join("/"),
            segments[n - 2],
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, version: &str) -> Resolution {
        Resolution::Identity(CanonicalIdentity::new(name, version))
    }

    #[test]
    fn default_patterns_compile() {
        assert!(Regex::new(NPM_PATTERN).is_ok());
        assert!(Regex::new(GENERIC_PATTERN).is_ok());
        let resolver = PathResolver::default();
        assert_eq!(resolver.patterns.len(), 2);
    }

    #[test]
    fn container_path_table() {
        let resolver = PathResolver::default();
        let cases = [
            ("a/b/1.2.3/manifest", identity("a/b", "1.2.3")),
            ("img/v1.0.0/manifest.json", identity("img", "v1.0.0")),
            (
                "team/svc/api/2024.01/sha256__0f3e",
                identity("team/svc/api", "2024.01"),
            ),
            ("img/manifest.json", identity("img", "latest")),
            ("/img/v2/manifest.json", identity("img", "v2")),
            ("manifest.json", Resolution::Skip(SkipReason::MalformedPath)),
            ("", Resolution::Skip(SkipReason::MalformedPath)),
        ];
        for (path, expected) in cases {
            assert_eq!(
                resolver.resolve(Ecosystem::Container, path),
                expected,
                "path: {path}"
            );
        }
    }

    #[test]
    fn npm_path_table() {
        let resolver = PathResolver::default();
        let cases = [
            ("lodash/-/lodash-4.17.21.tgz", identity("lodash", "4.17.21")),
            ("my-pkg/-/my-pkg-2.0.0.tgz", identity("my-pkg", "2.0.0")),
            (
                "pkg/-/pkg-1.0.0-beta.1.tgz",
                identity("pkg", "1.0.0-beta.1"),
            ),
            (
                "@types/node/-/node-20.1.0.tgz",
                identity("@types/node", "20.1.0"),
            ),
            ("lodash/package.json", Resolution::Skip(SkipReason::UnparseableName)),
            ("lodash/-/lodash-latest.tgz", Resolution::Skip(SkipReason::UnparseableName)),
            ("lodash/-/lodash-1.2.tgz", Resolution::Skip(SkipReason::UnparseableName)),
        ];
        for (path, expected) in cases {
            assert_eq!(resolver.resolve(Ecosystem::Npm, path), expected, "path: {path}");
        }
    }

    #[test]
    fn generic_path_table() {
        let resolver = PathResolver::default();
        let cases = [
            ("tools/app-1.2.3.tar.gz", identity("app", "1.2.3")),
            ("tool-2-1.2.3.zip", identity("tool-2", "1.2.3")),
            ("libs/core-lib-10.0.1.jar", identity("core-lib", "10.0.1")),
            ("releases/app.tar.gz", Resolution::Skip(SkipReason::UnparseableName)),
            ("releases/app-1.2.3.exe", Resolution::Skip(SkipReason::UnparseableName)),
            ("releases/app-1.2.3-rc1.zip", Resolution::Skip(SkipReason::UnparseableName)),
        ];
        for (path, expected) in cases {
            assert_eq!(
                resolver.resolve(Ecosystem::Generic, path),
                expected,
                "path: {path}"
            );
        }
    }

    #[test]
    fn scope_prefix_only_applies_to_npm() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.resolve(Ecosystem::Generic, "@team/app-1.0.0.zip"),
            identity("app", "1.0.0")
        );
    }

    #[test]
    fn cache_marker_skips_every_ecosystem() {
        let resolver = PathResolver::default();
        let paths = [
            ".jfrog/repository.catalog",
            "img/_uploads/abc/manifest.json",
            "lodash/.jfrog/lodash-4.17.21.tgz",
            "tools/_uploads/app-1.2.3.tar.gz",
        ];
        for path in paths {
            for eco in Ecosystem::ALL {
                assert_eq!(
                    resolver.resolve(eco, path),
                    Resolution::Skip(SkipReason::ControlPath),
                    "{eco}: {path}"
                );
            }
        }
    }

    #[test]
    fn cache_marker_matches_whole_segments_only() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.resolve(Ecosystem::Container, "my.jfrog.mirror/v1/manifest.json"),
            identity("my.jfrog.mirror", "v1")
        );
    }

    #[test]
    fn custom_markers() {
        let resolver = PathResolver::new(vec![".cache".to_owned()]);
        assert_eq!(
            resolver.resolve(Ecosystem::Container, "img/.cache/manifest.json"),
            Resolution::Skip(SkipReason::ControlPath)
        );
        assert_eq!(
            resolver.resolve(Ecosystem::Container, "img/_uploads/manifest.json"),
            identity("img", "_uploads")
        );
    }

    #[test]
    fn custom_pattern_replaces_default() {
        let resolver = PathResolver::default()
            .with_pattern(
                Ecosystem::Generic,
                r"^(?P<name>[a-z]+)_(?P<version>\d+\.\d+\.\d+)\.bin$",
            )
            .unwrap();
        assert_eq!(
            resolver.resolve(Ecosystem::Generic, "fw/modem_3.1.4.bin"),
            identity("modem", "3.1.4")
        );
        assert_eq!(
            resolver.resolve(Ecosystem::Generic, "tools/app-1.2.3.tar.gz"),
            Resolution::Skip(SkipReason::UnparseableName)
        );
    }

    #[test]
    fn custom_pattern_requires_named_groups() {
        let err = PathResolver::default()
            .with_pattern(Ecosystem::Npm, r"^(.+)-(\d+)\.tgz$")
            .unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn custom_pattern_rejected_for_container() {
        assert!(
            PathResolver::default()
                .with_pattern(Ecosystem::Container, r"^(?P<name>.+):(?P<version>.+)$")
                .is_err()
        );
    }

    #[test]
    fn invalid_regex_is_config_error() {
        let err = PathResolver::default()
            .with_pattern(Ecosystem::Npm, r"^(?P<name>[")
            .unwrap_err();
        assert!(matches!(err, CrawlerError::Config { .. }));
    }
}
