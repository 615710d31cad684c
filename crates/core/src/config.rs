//! Configuration -- `artiscan.toml` parsing and runtime settings
//!
//! [`ArtiscanConfig`] is the top-level structure holding every section.
//!
//! # Loading precedence
//! 1. CLI arguments (highest)
//! 2. Environment variables (`ARTISCAN_STORE_BASE_URL=https://...` form)
//! 3. Configuration file (`artiscan.toml`)
//! 4. Defaults (`Default` impls)
//!
//! Credentials are never read from anywhere but the `token` fields, which are
//! expected to arrive through `ARTISCAN_STORE_TOKEN` / `ARTISCAN_LINEAGE_TOKEN`.
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), artiscan_core::error::ArtiscanError> {
//! use artiscan_core::config::ArtiscanConfig;
//!
//! let config = ArtiscanConfig::load("artiscan.toml").await?;
//! let config = ArtiscanConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ArtiscanError, ConfigError};
use crate::types::Ecosystem;

/// Accepted values of `lineage.key`.
pub const LINEAGE_KEY_MODES: [&str; 2] = ["name_and_tag", "name"];

/// artiscan unified configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtiscanConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Artifact store API
    #[serde(default)]
    pub store: StoreConfig,
    /// Secondary lineage API
    #[serde(default)]
    pub lineage: LineageConfig,
    /// Crawl behaviour (concurrency, retries, filters)
    #[serde(default)]
    pub crawler: CrawlSection,
    /// Report output
    #[serde(default)]
    pub report: ReportConfig,
}

impl ArtiscanConfig {
    /// Loads the TOML file, applies environment overrides and validates.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ArtiscanError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads the TOML file without environment overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ArtiscanError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArtiscanError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ArtiscanError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parses a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ArtiscanError> {
        toml::from_str(toml_str).map_err(|e| {
            ArtiscanError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Overrides values from environment variables.
    ///
    /// Naming rule: `ARTISCAN_{SECTION}_{FIELD}`, e.g. `ARTISCAN_CRAWLER_MAX_RETRIES=5`.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "ARTISCAN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "ARTISCAN_GENERAL_LOG_FORMAT");

        // Store
        override_string(&mut self.store.base_url, "ARTISCAN_STORE_BASE_URL");
        override_string(&mut self.store.token, "ARTISCAN_STORE_TOKEN");
        override_usize(&mut self.store.page_size, "ARTISCAN_STORE_PAGE_SIZE");
        override_u64(
            &mut self.store.request_timeout_secs,
            "ARTISCAN_STORE_REQUEST_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.store.connect_timeout_secs,
            "ARTISCAN_STORE_CONNECT_TIMEOUT_SECS",
        );

        // Lineage
        override_bool(&mut self.lineage.enabled, "ARTISCAN_LINEAGE_ENABLED");
        override_string(&mut self.lineage.base_url, "ARTISCAN_LINEAGE_BASE_URL");
        override_string(&mut self.lineage.token, "ARTISCAN_LINEAGE_TOKEN");
        override_string(&mut self.lineage.key, "ARTISCAN_LINEAGE_KEY");

        // Crawler
        override_usize(
            &mut self.crawler.repo_concurrency,
            "ARTISCAN_CRAWLER_REPO_CONCURRENCY",
        );
        override_usize(
            &mut self.crawler.artifact_concurrency,
            "ARTISCAN_CRAWLER_ARTIFACT_CONCURRENCY",
        );
        override_u32(&mut self.crawler.max_retries, "ARTISCAN_CRAWLER_MAX_RETRIES");
        override_u64(
            &mut self.crawler.retry_backoff_base_ms,
            "ARTISCAN_CRAWLER_RETRY_BACKOFF_BASE_MS",
        );
        override_usize(&mut self.crawler.max_pages, "ARTISCAN_CRAWLER_MAX_PAGES");
        override_csv(&mut self.crawler.ecosystems, "ARTISCAN_CRAWLER_ECOSYSTEMS");
        override_csv(
            &mut self.crawler.include_repos,
            "ARTISCAN_CRAWLER_INCLUDE_REPOS",
        );
        override_csv(
            &mut self.crawler.cache_markers,
            "ARTISCAN_CRAWLER_CACHE_MARKERS",
        );

        // Report
        override_string(&mut self.report.output_dir, "ARTISCAN_REPORT_OUTPUT_DIR");
        override_string(&mut self.report.file_prefix, "ARTISCAN_REPORT_FILE_PREFIX");
        override_string(
            &mut self.report.csp_placeholder,
            "ARTISCAN_REPORT_CSP_PLACEHOLDER",
        );
    }

    /// Validates enumerated and structural values.
    ///
    /// Numeric bounds of the crawl section are checked by the crawler crate's own
    /// configuration type when it is derived from this one.
    pub fn validate(&self) -> Result<(), ArtiscanError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        validate_base_url("store.base_url", &self.store.base_url)?;

        if self.lineage.enabled {
            validate_base_url("lineage.base_url", &self.lineage.base_url)?;
        }

        if !LINEAGE_KEY_MODES.contains(&self.lineage.key.as_str()) {
            return Err(invalid(
                "lineage.key",
                format!("must be one of: {}", LINEAGE_KEY_MODES.join(", ")),
            ));
        }

        for name in &self.crawler.ecosystems {
            if Ecosystem::from_str_loose(name).is_none() {
                return Err(invalid(
                    "crawler.ecosystems",
                    format!("unknown ecosystem '{name}' (expected container, npm, generic)"),
                ));
            }
        }

        if self.crawler.cache_markers.iter().any(|m| m.is_empty() || m.contains('/')) {
            return Err(invalid(
                "crawler.cache_markers",
                "markers must be non-empty single path segments".to_owned(),
            ));
        }

        for (name, pattern) in &self.crawler.patterns {
            validate_pattern(name, pattern)?;
        }

        if self.report.output_dir.is_empty() {
            return Err(invalid(
                "report.output_dir",
                "must not be empty".to_owned(),
            ));
        }

        if self.report.file_prefix.is_empty()
            || self.report.file_prefix.contains(['/', '\\'])
        {
            return Err(invalid(
                "report.file_prefix",
                "must be a non-empty file name without path separators".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> ArtiscanError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

fn validate_pattern(ecosystem: &str, pattern: &str) -> Result<(), ArtiscanError> {
    match Ecosystem::from_str_loose(ecosystem) {
        Some(Ecosystem::Npm | Ecosystem::Generic) => {}
        _ => {
            return Err(invalid(
                "crawler.patterns",
                format!("'{ecosystem}' has no name-version pattern (expected npm, generic)"),
            ));
        }
    }

    let re = Regex::new(pattern).map_err(|e| {
        invalid(
            "crawler.patterns",
            format!("invalid regex for {ecosystem}: {e}"),
        )
    })?;
    let groups: Vec<&str> = re.capture_names().flatten().collect();
    if !groups.contains(&"name") || !groups.contains(&"version") {
        return Err(invalid(
            "crawler.patterns",
            format!("pattern for {ecosystem} must define 'name' and 'version' groups"),
        ));
    }
    Ok(())
}

fn validate_base_url(field: &str, url: &str) -> Result<(), ArtiscanError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(invalid(field, format!("'{url}' must be an http(s) URL")));
    }
    Ok(())
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Artifact store API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL, e.g. `https://artifacts.example.com/artifactory`
    pub base_url: String,
    /// Bearer token. Empty means unauthenticated.
    pub token: String,
    /// Items requested per listing page
    pub page_size: usize,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
    /// TCP/TLS connect timeout (seconds)
    pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081/artifactory".to_owned(),
            token: String::new(),
            page_size: 500,
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Lineage API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    /// When disabled every record gets the `N/A` lineage id without remote calls
    pub enabled: bool,
    pub base_url: String,
    pub token: String,
    /// Identity key projection (`name_and_tag` or `name`)
    pub key: String,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:8090".to_owned(),
            token: String::new(),
            key: "name_and_tag".to_owned(),
        }
    }
}

/// Crawl settings (`[crawler]` section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSection {
    /// Repositories processed concurrently
    pub repo_concurrency: usize,
    /// Artifacts enriched concurrently within one repository
    pub artifact_concurrency: usize,
    /// Attempts per remote call, including the first one
    pub max_retries: u32,
    /// Linear backoff base between attempts (milliseconds)
    pub retry_backoff_base_ms: u64,
    /// Upper bound of listing pages per repository
    pub max_pages: usize,
    /// Ecosystem allow-list
    pub ecosystems: Vec<String>,
    /// Repository keys to crawl. Empty means all.
    pub include_repos: Vec<String>,
    /// Path segments marking store bookkeeping paths
    pub cache_markers: Vec<String>,
    /// Name-version regex per flat-package ecosystem (`npm`, `generic`), replacing
    /// the built-in pattern. Must define `name` and `version` capture groups.
    pub patterns: BTreeMap<String, String>,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            repo_concurrency: 4,
            artifact_concurrency: 12,
            max_retries: 3,
            retry_backoff_base_ms: 500,
            max_pages: 10_000,
            ecosystems: vec![
                "container".to_owned(),
                "npm".to_owned(),
                "generic".to_owned(),
            ],
            include_repos: Vec::new(),
            cache_markers: vec![".jfrog".to_owned(), "_uploads".to_owned()],
            patterns: BTreeMap::new(),
        }
    }
}

/// Report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory receiving the report. Created on demand.
    pub output_dir: String,
    /// File name prefix; the run date and `.csv` are appended
    pub file_prefix: String,
    /// Constant written to the `csp_placeholder` column
    pub csp_placeholder: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: "reports".to_owned(),
            file_prefix: "artifact_inventory".to_owned(),
            csp_placeholder: "N/A".to_owned(),
        }
    }
}

// --- environment override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = ArtiscanConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(!config.lineage.enabled);
        assert_eq!(config.crawler.max_retries, 3);
        assert_eq!(config.crawler.artifact_concurrency, 12);
        assert_eq!(config.report.csp_placeholder, "N/A");
    }

    #[test]
    fn default_config_passes_validation() {
        ArtiscanConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = ArtiscanConfig::parse("").unwrap();
        assert_eq!(config.store.page_size, 500);
        assert_eq!(config.crawler.cache_markers, vec![".jfrog", "_uploads"]);
    }

    #[test]
    fn partial_toml_merges_with_defaults() {
        let toml = r#"
[store]
base_url = "https://store.example.com/artifactory"

[crawler]
artifact_concurrency = 16
ecosystems = ["container"]
"#;
        let config = ArtiscanConfig::parse(toml).unwrap();
        assert_eq!(config.store.base_url, "https://store.example.com/artifactory");
        assert_eq!(config.store.page_size, 500);
        assert_eq!(config.crawler.artifact_concurrency, 16);
        assert_eq!(config.crawler.repo_concurrency, 4);
        assert_eq!(config.crawler.ecosystems, vec!["container"]);
    }

    #[test]
    fn invalid_toml_returns_parse_error() {
        let err = ArtiscanConfig::parse("store = [[[").unwrap_err();
        assert!(matches!(
            err,
            ArtiscanError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = ArtiscanConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_non_http_store_url() {
        let mut config = ArtiscanConfig::default();
        config.store.base_url = "ftp://store".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("store.base_url"));
    }

    #[test]
    fn validate_ignores_lineage_url_when_disabled() {
        let mut config = ArtiscanConfig::default();
        config.lineage.base_url = String::new();
        config.validate().unwrap();

        config.lineage.enabled = true;
        assert!(config.validate().unwrap_err().to_string().contains("lineage.base_url"));
    }

    #[test]
    fn validate_rejects_unknown_lineage_key() {
        let mut config = ArtiscanConfig::default();
        config.lineage.key = "digest".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("lineage.key"));
    }

    #[test]
    fn validate_rejects_unknown_ecosystem() {
        let mut config = ArtiscanConfig::default();
        config.crawler.ecosystems = vec!["maven".to_owned()];
        assert!(config.validate().unwrap_err().to_string().contains("maven"));
    }

    #[test]
    fn validate_rejects_multi_segment_cache_marker() {
        let mut config = ArtiscanConfig::default();
        config.crawler.cache_markers = vec!["a/b".to_owned()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn patterns_table_parses_and_validates() {
        let toml = r#"
[crawler.patterns]
generic = '^(?P<name>.+)_(?P<version>\d+\.\d+\.\d+)\.bin$'
"#;
        let config = ArtiscanConfig::parse(toml).unwrap();
        assert_eq!(config.crawler.patterns.len(), 1);
        assert!(config.crawler.patterns["generic"].contains("(?P<name>"));
        assert_eq!(config.crawler.cache_markers, vec![".jfrog", "_uploads"]);
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_pattern_without_groups() {
        let mut config = ArtiscanConfig::default();
        config
            .crawler
            .patterns
            .insert("npm".to_owned(), r"^(.+)-(\d+)\.tgz$".to_owned());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("crawler.patterns"));
        assert!(err.contains("'name' and 'version'"));
    }

    #[test]
    fn validate_rejects_broken_pattern() {
        let mut config = ArtiscanConfig::default();
        config
            .crawler
            .patterns
            .insert("generic".to_owned(), "(?P<name>[".to_owned());
        assert!(config.validate().unwrap_err().to_string().contains("invalid regex"));
    }

    #[test]
    fn validate_rejects_pattern_for_container() {
        let mut config = ArtiscanConfig::default();
        config.crawler.patterns.insert(
            "docker".to_owned(),
            r"^(?P<name>.+):(?P<version>.+)$".to_owned(),
        );
        assert!(config.validate().unwrap_err().to_string().contains("docker"));
    }

    #[test]
    fn validate_rejects_prefix_with_separator() {
        let mut config = ArtiscanConfig::default();
        config.report.file_prefix = "../escape".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("file_prefix"));
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serialized test, no other thread touches the environment.
        unsafe { std::env::set_var("TEST_ARTISCAN_STR", "overridden") };
        override_string(&mut val, "TEST_ARTISCAN_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_ARTISCAN_STR") };
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut val = 12usize;
        // SAFETY: serialized test, no other thread touches the environment.
        unsafe { std::env::set_var("TEST_ARTISCAN_USIZE_BAD", "twelve") };
        override_usize(&mut val, "TEST_ARTISCAN_USIZE_BAD");
        assert_eq!(val, 12);
        unsafe { std::env::remove_var("TEST_ARTISCAN_USIZE_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_csv_drops_empty_items() {
        let mut val = vec!["a".to_owned()];
        // SAFETY: serialized test, no other thread touches the environment.
        unsafe { std::env::set_var("TEST_ARTISCAN_CSV", "container, npm,,") };
        override_csv(&mut val, "TEST_ARTISCAN_CSV");
        assert_eq!(val, vec!["container", "npm"]);
        unsafe { std::env::remove_var("TEST_ARTISCAN_CSV") };
    }

    #[test]
    #[serial]
    fn token_comes_from_environment() {
        let mut config = ArtiscanConfig::default();
        // SAFETY: serialized test, no other thread touches the environment.
        unsafe { std::env::set_var("ARTISCAN_STORE_TOKEN", "secret-token") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("ARTISCAN_STORE_TOKEN") };
        assert_eq!(config.store.token, "secret-token");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = ArtiscanConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = ArtiscanConfig::parse(&toml_str).unwrap();
        assert_eq!(config.crawler.max_pages, parsed.crawler.max_pages);
        assert_eq!(config.report.file_prefix, parsed.report.file_prefix);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = ArtiscanConfig::from_file("/nonexistent/path/artiscan.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ArtiscanError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
