//! Crawler configuration
//!
//! [`CrawlerConfig`] is derived from the core `[crawler]`, `[store]` and `[lineage]`
//! sections and carries the typed values the crawler actually runs with.
//!
//! ```
//! use artiscan_crawler::CrawlerConfigBuilder;
//!
//! let config = CrawlerConfigBuilder::new()
//!     .repo_concurrency(2)
//!     .artifact_concurrency(16)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.artifact_concurrency, 16);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use artiscan_core::config::ArtiscanConfig;
use artiscan_core::types::Ecosystem;

use crate::error::CrawlerError;
use crate::lineage::LineageKeyMode;
use crate::resolver::PathResolver;
use crate::retry::RetryPolicy;

const MAX_CONCURRENCY: usize = 256;
const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_RETRY_BACKOFF_BASE_MS: u64 = 30_000;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;
const MAX_PAGE_SIZE: usize = 10_000;

/// Crawler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Repositories processed concurrently
    pub repo_concurrency: usize,
    /// Artifact workers per repository
    pub artifact_concurrency: usize,
    /// Total attempts per remote call (retry ceiling)
    pub max_retries: u32,
    /// Linear backoff base (milliseconds)
    pub retry_backoff_base_ms: u64,
    /// Timeout of a single remote call (seconds)
    pub request_timeout_secs: u64,
    /// Items requested per listing page
    pub page_size: usize,
    /// Listing pages per repository before the listing is declared runaway
    pub max_pages: usize,
    /// Ecosystem allow-list
    pub ecosystems: Vec<Ecosystem>,
    /// Repository keys to crawl, empty for all
    pub include_repos: Vec<String>,
    /// Path segments marking store bookkeeping paths
    pub cache_markers: Vec<String>,
    /// Lineage cache key projection
    pub lineage_key: LineageKeyMode,
    /// Name-version pattern overrides for flat-package ecosystems
    pub patterns: BTreeMap<Ecosystem, String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            repo_concurrency: 4,
            artifact_concurrency: 12,
            max_retries: 3,
            retry_backoff_base_ms: 500,
            request_timeout_secs: 30,
            page_size: 500,
            max_pages: 10_000,
            ecosystems: Ecosystem::ALL.to_vec(),
            include_repos: Vec::new(),
            cache_markers: vec![".jfrog".to_owned(), "_uploads".to_owned()],
            lineage_key: LineageKeyMode::NameAndTag,
            patterns: BTreeMap::new(),
        }
    }
}

impl CrawlerConfig {
    /// Builds crawler settings from the core configuration.
    ///
    /// Unknown ecosystem names are dropped with a warning; the core validation
    /// normally rejects them earlier.
    pub fn from_core(core: &ArtiscanConfig) -> Self {
        let ecosystems = core
            .crawler
            .ecosystems
            .iter()
            .filter_map(|name| {
                let eco = Ecosystem::from_str_loose(name);
                if eco.is_none() {
                    warn!(ecosystem = %name, "unknown ecosystem in allow-list, ignoring");
                }
                eco
            })
            .collect();

        let patterns = core
            .crawler
            .patterns
            .iter()
            .filter_map(|(name, pattern)| {
                let eco = Ecosystem::from_str_loose(name);
                if eco.is_none() {
                    warn!(ecosystem = %name, "pattern for unknown ecosystem, ignoring");
                }
                eco.map(|eco| (eco, pattern.clone()))
            })
            .collect();

        Self {
            repo_concurrency: core.crawler.repo_concurrency,
            artifact_concurrency: core.crawler.artifact_concurrency,
            max_retries: core.crawler.max_retries,
            retry_backoff_base_ms: core.crawler.retry_backoff_base_ms,
            request_timeout_secs: core.store.request_timeout_secs,
            page_size: core.store.page_size,
            max_pages: core.crawler.max_pages,
            ecosystems,
            include_repos: core.crawler.include_repos.clone(),
            cache_markers: core.crawler.cache_markers.clone(),
            lineage_key: LineageKeyMode::from_str_loose(&core.lineage.key)
                .unwrap_or(LineageKeyMode::NameAndTag),
            patterns,
        }
    }

    /// Validates value ranges.
    ///
    /// - `repo_concurrency`, `artifact_concurrency`: 1-256 each
    /// - `max_retries`: 1-10
    /// - `retry_backoff_base_ms`: 0-30000
    /// - `request_timeout_secs`: 1-300
    /// - `page_size`: 1-10000
    /// - `max_pages`: at least 1
    /// - `patterns`: compile, define `name`/`version`, flat-package ecosystems only
    pub fn validate(&self) -> Result<(), CrawlerError> {
        if self.repo_concurrency == 0 || self.repo_concurrency > MAX_CONCURRENCY {
            return Err(CrawlerError::config(
                "repo_concurrency",
                format!("must be 1-{MAX_CONCURRENCY}"),
            ));
        }

        if self.artifact_concurrency == 0 || self.artifact_concurrency > MAX_CONCURRENCY {
            return Err(CrawlerError::config(
                "artifact_concurrency",
                format!("must be 1-{MAX_CONCURRENCY}"),
            ));
        }

        if self.max_retries == 0 || self.max_retries > MAX_RETRY_ATTEMPTS {
            return Err(CrawlerError::config(
                "max_retries",
                format!("must be 1-{MAX_RETRY_ATTEMPTS}"),
            ));
        }

        if self.retry_backoff_base_ms > MAX_RETRY_BACKOFF_BASE_MS {
            return Err(CrawlerError::config(
                "retry_backoff_base_ms",
                format!("must be 0-{MAX_RETRY_BACKOFF_BASE_MS}"),
            ));
        }

        if self.request_timeout_secs == 0 || self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS
        {
            return Err(CrawlerError::config(
                "request_timeout_secs",
                format!("must be 1-{MAX_REQUEST_TIMEOUT_SECS}"),
            ));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(CrawlerError::config(
                "page_size",
                format!("must be 1-{MAX_PAGE_SIZE}"),
            ));
        }

        if self.max_pages == 0 {
            return Err(CrawlerError::config("max_pages", "must be at least 1"));
        }

        if self.ecosystems.is_empty() {
            return Err(CrawlerError::config(
                "ecosystems",
                "at least one ecosystem required",
            ));
        }

        self.resolver()?;

        Ok(())
    }

    /// Path resolver with the configured cache markers and pattern overrides.
    ///
    /// # Errors
    ///
    /// `CrawlerError::Config` when a pattern is rejected by
    /// [`PathResolver::with_pattern`].
    pub fn resolver(&self) -> Result<PathResolver, CrawlerError> {
        self.patterns.iter().try_fold(
            PathResolver::new(self.cache_markers.clone()),
            |resolver, (ecosystem, pattern)| resolver.with_pattern(*ecosystem, pattern),
        )
    }

    /// Retry policy applied to every store call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            backoff_base: Duration::from_millis(self.retry_backoff_base_ms),
            call_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Whether a repository passes the include-list filter.
    pub fn includes_repo(&self, key: &str) -> bool {
        self.include_repos.is_empty() || self.include_repos.iter().any(|k| k == key)
    }
}

/// [`CrawlerConfig`] builder, validating on `build()`
#[derive(Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repo_concurrency(mut self, n: usize) -> Self {
        self.config.repo_concurrency = n;
        self
    }

    pub fn artifact_concurrency(mut self, n: usize) -> Self {
        self.config.artifact_concurrency = n;
        self
    }

    pub fn max_retries(mut self, attempts: u32) -> Self {
        self.config.max_retries = attempts;
        self
    }

    pub fn retry_backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_base_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages;
        self
    }

    pub fn ecosystems(mut self, ecosystems: Vec<Ecosystem>) -> Self {
        self.config.ecosystems = ecosystems;
        self
    }

    pub fn include_repos(mut self, keys: Vec<String>) -> Self {
        self.config.include_repos = keys;
        self
    }

    pub fn cache_markers(mut self, markers: Vec<String>) -> Self {
        self.config.cache_markers = markers;
        self
    }

    pub fn lineage_key(mut self, mode: LineageKeyMode) -> Self {
        self.config.lineage_key = mode;
        self
    }

    pub fn pattern(mut self, ecosystem: Ecosystem, pattern: impl Into<String>) -> Self {
        self.config.patterns.insert(ecosystem, pattern.into());
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// `CrawlerError::Config` when a value is out of range.
    pub fn build(self) -> Result<CrawlerConfig, CrawlerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
