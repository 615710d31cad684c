//! Lineage lookup and per-run single-flight cache
//!
//! A lineage id is a provenance identifier (e.g. the build that produced an
//! image) resolved through a secondary API. Many artifacts share one identity
//! (every layer of an image, for instance), so lookups go through
//! [`LineageCache`], which guarantees at most one remote call per identity key
//! for the lifetime of the run.
//!
//! Failures and absent ids are cached as [`NOT_AVAILABLE`] and never re-fetched.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use artiscan_core::config::ArtiscanConfig;
use artiscan_core::metrics as m;
use artiscan_core::types::CanonicalIdentity;

use crate::client::{
    build_http_client, decode_json, endpoint, non_empty, parse_base_url, send_get, status_error,
};
use crate::error::CrawlerError;

/// Sentinel lineage id for failed, absent or disabled lookups.
pub const NOT_AVAILABLE: &str = "N/A";

/// Projection of a [`CanonicalIdentity`] used as the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageKeyMode {
    /// `name:version_or_tag`
    #[default]
    NameAndTag,
    /// `name` only; every tag of an image shares one lineage id
    Name,
}

impl LineageKeyMode {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "name_and_tag" | "name-and-tag" | "name+tag" => Some(Self::NameAndTag),
            "name" => Some(Self::Name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NameAndTag => "name_and_tag",
            Self::Name => "name",
        }
    }

    /// Cache key of an identity.
    pub fn key_for(&self, identity: &CanonicalIdentity) -> String {
        match self {
            Self::NameAndTag => identity.to_string(),
            Self::Name => identity.name.clone(),
        }
    }
}

/// Trait abstracting the lineage API.
pub trait LineageClient: Send + Sync + 'static {
    /// Looks up the lineage id of an identity key, `Ok(None)` when the API has none.
    fn lookup(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, CrawlerError>> + Send;

    /// Whether lookups should be issued at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct LineageResponse {
    #[serde(default)]
    lineage_id: Option<String>,
}

/// Lineage client over HTTP+JSON: `GET {base}/api/lineage?identity=K`.
#[derive(Debug, Clone)]
pub struct HttpLineageClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpLineageClient {
    /// # Errors
    ///
    /// `CrawlerError::Config` when the URL is invalid or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        token: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, CrawlerError> {
        Ok(Self {
            http: build_http_client(connect_timeout, request_timeout)?,
            base_url: parse_base_url("lineage.base_url", base_url)?,
            token: non_empty(token),
        })
    }
}

impl LineageClient for HttpLineageClient {
    async fn lookup(&self, key: &str) -> Result<Option<String>, CrawlerError> {
        const OP: &str = "lineage_lookup";
        let mut url = endpoint(&self.base_url, OP, &["api", "lineage"])?;
        url.query_pairs_mut().append_pair("identity", key);

        let response = send_get(&self.http, self.token.as_deref(), OP, url).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(OP, status));
        }

        let body: LineageResponse = decode_json(OP, response).await?;
        Ok(body
            .lineage_id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty()))
    }
}

/// Lineage backend selected from configuration.
#[derive(Debug, Clone)]
pub enum LineageSource {
    Remote(HttpLineageClient),
    /// Every artifact gets [`NOT_AVAILABLE`]; no call is made
    Disabled,
}

impl LineageSource {
    /// Builds the backend from the `[lineage]` section, reusing the store timeouts.
    pub fn from_core(config: &ArtiscanConfig) -> Result<Self, CrawlerError> {
        if !config.lineage.enabled {
            return Ok(Self::Disabled);
        }
        Ok(Self::Remote(HttpLineageClient::new(
            &config.lineage.base_url,
            &config.lineage.token,
            Duration::from_secs(config.store.connect_timeout_secs),
            Duration::from_secs(config.store.request_timeout_secs),
        )?))
    }
}

impl LineageClient for LineageSource {
    async fn lookup(&self, key: &str) -> Result<Option<String>, CrawlerError> {
        match self {
            Self::Remote(client) => client.lookup(key).await,
            Self::Disabled => Ok(None),
        }
    }

    fn is_enabled(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Single-flight lineage cache shared by every worker of a run.
///
/// The first caller for a key performs the lookup; concurrent callers for the
/// same key await that result instead of issuing their own call.
pub struct LineageCache<L> {
    client: Arc<L>,
    key_mode: LineageKeyMode,
    entries: DashMap<String, Arc<OnceCell<String>>>,
    lookups: AtomicU64,
}

impl<L: LineageClient> LineageCache<L> {
    pub fn new(client: L, key_mode: LineageKeyMode) -> Self {
        Self::shared(Arc::new(client), key_mode)
    }

    /// Creates an empty cache over a client shared with other runs.
    pub fn shared(client: Arc<L>, key_mode: LineageKeyMode) -> Self {
        Self {
            client,
            key_mode,
            entries: DashMap::new(),
            lookups: AtomicU64::new(0),
        }
    }

    /// Returns the lineage id of `identity`, fetching it at most once per key.
    pub async fn resolve(&self, identity: &CanonicalIdentity) -> String {
        if !self.client.is_enabled() {
            return NOT_AVAILABLE.to_owned();
        }
        let key = self.key_mode.key_for(identity);
        self.get_or_fetch(&key).await
    }

    /// Returns the cached lineage id of `key`, fetching it on first use.
    pub async fn get_or_fetch(&self, key: &str) -> String {
        let cell = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| self.fetch(key)).await.clone()
    }

    async fn fetch(&self, key: &str) -> String {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::CRAWLER_LINEAGE_LOOKUPS_TOTAL).increment(1);

        match self.client.lookup(key).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(identity = key, "no lineage id recorded");
                NOT_AVAILABLE.to_owned()
            }
            Err(e) => {
                warn!(identity = key, error = %e, "lineage lookup failed, caching N/A");
                NOT_AVAILABLE.to_owned()
            }
        }
    }

    /// Remote lookups issued so far.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Distinct keys seen.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Test lineage client with a fixed answer table and a call counter.
#[cfg(test)]
#[derive(Default)]
pub struct MockLineageClient {
    pub ids: std::collections::HashMap<String, String>,
    pub fail: bool,
    pub delay: Duration,
    pub calls: AtomicU64,
}

#[cfg(test)]
impl MockLineageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, key: &str, id: &str) -> Self {
        self.ids.insert(key.to_owned(), id.to_owned());
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl LineageClient for MockLineageClient {
    async fn lookup(&self, key: &str) -> Result<Option<String>, CrawlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(CrawlerError::transient("lineage_lookup", "mock failure"));
        }
        Ok(self.ids.get(key).cloned())
    }
}
