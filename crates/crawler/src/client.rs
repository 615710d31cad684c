//! Artifact store API abstraction
//!
//! The [`StoreClient`] trait hides the store's HTTP API so the crawler can run
//! against [`HttpStoreClient`] in production and `MockStoreClient` in tests.
//!
//! ```text
//!   ┌─────────┐      ┌────────────────────┐      ┌────────────────┐
//!   │ Crawler │ ───▶ │ RetryingStoreClient│ ───▶ │ HttpStoreClient│ ───▶ store
//!   └─────────┘      └────────────────────┘      └────────────────┘
//! ```
//!
//! # Endpoints
//!
//! | Call | Request | Response |
//! |---|---|---|
//! | `list_repositories` | `GET {base}/api/repositories` | `[{"key", "packageType"}]` |
//! | `list_artifacts` | `GET {base}/api/repositories/{repo}/artifacts?page_size=N&page_token=T` | `{"items":[{"path"}], "next_page"}` |
//! | `fetch_detail` | `GET {base}/api/storage/{repo}/{path}` | `{"checksums":{"sha256"}}` |
//!
//! # Status classification
//!
//! - network errors, timeouts, `408`, `429`, `5xx`: `CrawlerError::Transient`
//! - any other non-success status: `CrawlerError::Rejected`
//! - undecodable body: `CrawlerError::Decode`

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use artiscan_core::config::ArtiscanConfig;
use artiscan_core::types::{ArtifactDetail, ArtifactRef, Repository};

use crate::error::CrawlerError;

const USER_AGENT: &str = concat!("artiscan/", env!("CARGO_PKG_VERSION"));

/// One page of an artifact listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPage {
    pub items: Vec<ArtifactRef>,
    /// Token of the next page, `None` on the last page
    pub next_page: Option<String>,
}

/// Trait abstracting the artifact store API.
///
/// The trait is `Send + Sync + 'static` so one client can be shared by every
/// repository task and artifact worker.
pub trait StoreClient: Send + Sync + 'static {
    /// Lists every repository visible to the credential.
    fn list_repositories(
        &self,
    ) -> impl Future<Output = Result<Vec<Repository>, CrawlerError>> + Send;

    /// Lists one page of artifact paths in a repository.
    ///
    /// `page_token` is `None` for the first page.
    fn list_artifacts(
        &self,
        repository_key: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<ArtifactPage, CrawlerError>> + Send;

    /// Fetches the checksum detail of one artifact.
    fn fetch_detail(
        &self,
        repository_key: &str,
        path: &str,
    ) -> impl Future<Output = Result<ArtifactDetail, CrawlerError>> + Send;
}

// --- wire types ---

#[derive(Debug, Deserialize)]
struct RepositoryEntry {
    key: String,
    #[serde(rename = "packageType", default)]
    package_type: String,
}

#[derive(Debug, Deserialize)]
struct ArtifactListing {
    #[serde(default)]
    items: Vec<ListingItem>,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingItem {
    path: String,
}

#[derive(Debug, Deserialize)]
struct StorageInfo {
    #[serde(default)]
    checksums: Option<Checksums>,
}

#[derive(Debug, Deserialize)]
struct Checksums {
    #[serde(default)]
    sha256: Option<String>,
}

/// Production store client over HTTP+JSON.
///
/// Connection pooling comes from the shared `reqwest::Client`. Retries are not
/// handled here; wrap the client in [`RetryingStoreClient`](crate::retry::RetryingStoreClient).
#[derive(Debug, Clone)]
pub struct HttpStoreClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    page_size: usize,
}

impl HttpStoreClient {
    /// Creates a client for the store at `base_url`.
    ///
    /// An empty `token` sends no `Authorization` header.
    ///
    /// # Errors
    ///
    /// `CrawlerError::Config` when the URL is invalid or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        token: &str,
        page_size: usize,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, CrawlerError> {
        Ok(Self {
            http: build_http_client(connect_timeout, request_timeout)?,
            base_url: parse_base_url("store.base_url", base_url)?,
            token: non_empty(token),
            page_size,
        })
    }

    /// Creates a client from the `[store]` section.
    pub fn from_core(config: &ArtiscanConfig) -> Result<Self, CrawlerError> {
        Self::new(
            &config.store.base_url,
            &config.store.token,
            config.store.page_size,
            Duration::from_secs(config.store.connect_timeout_secs),
            Duration::from_secs(config.store.request_timeout_secs),
        )
    }

    /// Store base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl StoreClient for HttpStoreClient {
    async fn list_repositories(&self) -> Result<Vec<Repository>, CrawlerError> {
        const OP: &str = "list_repositories";
        let url = endpoint(&self.base_url, OP, &["api", "repositories"])?;
        let entries: Vec<RepositoryEntry> =
            get_json(&self.http, self.token.as_deref(), OP, url).await?;
        Ok(entries
            .into_iter()
            .map(|e| Repository::new(e.key, e.package_type))
            .collect())
    }

    async fn list_artifacts(
        &self,
        repository_key: &str,
        page_token: Option<&str>,
    ) -> Result<ArtifactPage, CrawlerError> {
        const OP: &str = "list_artifacts";
        let mut url = endpoint(
            &self.base_url,
            OP,
            &["api", "repositories", repository_key, "artifacts"],
        )?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page_size", &self.page_size.to_string());
            if let Some(token) = page_token {
                query.append_pair("page_token", token);
            }
        }

        let listing: ArtifactListing =
            get_json(&self.http, self.token.as_deref(), OP, url).await?;
        Ok(ArtifactPage {
            items: listing
                .items
                .into_iter()
                .map(|item| ArtifactRef::new(repository_key, item.path))
                .collect(),
            next_page: listing.next_page.filter(|t| !t.is_empty()),
        })
    }

    async fn fetch_detail(
        &self,
        repository_key: &str,
        path: &str,
    ) -> Result<ArtifactDetail, CrawlerError> {
        const OP: &str = "fetch_detail";
        let mut segments = vec!["api", "storage", repository_key];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let url = endpoint(&self.base_url, OP, &segments)?;

        let info: StorageInfo = get_json(&self.http, self.token.as_deref(), OP, url).await?;
        Ok(ArtifactDetail {
            checksum_sha256: info
                .checksums
                .and_then(|c| c.sha256)
                .filter(|s| !s.trim().is_empty()),
        })
    }
}

// --- shared HTTP helpers (also used by the lineage client) ---

pub(crate) fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<reqwest::Client, CrawlerError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(|e| CrawlerError::config("http_client", e.to_string()))
}

pub(crate) fn parse_base_url(field: &str, raw: &str) -> Result<Url, CrawlerError> {
    let url = Url::parse(raw).map_err(|e| CrawlerError::config(field, e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(CrawlerError::config(field, "URL cannot be used as a base"));
    }
    Ok(url)
}

pub(crate) fn non_empty(token: &str) -> Option<String> {
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

/// Appends percent-encoded path segments to the base URL.
pub(crate) fn endpoint(base: &Url, operation: &str, segments: &[&str]) -> Result<Url, CrawlerError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| CrawlerError::decode(operation, "base URL cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Sends an authenticated GET, mapping transport failures to `Transient`.
pub(crate) async fn send_get(
    http: &reqwest::Client,
    token: Option<&str>,
    operation: &str,
    url: Url,
) -> Result<reqwest::Response, CrawlerError> {
    let mut request = http.get(url).header(reqwest::header::ACCEPT, "application/json");
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    request
        .send()
        .await
        .map_err(|e| CrawlerError::transient(operation, e.to_string()))
}

/// Classifies a non-success HTTP status.
pub(crate) fn status_error(operation: &str, status: StatusCode) -> CrawlerError {
    let reason = status
        .canonical_reason()
        .unwrap_or("unexpected status")
        .to_owned();
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        CrawlerError::transient(operation, format!("status {}: {reason}", status.as_u16()))
    } else {
        CrawlerError::Rejected {
            operation: operation.to_owned(),
            status: status.as_u16(),
            reason,
        }
    }
}

/// Reads the response body and decodes it as JSON.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    operation: &str,
    response: reqwest::Response,
) -> Result<T, CrawlerError> {
    let body = response
        .bytes()
        .await
        .map_err(|e| CrawlerError::transient(operation, e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| CrawlerError::decode(operation, e.to_string()))
}

async fn get_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    token: Option<&str>,
    operation: &str,
    url: Url,
) -> Result<T, CrawlerError> {
    let response = send_get(http, token, operation, url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(status_error(operation, status));
    }
    decode_json(operation, response).await
}

/// Test store client with configurable responses.
///
/// Listings are served from `pages`: page `n` is answered for token `n`
/// (`None` means page 0). Details missing from `details` answer `404`.
#[cfg(test)]
#[derive(Default)]
pub struct MockStoreClient {
    pub repositories: Vec<Repository>,
    pub pages: std::collections::HashMap<String, Vec<Vec<String>>>,
    pub details: std::collections::HashMap<String, ArtifactDetail>,
    pub fail_repositories: bool,
    pub fail_listing: std::collections::HashSet<String>,
    pub detail_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(mut self, key: &str, package_type: &str) -> Self {
        self.repositories.push(Repository::new(key, package_type));
        self
    }

    pub fn with_pages(mut self, key: &str, pages: Vec<Vec<&str>>) -> Self {
        let pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(str::to_owned).collect())
            .collect();
        self.pages.insert(key.to_owned(), pages);
        self
    }

    pub fn with_checksum(mut self, key: &str, path: &str, sha256: &str) -> Self {
        self.details.insert(
            format!("{key}/{path}"),
            ArtifactDetail {
                checksum_sha256: Some(sha256.to_owned()),
            },
        );
        self
    }

    pub fn with_detail(mut self, key: &str, path: &str, detail: ArtifactDetail) -> Self {
        self.details.insert(format!("{key}/{path}"), detail);
        self
    }

    pub fn failing_listing(mut self, key: &str) -> Self {
        self.fail_listing.insert(key.to_owned());
        self
    }
}

#[cfg(test)]
impl StoreClient for MockStoreClient {
    async fn list_repositories(&self) -> Result<Vec<Repository>, CrawlerError> {
        if self.fail_repositories {
            return Err(CrawlerError::transient("list_repositories", "mock failure"));
        }
        Ok(self.repositories.clone())
    }

    async fn list_artifacts(
        &self,
        repository_key: &str,
        page_token: Option<&str>,
    ) -> Result<ArtifactPage, CrawlerError> {
        if self.fail_listing.contains(repository_key) {
            return Err(CrawlerError::transient("list_artifacts", "mock failure"));
        }
        let index: usize = match page_token {
            None => 0,
            Some(token) => token
                .parse()
                .map_err(|_| CrawlerError::decode("list_artifacts", "bad page token"))?,
        };
        let pages = self.pages.get(repository_key).cloned().unwrap_or_default();
        let items = pages
            .get(index)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|path| ArtifactRef::new(repository_key, path))
            .collect();
        let next_page = (index + 1 < pages.len()).then(|| (index + 1).to_string());
        Ok(ArtifactPage { items, next_page })
    }

    async fn fetch_detail(
        &self,
        repository_key: &str,
        path: &str,
    ) -> Result<ArtifactDetail, CrawlerError> {
        self.detail_calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.details
            .get(&format!("{repository_key}/{path}"))
            .cloned()
            .ok_or_else(|| CrawlerError::Rejected {
                operation: "fetch_detail".to_owned(),
                status: 404,
                reason: "Not Found".to_owned(),
            })
    }
}
