//! Retry with linear backoff for remote store calls
//!
//! [`RetryingStoreClient`] wraps any [`StoreClient`] and applies one
//! [`RetryPolicy`] to all three store operations. Only
//! [`CrawlerError::is_transient`] failures are retried; a rejected or
//! undecodable response is returned immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use artiscan_core::metrics as m;
use artiscan_core::types::{ArtifactDetail, Repository};

use crate::client::{ArtifactPage, StoreClient};
use crate::error::CrawlerError;

/// Attempt ceiling, backoff and per-call timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `backoff_base * n`
    pub backoff_base: Duration,
    /// Timeout of a single attempt
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }

    /// Runs `call` until it succeeds, fails non-transiently, or the attempt
    /// ceiling is reached. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, CrawlerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CrawlerError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let err = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_transient() => return Err(e),
                Ok(Err(e)) => e,
                Err(_elapsed) => CrawlerError::transient(
                    operation,
                    format!("timed out after {}ms", self.call_timeout.as_millis()),
                ),
            };

            if attempt < max_attempts {
                let backoff = self.backoff_for(attempt);
                warn!(
                    operation = operation,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "retrying remote call"
                );
                metrics::counter!(m::CRAWLER_REMOTE_RETRIES_TOTAL, m::LABEL_OPERATION => operation.to_owned())
                    .increment(1);
                tokio::time::sleep(backoff).await;
            }
            last_error = Some(err);
        }

        Err(last_error
            .unwrap_or_else(|| CrawlerError::transient(operation, "no attempt was made")))
    }
}

/// [`StoreClient`] decorator applying a [`RetryPolicy`] to every call.
pub struct RetryingStoreClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: StoreClient> RetryingStoreClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    #[cfg(test)]
    fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: StoreClient> StoreClient for RetryingStoreClient<C> {
    async fn list_repositories(&self) -> Result<Vec<Repository>, CrawlerError> {
        self.policy
            .run("list_repositories", || self.inner.list_repositories())
            .await
    }

    async fn list_artifacts(
        &self,
        repository_key: &str,
        page_token: Option<&str>,
    ) -> Result<ArtifactPage, CrawlerError> {
        self.policy
            .run("list_artifacts", || {
                self.inner.list_artifacts(repository_key, page_token)
            })
            .await
    }

    async fn fetch_detail(
        &self,
        repository_key: &str,
        path: &str,
    ) -> Result<ArtifactDetail, CrawlerError> {
        self.policy
            .run("fetch_detail", || self.inner.fetch_detail(repository_key, path))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Fails transiently `failures` times, then answers with a checksum.
    struct FlakyStore {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StoreClient for FlakyStore {
        async fn list_repositories(&self) -> Result<Vec<Repository>, CrawlerError> {
            Ok(vec![])
        }

        async fn list_artifacts(
            &self,
            _repository_key: &str,
            _page_token: Option<&str>,
        ) -> Result<ArtifactPage, CrawlerError> {
            Err(CrawlerError::Rejected {
                operation: "list_artifacts".to_owned(),
                status: 403,
                reason: "Forbidden".to_owned(),
            })
        }

        async fn fetch_detail(
            &self,
            _repository_key: &str,
            _path: &str,
        ) -> Result<ArtifactDetail, CrawlerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(CrawlerError::transient("fetch_detail", "503 Service Unavailable"));
            }
            Ok(ArtifactDetail {
                checksum_sha256: Some("deadbeef".to_owned()),
            })
        }
    }

    /// Never answers within any reasonable timeout.
    struct HangingStore;

    impl StoreClient for HangingStore {
        async fn list_repositories(&self) -> Result<Vec<Repository>, CrawlerError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }

        async fn list_artifacts(
            &self,
            _repository_key: &str,
            _page_token: Option<&str>,
        ) -> Result<ArtifactPage, CrawlerError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ArtifactPage::default())
        }

        async fn fetch_detail(
            &self,
            _repository_key: &str,
            _path: &str,
        ) -> Result<ArtifactDetail, CrawlerError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ArtifactDetail::default())
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_millis(100),
            call_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn backoff_is_linear() {
        let p = policy(3);
        assert_eq!(p.backoff_for(1), Duration::from_millis(100));
        assert_eq!(p.backoff_for(2), Duration::from_millis(200));
        assert_eq!(p.backoff_for(3), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_one_less_failure_than_ceiling() {
        let client = RetryingStoreClient::new(FlakyStore::new(2), policy(3));
        let detail = client.fetch_detail("r1", "a").await.unwrap();
        assert_eq!(detail.checksum_sha256.as_deref(), Some("deadbeef"));
        assert_eq!(client.inner().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_ceiling() {
        let client = RetryingStoreClient::new(FlakyStore::new(3), policy(3));
        let err = client.fetch_detail("r1", "a").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(client.inner().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_linear_backoff_between_attempts() {
        let client = RetryingStoreClient::new(FlakyStore::new(10), policy(3));
        let start = tokio::time::Instant::now();
        let _ = client.fetch_detail("r1", "a").await;
        // 100ms after attempt 1, 200ms after attempt 2, nothing after the last.
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_is_not_retried() {
        let client = RetryingStoreClient::new(FlakyStore::new(0), policy(3));
        let start = tokio::time::Instant::now();
        let err = client.list_artifacts("r1", None).await.unwrap_err();
        assert!(matches!(err, CrawlerError::Rejected { status: 403, .. }));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_transient_attempt() {
        let p = RetryPolicy {
            max_attempts: 2,
            backoff_base: Duration::from_millis(10),
            call_timeout: Duration::from_secs(1),
        };
        let client = RetryingStoreClient::new(HangingStore, p);
        let err = client.list_repositories().await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_calls_once() {
        let client = RetryingStoreClient::new(FlakyStore::new(0), policy(0));
        assert!(client.fetch_detail("r1", "a").await.is_ok());
        assert_eq!(client.inner().calls(), 1);
    }
}
