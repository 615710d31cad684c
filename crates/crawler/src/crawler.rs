//! Repository orchestrator
//!
//! [`Crawler`] drives a full run:
//!
//! 1. list repositories (fatal on failure: there is nothing to iterate)
//! 2. keep repositories whose ecosystem is supported, allowed and included
//! 3. for each repository, drain every listing page, then hand the batch to the
//!    [`ArtifactWorkerPool`]; up to `repo_concurrency` repositories run at once
//! 4. deduplicate and sort the aggregated records
//! 5. hand them to a [`ReportSink`] once
//!
//! A repository whose listing fails (after retries) is logged and skipped; the
//! run carries on with the rest.
//!
//! Every log line of a run is emitted inside a `crawl` span carrying a `run_id`.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use artiscan_core::metrics as m;
use artiscan_core::types::{ArtifactRef, Ecosystem, NormalizedRecord, Repository, SkipReason};

use crate::client::StoreClient;
use crate::config::CrawlerConfig;
use crate::error::CrawlerError;
use crate::lineage::{LineageCache, LineageClient};
use crate::pool::{ArtifactWorkerPool, BatchOutcome};
use crate::resolver::PathResolver;
use crate::retry::RetryingStoreClient;
use crate::sink::ReportSink;

/// Counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    /// Repositories returned by the store
    pub repositories_total: usize,
    /// Repositories excluded by ecosystem support, allow-list or include-list
    pub repositories_filtered: usize,
    pub repositories_processed: usize,
    pub repositories_failed: usize,
    pub artifacts_seen: u64,
    pub records_emitted: usize,
    /// Identical records collapsed before output
    pub duplicates_dropped: usize,
    pub skipped: BTreeMap<SkipReason, u64>,
    /// Remote lineage lookups issued
    pub lineage_lookups: u64,
    /// Where the report went, once written
    pub report_location: Option<String>,
}

impl RunSummary {
    /// Total skipped artifacts across reasons.
    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }
}

/// Sorted, deduplicated records of a run with its summary.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutput {
    pub records: Vec<NormalizedRecord>,
    pub summary: RunSummary,
}

struct RepositoryOutcome {
    artifacts_seen: u64,
    batch: BatchOutcome,
}

/// Artifact metadata crawler.
///
/// Built with [`CrawlerBuilder`]. Each [`collect`](Self::collect) or
/// [`run`](Self::run) call is an independent run with a fresh lineage cache.
pub struct Crawler<C, L> {
    config: CrawlerConfig,
    client: Arc<RetryingStoreClient<C>>,
    lineage: Arc<L>,
    resolver: Arc<PathResolver>,
}

impl<C: StoreClient, L: LineageClient> Crawler<C, L> {
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Crawls every selected repository and returns the records without writing them.
    ///
    /// # Errors
    ///
    /// `CrawlerError::Enumeration` when the repository list is unavailable.
    pub async fn collect(&self) -> Result<CrawlOutput, CrawlerError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("crawl", run_id = %run_id);
        self.collect_run(run_id).instrument(span).await
    }

    /// Crawls and writes the records to `sink`.
    ///
    /// The sink runs on a blocking thread.
    ///
    /// # Errors
    ///
    /// `CrawlerError::Enumeration` when the repository list is unavailable,
    /// `CrawlerError::Report` when the sink fails.
    pub async fn run<S: ReportSink>(&self, mut sink: S) -> Result<RunSummary, CrawlerError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("crawl", run_id = %run_id);

        async move {
            let CrawlOutput { records, mut summary } = self.collect_run(run_id).await?;

            let location = tokio::task::spawn_blocking(move || sink.write(&records))
                .await
                .map_err(|e| CrawlerError::Task(e.to_string()))??;

            summary.report_location = Some(location);
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn collect_run(&self, run_id: String) -> Result<CrawlOutput, CrawlerError> {
        let repositories = self.client.list_repositories().await.map_err(|e| {
            CrawlerError::Enumeration(format!("repository listing unavailable: {e}"))
        })?;

        let mut summary = RunSummary {
            run_id,
            repositories_total: repositories.len(),
            ..Default::default()
        };

        let selected = self.select(repositories);
        summary.repositories_filtered = summary.repositories_total - selected.len();
        info!(
            repositories = summary.repositories_total,
            selected = selected.len(),
            "crawl started"
        );

        let lineage = Arc::new(LineageCache::shared(
            Arc::clone(&self.lineage),
            self.config.lineage_key,
        ));
        let pool = ArtifactWorkerPool::new(
            Arc::clone(&self.client),
            Arc::clone(&lineage),
            Arc::clone(&self.resolver),
            self.config.artifact_concurrency,
        );

        let results: Vec<(String, Result<RepositoryOutcome, CrawlerError>)> =
            stream::iter(selected)
                .map(|(repository, ecosystem)| {
                    let pool = pool.clone();
                    async move {
                        let result = self.crawl_repository(&pool, &repository, ecosystem).await;
                        (repository.key, result)
                    }
                })
                .buffer_unordered(self.config.repo_concurrency.max(1))
                .collect()
                .await;

        let mut records = Vec::new();
        for (key, result) in results {
            match result {
                Ok(outcome) => {
                    summary.repositories_processed += 1;
                    summary.artifacts_seen += outcome.artifacts_seen;
                    for (reason, count) in outcome.batch.skipped {
                        *summary.skipped.entry(reason).or_default() += count;
                    }
                    records.extend(outcome.batch.records);
                }
                Err(e) => {
                    warn!(repo = %key, error = %e, "repository skipped");
                    metrics::counter!(m::CRAWLER_REPOSITORIES_FAILED_TOTAL).increment(1);
                    summary.repositories_failed += 1;
                }
            }
        }

        let produced = records.len();
        records.sort();
        records.dedup();
        summary.duplicates_dropped = produced - records.len();
        summary.records_emitted = records.len();
        summary.lineage_lookups = lineage.lookups();

        info!(
            processed = summary.repositories_processed,
            failed = summary.repositories_failed,
            artifacts_seen = summary.artifacts_seen,
            records = summary.records_emitted,
            skipped = summary.skipped_total(),
            "crawl finished"
        );

        Ok(CrawlOutput { records, summary })
    }

    /// Keeps repositories with a supported, allowed ecosystem that pass the include-list.
    fn select(&self, repositories: Vec<Repository>) -> Vec<(Repository, Ecosystem)> {
        repositories
            .into_iter()
            .filter_map(|repository| {
                if !self.config.includes_repo(&repository.key) {
                    debug!(repo = %repository.key, "repository not in include list");
                    return None;
                }
                let Some(ecosystem) = repository.ecosystem() else {
                    debug!(
                        repo = %repository.key,
                        package_type = %repository.package_type,
                        "unsupported repository type"
                    );
                    return None;
                };
                if !self.config.ecosystems.contains(&ecosystem) {
                    debug!(repo = %repository.key, ecosystem = %ecosystem, "ecosystem not allowed");
                    return None;
                }
                Some((repository, ecosystem))
            })
            .collect()
    }

    async fn crawl_repository(
        &self,
        pool: &ArtifactWorkerPool<RetryingStoreClient<C>, L>,
        repository: &Repository,
        ecosystem: Ecosystem,
    ) -> Result<RepositoryOutcome, CrawlerError> {
        let artifacts = self.drain_listing(&repository.key).await?;
        let artifacts_seen = artifacts.len() as u64;
        metrics::counter!(m::CRAWLER_ARTIFACTS_SEEN_TOTAL).increment(artifacts_seen);
        debug!(repo = %repository.key, artifacts = artifacts_seen, "listing drained");

        let batch = pool.process(ecosystem, artifacts).await?;

        metrics::counter!(
            m::CRAWLER_REPOSITORIES_PROCESSED_TOTAL,
            m::LABEL_ECOSYSTEM => ecosystem.to_string()
        )
        .increment(1);
        info!(
            repo = %repository.key,
            ecosystem = %ecosystem,
            records = batch.records.len(),
            skipped = batch.skipped_total(),
            "repository processed"
        );

        Ok(RepositoryOutcome {
            artifacts_seen,
            batch,
        })
    }

    /// Accumulates every listing page of a repository.
    ///
    /// A page token equal to the previous one, or more than `max_pages` pages,
    /// ends the listing with `CrawlerError::Enumeration`.
    async fn drain_listing(&self, repository_key: &str) -> Result<Vec<ArtifactRef>, CrawlerError> {
        let mut artifacts = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            if pages >= self.config.max_pages {
                return Err(CrawlerError::Enumeration(format!(
                    "{repository_key}: listing exceeded {} pages",
                    self.config.max_pages
                )));
            }

            let page = self
                .client
                .list_artifacts(repository_key, token.as_deref())
                .await?;
            pages += 1;
            artifacts.extend(page.items);

            match page.next_page {
                None => break,
                Some(next) if token.as_deref() == Some(next.as_str()) => {
                    return Err(CrawlerError::Enumeration(format!(
                        "{repository_key}: page token '{next}' repeated"
                    )));
                }
                Some(next) => token = Some(next),
            }
        }

        Ok(artifacts)
    }
}

/// [`Crawler`] builder
///
/// The store client is wrapped in a [`RetryingStoreClient`] using the
/// configuration's retry policy.
pub struct CrawlerBuilder<C, L> {
    config: CrawlerConfig,
    store: Option<C>,
    lineage: Option<L>,
    resolver: Option<PathResolver>,
}

impl<C, L> Default for CrawlerBuilder<C, L> {
    fn default() -> Self {
        Self {
            config: CrawlerConfig::default(),
            store: None,
            lineage: None,
            resolver: None,
        }
    }
}

impl<C: StoreClient, L: LineageClient> CrawlerBuilder<C, L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: CrawlerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, client: C) -> Self {
        self.store = Some(client);
        self
    }

    pub fn lineage(mut self, client: L) -> Self {
        self.lineage = Some(client);
        self
    }

    /// Overrides the resolver built from `config.cache_markers` and `config.patterns`.
    pub fn resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// # Errors
    ///
    /// `CrawlerError::Config` when the configuration is invalid or a client is missing.
    pub fn build(self) -> Result<Crawler<C, L>, CrawlerError> {
        self.config.validate()?;

        let store = self
            .store
            .ok_or_else(|| CrawlerError::config("store", "store client is required"))?;
        let lineage = self
            .lineage
            .ok_or_else(|| CrawlerError::config("lineage", "lineage client is required"))?;
        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => self.config.resolver()?,
        };

        Ok(Crawler {
            client: Arc::new(RetryingStoreClient::new(store, self.config.retry_policy())),
            lineage: Arc::new(lineage),
            resolver: Arc::new(resolver),
            config: self.config,
        })
    }
}
