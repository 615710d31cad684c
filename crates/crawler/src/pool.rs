//! Bounded artifact worker pool
//!
//! [`ArtifactWorkerPool::process`] turns one repository's artifact batch into
//! normalized records. At most `concurrency` workers run at once; a permit is
//! taken before a worker is spawned, so a large batch never fans out beyond the
//! bound.
//!
//! Each worker runs: resolve identity → fetch detail → check checksum →
//! resolve lineage → build record. Any step may end the artifact with a
//! [`SkipReason`]; skips are logged and counted, never returned as errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use artiscan_core::metrics as m;
use artiscan_core::types::{
    ArtifactRef, Ecosystem, NormalizedRecord, SkipReason, is_hex_checksum,
};

use crate::client::StoreClient;
use crate::error::CrawlerError;
use crate::lineage::{LineageCache, LineageClient};
use crate::resolver::{PathResolver, Resolution};

/// Result of one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    Record(NormalizedRecord),
    Skipped(SkipReason),
}

/// Records and skip counts of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub records: Vec<NormalizedRecord>,
    pub skipped: BTreeMap<SkipReason, u64>,
}

impl BatchOutcome {
    fn push(&mut self, outcome: ArtifactOutcome) {
        match outcome {
            ArtifactOutcome::Record(record) => self.records.push(record),
            ArtifactOutcome::Skipped(reason) => *self.skipped.entry(reason).or_default() += 1,
        }
    }

    /// Total skipped artifacts.
    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }
}

/// Worker pool shared by every repository of a run.
pub struct ArtifactWorkerPool<C, L> {
    client: Arc<C>,
    lineage: Arc<LineageCache<L>>,
    resolver: Arc<PathResolver>,
    concurrency: usize,
}

impl<C, L> Clone for ArtifactWorkerPool<C, L> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            lineage: Arc::clone(&self.lineage),
            resolver: Arc::clone(&self.resolver),
            concurrency: self.concurrency,
        }
    }
}

impl<C: StoreClient, L: LineageClient> ArtifactWorkerPool<C, L> {
    pub fn new(
        client: Arc<C>,
        lineage: Arc<LineageCache<L>>,
        resolver: Arc<PathResolver>,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            lineage,
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Processes one repository's batch.
    ///
    /// Output order does not follow input order.
    ///
    /// # Errors
    ///
    /// `CrawlerError::Task` when a worker task fails to join.
    pub async fn process(
        &self,
        ecosystem: Ecosystem,
        artifacts: Vec<ArtifactRef>,
    ) -> Result<BatchOutcome, CrawlerError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();
        let mut outcome = BatchOutcome::default();

        for artifact in artifacts {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| CrawlerError::Task(e.to_string()))?;

            while let Some(joined) = workers.try_join_next() {
                outcome.push(joined.map_err(|e| CrawlerError::Task(e.to_string()))?);
            }

            let client = Arc::clone(&self.client);
            let lineage = Arc::clone(&self.lineage);
            let resolver = Arc::clone(&self.resolver);
            workers.spawn(async move {
                let _permit = permit;
                process_artifact(&*client, &lineage, &resolver, ecosystem, &artifact).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            outcome.push(joined.map_err(|e| CrawlerError::Task(e.to_string()))?);
        }

        Ok(outcome)
    }
}

/// Runs the per-artifact steps for one path.
pub async fn process_artifact<C: StoreClient, L: LineageClient>(
    client: &C,
    lineage: &LineageCache<L>,
    resolver: &PathResolver,
    ecosystem: Ecosystem,
    artifact: &ArtifactRef,
) -> ArtifactOutcome {
    let repo = artifact.repository_key.as_str();
    let path = artifact.raw_path.as_str();

    let identity = match resolver.resolve(ecosystem, path) {
        Resolution::Identity(identity) => identity,
        Resolution::Skip(reason) => return skip(artifact, reason, None),
    };

    let detail = match client.fetch_detail(repo, path).await {
        Ok(detail) => detail,
        Err(e) => return skip(artifact, SkipReason::DetailUnavailable, Some(&e)),
    };

    // A checksum that is not a hex digest cannot form a stable unique id.
    let Some(checksum) = detail.checksum_sha256.filter(|c| is_hex_checksum(c)) else {
        return skip(artifact, SkipReason::MissingChecksum, None);
    };

    let lineage_id = lineage.resolve(&identity).await;
    let record = NormalizedRecord::new(repo, ecosystem, &identity, &checksum, lineage_id);

    debug!(repo = repo, path = path, resource = %record.resource_name, "artifact recorded");
    metrics::counter!(m::CRAWLER_RECORDS_EMITTED_TOTAL).increment(1);
    ArtifactOutcome::Record(record)
}

fn skip(artifact: &ArtifactRef, reason: SkipReason, error: Option<&CrawlerError>) -> ArtifactOutcome {
    match error {
        Some(e) => warn!(
            repo = %artifact.repository_key,
            path = %artifact.raw_path,
            reason = %reason,
            error = %e,
            "artifact skipped"
        ),
        None => warn!(
            repo = %artifact.repository_key,
            path = %artifact.raw_path,
            reason = %reason,
            "artifact skipped"
        ),
    }
    metrics::counter!(m::CRAWLER_ARTIFACTS_SKIPPED_TOTAL, m::LABEL_REASON => reason.as_str())
        .increment(1);
    ArtifactOutcome::Skipped(reason)
}
