//! artiscan-crawler -- concurrent artifact metadata crawler
//!
//! Enumerates every repository of an artifact store, resolves each stored path to
//! a canonical `name:version` identity, enriches it with its checksum and lineage
//! id, and emits one normalized report row per artifact.
//!
//! # Architecture
//!
//! ```text
//! Crawler ──▶ list repositories ──▶ (per repository, bounded)
//!                                     drain listing pages
//!                                     │
//!                                     ▼
//!                              ArtifactWorkerPool (per artifact, bounded)
//!                                PathResolver → fetch_detail → LineageCache
//!                                     │
//!                                     ▼
//!                         dedup + sort ──▶ ReportSink (CSV)
//! ```
//!
//! # Modules
//!
//! - [`resolver`]: pure path → identity rules per ecosystem
//! - [`client`]: `StoreClient` trait and its HTTP implementation
//! - [`retry`]: retry policy and the `RetryingStoreClient` decorator
//! - [`lineage`]: lineage client and the single-flight `LineageCache`
//! - [`pool`]: bounded per-repository worker pool
//! - [`crawler`]: run orchestration and `RunSummary`
//! - [`sink`]: CSV and in-memory report sinks
//! - [`config`]: `CrawlerConfig` and its builder
//! - [`error`]: `CrawlerError`

pub mod client;
pub mod config;
pub mod crawler;
pub mod error;
pub mod lineage;
pub mod pool;
pub mod resolver;
pub mod retry;
pub mod sink;

// --- re-exports ---

pub use client::{ArtifactPage, HttpStoreClient, StoreClient};
pub use config::{CrawlerConfig, CrawlerConfigBuilder};
pub use crawler::{CrawlOutput, Crawler, CrawlerBuilder, RunSummary};
pub use error::CrawlerError;
pub use lineage::{
    HttpLineageClient, LineageCache, LineageClient, LineageKeyMode, LineageSource, NOT_AVAILABLE,
};
pub use pool::{ArtifactOutcome, ArtifactWorkerPool, BatchOutcome};
pub use resolver::{PathResolver, Resolution};
pub use retry::{RetryPolicy, RetryingStoreClient};
pub use sink::{CsvReportSink, MemorySink, ReportSink};
