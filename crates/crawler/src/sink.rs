//! Report sinks
//!
//! A [`ReportSink`] receives the complete, deduplicated record set of a run
//! exactly once. Sinks do not retry; any I/O failure is fatal to the run.
//!
//! - [`CsvReportSink`]: `{output_dir}/{file_prefix}_{YYYY-MM-DD}.csv`
//! - [`MemorySink`]: keeps records in memory for embedding and tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::info;

use artiscan_core::config::ArtiscanConfig;
use artiscan_core::types::NormalizedRecord;

use crate::error::CrawlerError;

/// Fixed CSV column order.
pub const CSV_HEADER: [&str; 7] = [
    "resource_name",
    "csp_placeholder",
    "resource_type",
    "unique_id",
    "lineage_id",
    "digest",
    "registry_path",
];

/// Destination of a run's records.
///
/// `write` is called from a blocking thread, so implementations may do
/// synchronous I/O.
pub trait ReportSink: Send + 'static {
    /// Writes every record and returns a description of where they went.
    fn write(&mut self, records: &[NormalizedRecord]) -> Result<String, CrawlerError>;
}

/// CSV report file writer.
#[derive(Debug, Clone)]
pub struct CsvReportSink {
    output_dir: PathBuf,
    file_prefix: String,
    csp_placeholder: String,
    date: Option<NaiveDate>,
}

impl CsvReportSink {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        file_prefix: impl Into<String>,
        csp_placeholder: impl Into<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: file_prefix.into(),
            csp_placeholder: csp_placeholder.into(),
            date: None,
        }
    }

    /// Creates a sink from the `[report]` section.
    pub fn from_core(config: &ArtiscanConfig) -> Self {
        Self::new(
            &config.report.output_dir,
            &config.report.file_prefix,
            &config.report.csp_placeholder,
        )
    }

    /// Pins the date stamp instead of using today's local date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Report file path for the configured or current date.
    pub fn path(&self) -> PathBuf {
        let date = self
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        self.output_dir.join(format!(
            "{}_{}.csv",
            self.file_prefix,
            date.format("%Y-%m-%d")
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_file(&self, path: &Path, records: &[NormalizedRecord]) -> Result<(), String> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| e.to_string())?;

        let mut writer = csv::Writer::from_path(path).map_err(|e| e.to_string())?;
        writer.write_record(CSV_HEADER).map_err(|e| e.to_string())?;
        for record in records {
            writer
                .write_record([
                    record.resource_name.as_str(),
                    self.csp_placeholder.as_str(),
                    record.resource_type.as_str(),
                    record.unique_id.as_str(),
                    record.lineage_id.as_str(),
                    record.digest.as_str(),
                    record.registry_path.as_str(),
                ])
                .map_err(|e| e.to_string())?;
        }
        writer.flush().map_err(|e| e.to_string())
    }
}

impl ReportSink for CsvReportSink {
    fn write(&mut self, records: &[NormalizedRecord]) -> Result<String, CrawlerError> {
        let path = self.path();
        self.write_file(&path, records)
            .map_err(|reason| CrawlerError::Report {
                path: path.display().to_string(),
                reason,
            })?;

        info!(path = %path.display(), rows = records.len(), "report written");
        Ok(path.display().to_string())
    }
}

/// In-memory sink; clones share the same record buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<NormalizedRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records written so far.
    pub fn records(&self) -> Vec<NormalizedRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ReportSink for MemorySink {
    fn write(&mut self, records: &[NormalizedRecord]) -> Result<String, CrawlerError> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(records);
        Ok("memory".to_owned())
    }
}
