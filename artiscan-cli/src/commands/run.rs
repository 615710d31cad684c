//! `artiscan run` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use artiscan_core::config::ArtiscanConfig;
use artiscan_crawler::{
    CrawlerBuilder, CrawlerConfig, CsvReportSink, HttpStoreClient, LineageSource, RunSummary,
};

use super::load_config;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
///
/// # Errors
///
/// - `CliError::Core(Config)` for invalid settings (exit 2)
/// - `CliError::Core(Remote(Enumeration))` when repositories cannot be listed (exit 3)
/// - `CliError::Core(Report)` when the report cannot be written (exit 4)
pub async fn execute(
    args: RunArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut config = load_config(config_path).await?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let store = HttpStoreClient::from_core(&config)?;
    let lineage = LineageSource::from_core(&config)?;
    let crawler = CrawlerBuilder::new()
        .config(CrawlerConfig::from_core(&config))
        .store(store)
        .lineage(lineage)
        .build()?;

    let mut sink = CsvReportSink::from_core(&config);
    if let Some(date) = args.date {
        sink = sink.with_date(date);
    }

    artiscan_core::metrics::describe_all();
    info!(
        store = %config.store.base_url,
        lineage = config.lineage.enabled,
        "starting crawl"
    );
    let summary = crawler.run(sink).await?;

    writer.render(&RunReport::from(summary))?;
    Ok(())
}

/// Applies command-line overrides on top of file and environment values.
fn apply_overrides(config: &mut ArtiscanConfig, args: &RunArgs) {
    if let Some(dir) = &args.output_dir {
        config.report.output_dir = dir.display().to_string();
    }
    if !args.repos.is_empty() {
        config.crawler.include_repos = args.repos.clone();
    }
    if !args.ecosystems.is_empty() {
        config.crawler.ecosystems = args.ecosystems.clone();
    }
    if args.no_lineage {
        config.lineage.enabled = false;
    }
}

/// Outcome of one crawl, as printed to the operator.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub report: Option<String>,
    pub repositories_total: usize,
    pub repositories_filtered: usize,
    pub repositories_processed: usize,
    pub repositories_failed: usize,
    pub artifacts_seen: u64,
    pub records: usize,
    pub duplicates_dropped: usize,
    pub skipped_total: u64,
    pub skipped: BTreeMap<String, u64>,
    pub lineage_lookups: u64,
}

impl From<RunSummary> for RunReport {
    fn from(summary: RunSummary) -> Self {
        Self {
            skipped_total: summary.skipped_total(),
            skipped: summary
                .skipped
                .iter()
                .map(|(reason, count)| (reason.as_str().to_owned(), *count))
                .collect(),
            run_id: summary.run_id,
            report: summary.report_location,
            repositories_total: summary.repositories_total,
            repositories_filtered: summary.repositories_filtered,
            repositories_processed: summary.repositories_processed,
            repositories_failed: summary.repositories_failed,
            artifacts_seen: summary.artifacts_seen,
            records: summary.records_emitted,
            duplicates_dropped: summary.duplicates_dropped,
            lineage_lookups: summary.lineage_lookups,
        }
    }
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Crawl {}", self.run_id.bold())?;
        match &self.report {
            Some(path) => writeln!(w, "  Report:       {}", path.green())?,
            None => writeln!(w, "  Report:       {}", "(not written)".yellow())?,
        }
        writeln!(
            w,
            "  Repositories: {} total, {} filtered, {} processed, {}",
            self.repositories_total,
            self.repositories_filtered,
            self.repositories_processed,
            if self.repositories_failed > 0 {
                format!("{} failed", self.repositories_failed).red().to_string()
            } else {
                "0 failed".to_owned()
            }
        )?;
        writeln!(w, "  Artifacts:    {} seen", self.artifacts_seen)?;
        writeln!(
            w,
            "  Records:      {} ({} duplicates dropped)",
            self.records, self.duplicates_dropped
        )?;
        writeln!(w, "  Lineage:      {} lookups", self.lineage_lookups)?;
        writeln!(w, "  Skipped:      {}", self.skipped_total)?;
        for (reason, count) in &self.skipped {
            writeln!(w, "    {:<20} {}", reason, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artiscan_core::types::SkipReason;
    use std::path::PathBuf;

    fn summary() -> RunSummary {
        let mut skipped = BTreeMap::new();
        skipped.insert(SkipReason::ControlPath, 2);
        skipped.insert(SkipReason::MissingChecksum, 1);
        RunSummary {
            run_id: "run-1".to_owned(),
            repositories_total: 4,
            repositories_filtered: 1,
            repositories_processed: 2,
            repositories_failed: 1,
            artifacts_seen: 10,
            records_emitted: 7,
            duplicates_dropped: 0,
            skipped,
            lineage_lookups: 5,
            report_location: Some("reports/artifact_inventory_2025-01-31.csv".to_owned()),
        }
    }

    #[test]
    fn report_from_summary() {
        let report = RunReport::from(summary());
        assert_eq!(report.records, 7);
        assert_eq!(report.skipped_total, 3);
        assert_eq!(report.skipped.get("control-path"), Some(&2));
        assert_eq!(
            report.report.as_deref(),
            Some("reports/artifact_inventory_2025-01-31.csv")
        );
    }

    #[test]
    fn report_renders_text() {
        let mut buffer = Vec::new();
        RunReport::from(summary()).render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("run-1"));
        assert!(output.contains("artifact_inventory_2025-01-31.csv"));
        assert!(output.contains("missing-checksum"));
        assert!(output.contains("10 seen"));
    }

    #[test]
    fn report_serializes_to_json() {
        let json = serde_json::to_value(RunReport::from(summary())).unwrap();
        assert_eq!(json["records"], 7);
        assert_eq!(json["skipped"]["missing-checksum"], 1);
        assert_eq!(json["repositories_failed"], 1);
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = ArtiscanConfig::default();
        config.lineage.enabled = true;
        let args = RunArgs {
            output_dir: Some(PathBuf::from("/tmp/reports")),
            repos: vec!["docker-prod".to_owned()],
            ecosystems: vec!["container".to_owned()],
            no_lineage: true,
            date: None,
        };

        apply_overrides(&mut config, &args);
        assert_eq!(config.report.output_dir, "/tmp/reports");
        assert_eq!(config.crawler.include_repos, vec!["docker-prod"]);
        assert_eq!(config.crawler.ecosystems, vec!["container"]);
        assert!(!config.lineage.enabled);
    }

    #[test]
    fn empty_overrides_keep_config_values() {
        let mut config = ArtiscanConfig::default();
        let before = config.crawler.ecosystems.clone();
        apply_overrides(&mut config, &RunArgs::default());
        assert_eq!(config.crawler.ecosystems, before);
        assert_eq!(config.report.output_dir, ArtiscanConfig::default().report.output_dir);
    }
}
