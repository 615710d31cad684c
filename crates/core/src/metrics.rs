//! Metric name constants and descriptions
//!
//! Every counter emitted by the workspace is named here so that names stay
//! consistent between crates. Crates call `metrics::counter!()` with these
//! constants; whichever recorder the host process installs receives them.
//!
//! # Naming convention
//!
//! - prefix: `artiscan_`
//! - suffix: `_total` for counters
//!
//! ```ignore
//! metrics::counter!(artiscan_core::metrics::CRAWLER_RECORDS_EMITTED_TOTAL).increment(1);
//! ```

// ─── label keys ──────────────────────────────────────────────────────

/// Skip reason label key (control-path, malformed-path, ...)
pub const LABEL_REASON: &str = "reason";

/// Ecosystem label key (container, npm, generic)
pub const LABEL_ECOSYSTEM: &str = "ecosystem";

/// Remote operation label key (list_repositories, list_artifacts, fetch_detail)
pub const LABEL_OPERATION: &str = "operation";

// ─── crawler metrics ─────────────────────────────────────────────────

/// Repositories fully processed (counter, label: ecosystem)
pub const CRAWLER_REPOSITORIES_PROCESSED_TOTAL: &str =
    "artiscan_crawler_repositories_processed_total";

/// Repositories skipped because listing failed (counter)
pub const CRAWLER_REPOSITORIES_FAILED_TOTAL: &str = "artiscan_crawler_repositories_failed_total";

/// Artifact paths returned by listings (counter)
pub const CRAWLER_ARTIFACTS_SEEN_TOTAL: &str = "artiscan_crawler_artifacts_seen_total";

/// Artifacts dropped from the report (counter, label: reason)
pub const CRAWLER_ARTIFACTS_SKIPPED_TOTAL: &str = "artiscan_crawler_artifacts_skipped_total";

/// Records produced by workers (counter)
pub const CRAWLER_RECORDS_EMITTED_TOTAL: &str = "artiscan_crawler_records_emitted_total";

/// Lineage lookups actually sent to the remote API (counter)
pub const CRAWLER_LINEAGE_LOOKUPS_TOTAL: &str = "artiscan_crawler_lineage_lookups_total";

/// Retried remote calls (counter, label: operation)
pub const CRAWLER_REMOTE_RETRIES_TOTAL: &str = "artiscan_crawler_remote_retries_total";

/// Registers descriptions for every metric.
///
/// Call once after the host installs a global recorder.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        CRAWLER_REPOSITORIES_PROCESSED_TOTAL,
        "Repositories whose artifacts were fully listed and enriched"
    );
    describe_counter!(
        CRAWLER_REPOSITORIES_FAILED_TOTAL,
        "Repositories skipped because artifact listing failed"
    );
    describe_counter!(
        CRAWLER_ARTIFACTS_SEEN_TOTAL,
        "Artifact paths returned by repository listings"
    );
    describe_counter!(
        CRAWLER_ARTIFACTS_SKIPPED_TOTAL,
        "Artifacts dropped from the report, by reason"
    );
    describe_counter!(
        CRAWLER_RECORDS_EMITTED_TOTAL,
        "Normalized records produced by artifact workers"
    );
    describe_counter!(
        CRAWLER_LINEAGE_LOOKUPS_TOTAL,
        "Lineage lookups sent to the remote API (cache misses)"
    );
    describe_counter!(
        CRAWLER_REMOTE_RETRIES_TOTAL,
        "Remote store calls retried after a transient failure"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_share_prefix_and_suffix() {
        for name in [
            CRAWLER_REPOSITORIES_PROCESSED_TOTAL,
            CRAWLER_REPOSITORIES_FAILED_TOTAL,
            CRAWLER_ARTIFACTS_SEEN_TOTAL,
            CRAWLER_ARTIFACTS_SKIPPED_TOTAL,
            CRAWLER_RECORDS_EMITTED_TOTAL,
            CRAWLER_LINEAGE_LOOKUPS_TOTAL,
            CRAWLER_REMOTE_RETRIES_TOTAL,
        ] {
            assert!(name.starts_with("artiscan_"), "{name}");
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}
