//! Metrics for the cleaning, import and query stages.
//!
//! Recording goes through the `metrics` facade; nothing is exported unless a
//! recorder was installed with [`init`].

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::info;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Cleaning metrics
    CleaningRowsAccepted,
    CleaningRowsRejected,
    CleaningBatchSize,
    CleaningBatchesProcessed,

    // Import metrics
    ImportRowsImported,
    ImportRowsFailed,
    ImportTablesWritten,

    // Query metrics
    QueryExecutions,
    QueryErrors,
    QueryRowsReturned,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::CleaningRowsAccepted => "stats_cleaning_rows_accepted_total",
            MetricName::CleaningRowsRejected => "stats_cleaning_rows_rejected_total",
            MetricName::CleaningBatchSize => "stats_cleaning_batch_size",
            MetricName::CleaningBatchesProcessed => "stats_cleaning_batches_processed_total",

            MetricName::ImportRowsImported => "stats_import_rows_imported_total",
            MetricName::ImportRowsFailed => "stats_import_rows_failed_total",
            MetricName::ImportTablesWritten => "stats_import_tables_written_total",

            MetricName::QueryExecutions => "stats_query_executions_total",
            MetricName::QueryErrors => "stats_query_errors_total",
            MetricName::QueryRowsReturned => "stats_query_rows_returned",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            CleaningRowsAccepted,
            CleaningRowsRejected,
            CleaningBatchSize,
            CleaningBatchesProcessed,
            ImportRowsImported,
            ImportRowsFailed,
            ImportTablesWritten,
            QueryExecutions,
            QueryErrors,
            QueryRowsReturned,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far, if a recorder is installed.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|h| h.render())
}

pub mod cleaning {
    use super::MetricName;
    use crate::pipeline::processing::validate::ReasonCode;

    pub fn rows_accepted(count: usize) {
        ::metrics::counter!(MetricName::CleaningRowsAccepted.as_str()).increment(count as u64);
    }

    pub fn rows_rejected(reason: ReasonCode, count: usize) {
        ::metrics::counter!(
            MetricName::CleaningRowsRejected.as_str(),
            "reason" => reason.as_str()
        )
        .increment(count as u64);
    }

    pub fn batch_processed(dataset: &str, total_rows: usize) {
        ::metrics::histogram!(MetricName::CleaningBatchSize.as_str()).record(total_rows as f64);
        ::metrics::counter!(
            MetricName::CleaningBatchesProcessed.as_str(),
            "dataset" => dataset.to_string()
        )
        .increment(1);
    }
}

pub mod import {
    use super::MetricName;

    pub fn table_written(table: &str, rows_imported: usize, rows_failed: usize) {
        ::metrics::counter!(MetricName::ImportRowsImported.as_str(), "table" => table.to_string())
            .increment(rows_imported as u64);
        ::metrics::counter!(MetricName::ImportRowsFailed.as_str(), "table" => table.to_string())
            .increment(rows_failed as u64);
        ::metrics::counter!(MetricName::ImportTablesWritten.as_str()).increment(1);
    }
}

pub mod query {
    use super::MetricName;

    pub fn executed(query_id: &str, rows: usize) {
        ::metrics::counter!(MetricName::QueryExecutions.as_str(), "query" => query_id.to_string())
            .increment(1);
        ::metrics::histogram!(MetricName::QueryRowsReturned.as_str()).record(rows as f64);
    }

    pub fn failed(kind: &'static str) {
        ::metrics::counter!(MetricName::QueryErrors.as_str(), "kind" => kind).increment(1);
    }
}
