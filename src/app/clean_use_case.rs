use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::ports::{CleaningOutputPort, RecordSourcePort, RejectionLogEntry};
use crate::pipeline::cleaning::{CleaningPipeline, CleaningReport};
use crate::pipeline::processing::schema::SchemaCatalog;
use crate::pipeline::processing::validate::ReasonCode;

/// Per-file record of one cleaning run, written to the summary JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningSummary {
    pub run_id: Uuid,
    pub dataset: String,
    pub source_file: String,
    pub source_sha256: String,
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub rejected_by_reason: BTreeMap<ReasonCode, usize>,
    pub finished_at: DateTime<Utc>,
}

/// Result of cleaning a single dataset.
#[derive(Debug, Clone)]
pub struct DatasetCleaning {
    pub report: CleaningReport,
    pub summary: CleaningSummary,
    /// `None` when no row was accepted
    pub cleaned_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct BatchCleaningStats {
    pub summaries: Vec<CleaningSummary>,
    /// Datasets with no input file
    pub missing: Vec<String>,
    /// Datasets whose cleaning failed, with the error
    pub failed: Vec<(String, String)>,
    pub removed_rows_log: Option<PathBuf>,
    pub summary_file: Option<PathBuf>,
}

impl BatchCleaningStats {
    pub fn total_accepted(&self) -> usize {
        self.summaries.iter().map(|s| s.accepted).sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.summaries.iter().map(|s| s.rejected).sum()
    }
}

/// Use case for cleaning raw dataset files into their cleaned form
pub struct CleanUseCase {
    catalog: Arc<SchemaCatalog>,
    source: Box<dyn RecordSourcePort>,
    output: Box<dyn CleaningOutputPort>,
    workers: usize,
}

impl CleanUseCase {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        source: Box<dyn RecordSourcePort>,
        output: Box<dyn CleaningOutputPort>,
        workers: usize,
    ) -> Self {
        Self {
            catalog,
            source,
            output,
            workers: workers.max(1),
        }
    }

    /// Clean one dataset and write its cleaned file if any row survived.
    /// `None` when the input file is absent.
    pub async fn clean_dataset(&self, dataset_id: &str, run_id: Uuid) -> Result<Option<DatasetCleaning>> {
        let schema = self.catalog.get_schema(dataset_id)?;
        let Some(batch) = self.source.read_dataset(dataset_id).await? else {
            return Ok(None);
        };

        let pipeline = CleaningPipeline::new(&self.catalog);
        let report = if self.workers > 1 {
            pipeline.run_concurrent(batch.records, dataset_id, self.workers).await?
        } else {
            pipeline.run(batch.records, dataset_id)?
        };

        let cleaned_path = if report.accepted.is_empty() {
            warn!(dataset = dataset_id, rejected = report.rejected.len(), "no rows accepted, cleaned file not written");
            None
        } else {
            let path = self.output.write_cleaned(schema, &report.accepted).await?;
            info!(
                dataset = dataset_id,
                path = %path.display(),
                accepted = report.accepted.len(),
                rejected = report.rejected.len(),
                "cleaned file written"
            );
            Some(path)
        };

        let summary = CleaningSummary {
            run_id,
            dataset: dataset_id.to_string(),
            source_file: batch.source_name,
            source_sha256: batch.sha256,
            total: report.total,
            accepted: report.accepted.len(),
            rejected: report.rejected.len(),
            rejected_by_reason: report.rejected_by_reason(),
            finished_at: Utc::now(),
        };

        Ok(Some(DatasetCleaning {
            report,
            summary,
            cleaned_path,
        }))
    }

    /// Clean every listed dataset. One dataset failing does not stop the others.
    /// The removed-rows log and the summary file cover the whole run.
    pub async fn clean_all(&self, dataset_ids: &[&str]) -> Result<BatchCleaningStats> {
        let run_id = Uuid::new_v4();
        let mut stats = BatchCleaningStats::default();
        let mut log_entries = Vec::new();

        for dataset_id in dataset_ids {
            match self.clean_dataset(dataset_id, run_id).await {
                Ok(Some(cleaning)) => {
                    let source_file = cleaning.summary.source_file.clone();
                    log_entries.extend(cleaning.report.rejected.into_iter().map(|row| RejectionLogEntry {
                        source_file: source_file.clone(),
                        row,
                    }));
                    stats.summaries.push(cleaning.summary);
                }
                Ok(None) => {
                    warn!(dataset = dataset_id, "input file not found, skipping");
                    stats.missing.push(dataset_id.to_string());
                }
                Err(e) => {
                    error!(dataset = dataset_id, error = %e, "cleaning failed");
                    stats.failed.push((dataset_id.to_string(), e.to_string()));
                }
            }
        }

        if !stats.summaries.is_empty() {
            stats.removed_rows_log = Some(self.output.write_rejection_log(&log_entries).await?);
            stats.summary_file = Some(self.output.write_summaries(&stats.summaries).await?);
        }

        info!(
            %run_id,
            datasets = stats.summaries.len(),
            accepted = stats.total_accepted(),
            rejected = stats.total_rejected(),
            missing = stats.missing.len(),
            failed = stats.failed.len(),
            "cleaning run finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::SourceBatch;
    use crate::pipeline::processing::normalize::CleanedRecord;
    use crate::pipeline::processing::schema::DatasetSchema;
    use crate::types::RawRecord;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct MockSource {
        files: HashMap<String, Vec<RawRecord>>,
    }

    #[async_trait]
    impl RecordSourcePort for MockSource {
        async fn read_dataset(&self, dataset_id: &str) -> anyhow::Result<Option<SourceBatch>> {
            Ok(self.files.get(dataset_id).map(|records| SourceBatch {
                source_name: format!("{}.csv", dataset_id),
                sha256: "00".to_string(),
                records: records.clone(),
            }))
        }
    }

    #[derive(Default)]
    struct Written {
        cleaned: Vec<(String, usize)>,
        log: Vec<RejectionLogEntry>,
        summaries: Vec<CleaningSummary>,
    }

    struct MockOutput {
        written: Arc<Mutex<Written>>,
    }

    #[async_trait]
    impl CleaningOutputPort for MockOutput {
        async fn write_cleaned(
            &self,
            schema: &DatasetSchema,
            records: &[CleanedRecord],
        ) -> anyhow::Result<PathBuf> {
            self.written.lock().await.cleaned.push((schema.id.clone(), records.len()));
            Ok(PathBuf::from(format!("{}_cleaned.csv", schema.id)))
        }

        async fn write_rejection_log(&self, entries: &[RejectionLogEntry]) -> anyhow::Result<PathBuf> {
            self.written.lock().await.log.extend_from_slice(entries);
            Ok(PathBuf::from("all_removed_rows_log.txt"))
        }

        async fn write_summaries(&self, summaries: &[CleaningSummary]) -> anyhow::Result<PathBuf> {
            self.written.lock().await.summaries.extend_from_slice(summaries);
            Ok(PathBuf::from("cleaning_summary.json"))
        }
    }

    fn row(year: &str, league: &str, player: &str, metric: (&str, &str)) -> RawRecord {
        RawRecord::from_pairs([
            ("Year", year),
            ("League", league),
            ("Player", player),
            ("Team", "New York"),
            metric,
        ])
    }

    fn use_case(workers: usize) -> (CleanUseCase, Arc<Mutex<Written>>) {
        let mut files = HashMap::new();
        files.insert(
            "home_runs_stats".to_string(),
            vec![
                row("1927", "AL", "Babe Ruth", ("Home Runs", "60")),
                row("1927", "XL", "Lou Gehrig", ("Home Runs", "47")),
                row("1928", "AL", "Babe Ruth", ("Home Runs", "0")),
            ],
        );
        files.insert(
            "rbi_stats".to_string(),
            vec![row("Year", "League", "Player", ("RBI", "RBI"))],
        );
        let written = Arc::new(Mutex::new(Written::default()));
        let use_case = CleanUseCase::new(
            Arc::new(SchemaCatalog::standard()),
            Box::new(MockSource { files }),
            Box::new(MockOutput {
                written: Arc::clone(&written),
            }),
            workers,
        );
        (use_case, written)
    }

    #[tokio::test]
    async fn test_clean_all_partitions_and_logs() {
        let (use_case, written) = use_case(1);
        let stats = use_case
            .clean_all(&["home_runs_stats", "rbi_stats", "wins_stats"])
            .await
            .unwrap();

        assert_eq!(stats.summaries.len(), 2);
        assert_eq!(stats.missing, vec!["wins_stats".to_string()]);
        assert!(stats.failed.is_empty());
        assert_eq!(stats.total_accepted(), 1);
        assert_eq!(stats.total_rejected(), 3);

        let written = written.lock().await;
        assert_eq!(written.cleaned, vec![("home_runs_stats".to_string(), 1)]);
        let reasons: Vec<(&str, ReasonCode)> = written
            .log
            .iter()
            .map(|e| (e.source_file.as_str(), e.row.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("home_runs_stats.csv", ReasonCode::OutOfDomain),
                ("home_runs_stats.csv", ReasonCode::ZeroOrNullMetric),
                ("rbi_stats.csv", ReasonCode::OutOfDomain),
            ]
        );
        assert!(written.summaries.iter().all(|s| s.run_id == written.summaries[0].run_id));
    }

    #[tokio::test]
    async fn test_summary_counts_by_reason() {
        let (use_case, _) = use_case(2);
        let cleaning = use_case
            .clean_dataset("home_runs_stats", Uuid::new_v4())
            .await
            .unwrap()
            .unwrap();
        let summary = cleaning.summary;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.accepted + summary.rejected, summary.total);
        assert_eq!(summary.rejected_by_reason.get(&ReasonCode::OutOfDomain), Some(&1));
        assert_eq!(summary.rejected_by_reason.get(&ReasonCode::ZeroOrNullMetric), Some(&1));
    }

    #[tokio::test]
    async fn test_unknown_dataset_is_reported_as_failed() {
        let (use_case, written) = use_case(1);
        let stats = use_case.clean_all(&["bunts_stats"]).await.unwrap();
        assert_eq!(stats.failed.len(), 1);
        assert!(stats.failed[0].1.contains("bunts_stats"));
        assert!(stats.removed_rows_log.is_none());
        assert!(written.lock().await.summaries.is_empty());
    }
}
