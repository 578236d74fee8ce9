use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::{Result, SchemaError};
use crate::observability::metrics;
use crate::pipeline::processing::normalize::{CleanedRecord, RecordNormalizer};
use crate::pipeline::processing::schema::{DatasetSchema, SchemaCatalog};
use crate::pipeline::processing::validate::{ReasonCode, RecordValidator, ValidationOutcome};
use crate::types::RawRecord;

/// A row excluded from the cleaned dataset, kept for the provenance log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// Position of the row in the input sequence
    pub index: usize,
    pub record: RawRecord,
    pub reason: ReasonCode,
    /// Source header of the column that caused the rejection
    pub column: String,
}

/// Result of one classified row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Cleaned(CleanedRecord),
    Rejected(RejectedRow),
}

/// Partition of a cleaning run's input into accepted and rejected rows.
///
/// Both sides keep input order and together hold every input row exactly once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleaningReport {
    pub dataset: String,
    pub accepted: Vec<CleanedRecord>,
    pub rejected: Vec<RejectedRow>,
    pub total: usize,
}

impl CleaningReport {
    /// `total` is the input row count, taken before any row is classified.
    fn from_outcomes(dataset: &str, total: usize, outcomes: impl IntoIterator<Item = RowOutcome>) -> Self {
        let mut report = CleaningReport {
            dataset: dataset.to_string(),
            total,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                RowOutcome::Cleaned(record) => report.accepted.push(record),
                RowOutcome::Rejected(row) => report.rejected.push(row),
            }
        }
        report
    }

    /// True when accepted and rejected rows together account for every input row.
    pub fn is_complete(&self) -> bool {
        self.accepted.len() + self.rejected.len() == self.total
    }

    pub fn rejected_by_reason(&self) -> BTreeMap<ReasonCode, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rejected {
            *counts.entry(row.reason).or_insert(0) += 1;
        }
        counts
    }
}

/// Runs every row through validation and normalization for one dataset.
///
/// Rows are independent, so the pipeline holds no mutable state and the
/// concurrent variant returns exactly what the sequential one does.
pub struct CleaningPipeline<'a> {
    catalog: &'a SchemaCatalog,
    validator: RecordValidator,
    normalizer: RecordNormalizer,
}

impl<'a> CleaningPipeline<'a> {
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self {
            catalog,
            validator: RecordValidator::new(),
            normalizer: RecordNormalizer::new(),
        }
    }

    /// Clean `records` against the schema registered for `dataset_id`.
    pub fn run(
        &self,
        records: Vec<RawRecord>,
        dataset_id: &str,
    ) -> std::result::Result<CleaningReport, SchemaError> {
        let schema = self.catalog.get_schema(dataset_id)?;
        let total = records.len();
        let outcomes = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| classify(&self.validator, &self.normalizer, index, record, schema));
        let report = CleaningReport::from_outcomes(dataset_id, total, outcomes);
        record_report(&report);
        Ok(report)
    }

    /// Same as [`run`](Self::run), with rows split across `workers` blocking tasks.
    /// Results are put back in input order before the report is built.
    pub async fn run_concurrent(
        &self,
        records: Vec<RawRecord>,
        dataset_id: &str,
        workers: usize,
    ) -> Result<CleaningReport> {
        let schema = Arc::new(self.catalog.get_schema(dataset_id)?.clone());
        let workers = workers.max(1);
        let total = records.len();
        let chunk_size = total.div_ceil(workers).max(1);

        let mut tasks = JoinSet::new();
        let mut rows = records.into_iter().enumerate().peekable();
        while rows.peek().is_some() {
            let chunk: Vec<(usize, RawRecord)> = rows.by_ref().take(chunk_size).collect();
            let schema = Arc::clone(&schema);
            let (validator, normalizer) = (self.validator, self.normalizer);
            tasks.spawn_blocking(move || {
                chunk
                    .into_iter()
                    .map(|(index, record)| {
                        (index, classify(&validator, &normalizer, index, record, &schema))
                    })
                    .collect::<Vec<_>>()
            });
        }

        let mut indexed = Vec::new();
        while let Some(chunk) = tasks.join_next().await {
            indexed.extend(chunk?);
        }
        indexed.sort_by_key(|(index, _)| *index);
        debug!(dataset = dataset_id, workers, rows = indexed.len(), "concurrent cleaning finished");

        let report = CleaningReport::from_outcomes(
            dataset_id,
            total,
            indexed.into_iter().map(|(_, outcome)| outcome),
        );
        record_report(&report);
        Ok(report)
    }
}

fn classify(
    validator: &RecordValidator,
    normalizer: &RecordNormalizer,
    index: usize,
    record: RawRecord,
    schema: &DatasetSchema,
) -> RowOutcome {
    match validator.validate(record, schema) {
        ValidationOutcome::Accepted(record) => match normalizer.normalize(&record, schema) {
            Ok(cleaned) => RowOutcome::Cleaned(cleaned),
            Err(rejection) => RowOutcome::Rejected(RejectedRow {
                index,
                record,
                reason: rejection.reason,
                column: rejection.column,
            }),
        },
        ValidationOutcome::Rejected {
            record,
            reason,
            column,
        } => RowOutcome::Rejected(RejectedRow {
            index,
            record,
            reason,
            column,
        }),
    }
}

fn record_report(report: &CleaningReport) {
    metrics::cleaning::batch_processed(&report.dataset, report.total);
    metrics::cleaning::rows_accepted(report.accepted.len());
    for (reason, count) in report.rejected_by_reason() {
        metrics::cleaning::rows_rejected(reason, count);
    }
    info!(
        dataset = %report.dataset,
        total = report.total,
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        "cleaning run complete"
    );
}
