use async_trait::async_trait;
use std::path::PathBuf;

use crate::app::clean_use_case::CleaningSummary;
use crate::pipeline::cleaning::RejectedRow;
use crate::pipeline::processing::normalize::CleanedRecord;
use crate::pipeline::processing::schema::DatasetSchema;
use crate::types::RawRecord;

/// Raw rows of one dataset file, with the facts needed for its summary.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source_name: String,
    /// Hex SHA-256 of the file bytes as read
    pub sha256: String,
    pub records: Vec<RawRecord>,
}

/// One line of the combined removed-rows log.
#[derive(Debug, Clone)]
pub struct RejectionLogEntry {
    pub source_file: String,
    pub row: RejectedRow,
}

/// A cleaned file waiting to be imported, and the table it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedFile {
    pub path: PathBuf,
    pub table_name: String,
}

// Cleaning-side ports
#[async_trait]
pub trait RecordSourcePort: Send + Sync {
    /// `None` when the dataset has no input file.
    async fn read_dataset(&self, dataset_id: &str) -> anyhow::Result<Option<SourceBatch>>;
}

#[async_trait]
pub trait CleaningOutputPort: Send + Sync {
    async fn write_cleaned(
        &self,
        schema: &DatasetSchema,
        records: &[CleanedRecord],
    ) -> anyhow::Result<PathBuf>;

    async fn write_rejection_log(&self, entries: &[RejectionLogEntry]) -> anyhow::Result<PathBuf>;

    async fn write_summaries(&self, summaries: &[CleaningSummary]) -> anyhow::Result<PathBuf>;
}

// Import-side ports
#[async_trait]
pub trait CleanedSourcePort: Send + Sync {
    async fn list_cleaned(&self) -> anyhow::Result<Vec<CleanedFile>>;

    async fn read_cleaned(
        &self,
        file: &CleanedFile,
        schema: &DatasetSchema,
    ) -> anyhow::Result<Vec<CleanedRecord>>;
}
