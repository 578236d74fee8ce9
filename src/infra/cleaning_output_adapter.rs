use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

use crate::app::clean_use_case::CleaningSummary;
use crate::app::ports::{CleaningOutputPort, RejectionLogEntry};
use crate::constants::{cleaned_file_name, CLEANING_SUMMARY_FILE, REASON_COLUMN, REMOVED_ROWS_LOG, SOURCE_FILE_COLUMN};
use crate::pipeline::processing::normalize::CleanedRecord;
use crate::pipeline::processing::schema::DatasetSchema;

/// File-based implementation of CleaningOutputPort.
/// Cleaned rows go to `<dataset>_cleaned.csv`, removed rows to one
/// tab-separated log, and run summaries to a JSON array.
pub struct CsvCleaningOutputAdapter {
    output_dir: PathBuf,
}

impl CsvCleaningOutputAdapter {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> anyhow::Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;
        Ok(Self { output_dir })
    }
}

#[async_trait::async_trait]
impl CleaningOutputPort for CsvCleaningOutputAdapter {
    async fn write_cleaned(
        &self,
        schema: &DatasetSchema,
        records: &[CleanedRecord],
    ) -> anyhow::Result<PathBuf> {
        let path = self.output_dir.join(cleaned_file_name(&schema.id));
        info!("Creating cleaned output file: {}", path.display());

        let columns: Vec<String> = schema.typed_columns().into_iter().map(|(name, _)| name).collect();
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(&columns)?;
        for record in records {
            writer.write_record(columns.iter().map(|c| {
                record.get(c).map(|v| v.to_string()).unwrap_or_default()
            }))?;
        }
        writer.flush()?;
        Ok(path)
    }

    async fn write_rejection_log(&self, entries: &[RejectionLogEntry]) -> anyhow::Result<PathBuf> {
        let path = self.output_dir.join(REMOVED_ROWS_LOG);
        info!("Creating removed rows log: {}", path.display());

        // Union of raw headers in first-seen order
        let mut columns: Vec<&str> = Vec::new();
        for entry in entries {
            for (name, _) in entry.row.record.columns() {
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }
        }

        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(&path)?;
        writer.write_record(columns.iter().copied().chain([SOURCE_FILE_COLUMN, REASON_COLUMN]))?;
        for entry in entries {
            let mut line: Vec<&str> = columns
                .iter()
                .map(|c| {
                    entry
                        .row
                        .record
                        .columns()
                        .find(|(name, _)| name == c)
                        .and_then(|(_, v)| v)
                        .unwrap_or("")
                })
                .collect();
            line.push(&entry.source_file);
            line.push(entry.row.reason.as_str());
            writer.write_record(&line)?;
        }
        writer.flush()?;
        Ok(path)
    }

    async fn write_summaries(&self, summaries: &[CleaningSummary]) -> anyhow::Result<PathBuf> {
        let path = self.output_dir.join(CLEANING_SUMMARY_FILE);
        info!("Creating cleaning summary file: {}", path.display());

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, summaries)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(path)
    }
}
