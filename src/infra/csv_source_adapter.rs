use anyhow::{anyhow, Context};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::{CleanedFile, CleanedSourcePort, RecordSourcePort, SourceBatch};
use crate::constants::{raw_file_name, CLEANED_SUFFIX, CSV_EXTENSION};
use crate::pipeline::processing::normalize::CleanedRecord;
use crate::pipeline::processing::schema::{clean_identifier, DatasetSchema};
use crate::types::{CellValue, ColumnType, RawRecord};

/// Reads raw `<dataset>.csv` files from a directory.
///
/// The first line is the header. Empty cells become null, short rows are
/// padded with nulls so every record carries the full header, and cells past
/// the header width are kept under positional `column_<n>` names.
pub struct CsvRecordSourceAdapter {
    input_dir: PathBuf,
}

impl CsvRecordSourceAdapter {
    pub fn new<P: Into<PathBuf>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }
}

#[async_trait::async_trait]
impl RecordSourcePort for CsvRecordSourceAdapter {
    async fn read_dataset(&self, dataset_id: &str) -> anyhow::Result<Option<SourceBatch>> {
        let source_name = raw_file_name(dataset_id);
        let path = self.input_dir.join(&source_name);
        if !path.is_file() {
            return Ok(None);
        }

        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let records = parse_raw_csv(&bytes).with_context(|| format!("parsing {}", path.display()))?;
        info!(dataset = dataset_id, rows = records.len(), "read input file");

        Ok(Some(SourceBatch {
            source_name,
            sha256,
            records,
        }))
    }
}

/// Parse delimited bytes into raw records keyed by the header row.
/// Extra cells are named by their 1-based position (`column_6`).
pub fn parse_raw_csv(bytes: &[u8]) -> anyhow::Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let cell = |i: usize| row.get(i).filter(|v| !v.is_empty()).map(str::to_string);
        let mut columns: Vec<(String, Option<String>)> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), cell(i)))
            .collect();
        columns.extend((headers.len()..row.len()).map(|i| (format!("column_{}", i + 1), cell(i))));
        records.push(RawRecord::new(columns));
    }
    Ok(records)
}

/// Finds `*_cleaned.csv` files in a directory and reads them back as typed rows.
pub struct CleanedCsvSourceAdapter {
    dir: PathBuf,
}

impl CleanedCsvSourceAdapter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

/// Table name for a cleaned file: the stem minus the cleaned suffix, as an identifier.
pub fn table_name_for(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let base = stem.strip_suffix(CLEANED_SUFFIX)?;
    Some(clean_identifier(base))
}

#[async_trait::async_trait]
impl CleanedSourcePort for CleanedCsvSourceAdapter {
    async fn list_cleaned(&self) -> anyhow::Result<Vec<CleanedFile>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("listing {}", self.dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(CSV_EXTENSION) {
                continue;
            }
            if let Some(table_name) = table_name_for(&path) {
                files.push(CleanedFile { path, table_name });
            }
        }
        files.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        debug!(dir = %self.dir.display(), count = files.len(), "found cleaned files");
        Ok(files)
    }

    async fn read_cleaned(
        &self,
        file: &CleanedFile,
        schema: &DatasetSchema,
    ) -> anyhow::Result<Vec<CleanedRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&file.path)
            .with_context(|| format!("opening {}", file.path.display()))?;

        let headers = reader.headers()?.clone();
        let layout = schema
            .typed_columns()
            .into_iter()
            .map(|(name, ty)| {
                let index = headers
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| anyhow!("{} has no '{}' column", file.path.display(), name))?;
                Ok::<_, anyhow::Error>((name, ty, index))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let values = layout
                .iter()
                .map(|(name, ty, index)| (name.clone(), parse_cleaned_cell(row.get(*index), *ty)))
                .collect();
            records.push(CleanedRecord::from_values(values));
        }
        Ok(records)
    }
}

/// Typed value of a cell in a cleaned file. A cell that does not parse as
/// its declared type is kept as text so the store's type check decides.
fn parse_cleaned_cell(raw: Option<&str>, column_type: ColumnType) -> CellValue {
    let Some(raw) = raw.filter(|v| !v.is_empty()) else {
        return CellValue::Null;
    };
    match column_type {
        ColumnType::Integer => raw
            .parse::<i64>()
            .map(CellValue::Integer)
            .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
        ColumnType::Float => match raw.parse::<f64>() {
            Ok(value) => CellValue::Real {
                value,
                literal: Some(raw.to_string()),
            },
            Err(_) => CellValue::Text(raw.to_string()),
        },
        ColumnType::Text => CellValue::Text(raw.to_string()),
    }
}
