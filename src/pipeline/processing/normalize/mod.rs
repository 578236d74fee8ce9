use serde::Serialize;
use std::fmt;

use crate::pipeline::processing::coerce::{coerce_float, extract_numeric};
use crate::pipeline::processing::schema::{ColumnSpec, DatasetSchema, Domain};
use crate::pipeline::processing::validate::ReasonCode;
use crate::types::{CellValue, ColumnType, League, RawRecord};

/// A fully typed row ready for output and import.
///
/// Values follow the schema's column order and are keyed by store column name.
/// Only `RecordNormalizer` builds these, so every metric is finite and positive
/// and every trimmed text column is free of surrounding whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    values: Vec<(String, CellValue)>,
}

impl CleanedRecord {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.values.iter().map(|(_, v)| v)
    }

    pub fn year(&self) -> Option<i64> {
        self.get("year").and_then(CellValue::as_i64)
    }

    pub fn league(&self) -> Option<League> {
        self.get("league")
            .and_then(CellValue::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Rebuild a record from already-typed values, e.g. when re-reading a
    /// cleaned file for import.
    pub(crate) fn from_values(values: Vec<(String, CellValue)>) -> Self {
        Self { values }
    }
}

/// A row the normalizer refused, with the column that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub reason: ReasonCode,
    pub column: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.column)
    }
}

/// Converts validated rows into `CleanedRecord`s.
///
/// Conversion happens first, then cosmetic text cleanup, then the zero/NaN
/// filter on metric columns. A coercible `"0"` therefore still gets rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordNormalizer;

impl RecordNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(
        &self,
        record: &RawRecord,
        schema: &DatasetSchema,
    ) -> Result<CleanedRecord, Rejection> {
        let mut values = Vec::with_capacity(schema.columns.len());
        for column in &schema.columns {
            let value = self.convert(record.get(&column.source), column)?;
            values.push((column.name.clone(), value));
        }

        for column in schema.metric_columns() {
            let usable = values
                .iter()
                .find(|(name, _)| *name == column.name)
                .and_then(|(_, v)| v.as_f64())
                .map(|v| v.is_finite() && v > 0.0)
                .unwrap_or(false);
            if !usable {
                return Err(Rejection {
                    reason: ReasonCode::ZeroOrNullMetric,
                    column: column.source.clone(),
                });
            }
        }

        Ok(CleanedRecord { values })
    }

    fn convert(&self, raw: Option<&str>, column: &ColumnSpec) -> Result<CellValue, Rejection> {
        let raw = match raw {
            Some(v) if !v.trim().is_empty() => v,
            _ if column.required => {
                return Err(Rejection {
                    reason: ReasonCode::MissingRequiredColumn,
                    column: column.source.clone(),
                })
            }
            _ => return Ok(CellValue::Null),
        };

        let coercion_failure = || Rejection {
            reason: ReasonCode::TypeCoercionFailure,
            column: column.source.clone(),
        };

        match column.column_type {
            ColumnType::Integer => {
                let token = extract_numeric(raw).ok_or_else(coercion_failure)?;
                let (whole, fraction) = token.split_once('.').unwrap_or((token, ""));
                if !fraction.bytes().all(|b| b == b'0') {
                    return Err(coercion_failure());
                }
                whole
                    .parse::<i64>()
                    .map(CellValue::Integer)
                    .map_err(|_| coercion_failure())
            }
            ColumnType::Float => {
                let (value, literal) = coerce_float(raw).ok_or_else(coercion_failure)?;
                Ok(CellValue::Real {
                    value,
                    literal: Some(literal),
                })
            }
            ColumnType::Text => Ok(CellValue::Text(clean_text(raw, column))),
        }
    }
}

fn clean_text(raw: &str, column: &ColumnSpec) -> String {
    let mut text: String = raw
        .chars()
        .filter(|c| !column.strip_chars.contains(c))
        .collect();
    if column.trim {
        text = text.trim().to_string();
    }
    if let Some(Domain::OneOf(_)) = column.domain {
        text = text.to_ascii_uppercase();
    }
    text
}
