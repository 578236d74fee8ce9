use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::pipeline::processing::coerce::is_coercible;
use crate::pipeline::processing::schema::DatasetSchema;
use crate::types::RawRecord;

/// Why a row was excluded from the cleaned dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReasonCode {
    /// A required column is absent, null or blank
    MissingRequiredColumn,
    /// An enumerated or patterned column holds a value outside its domain
    OutOfDomain,
    /// A typed column cannot be converted to its declared type
    TypeCoercionFailure,
    /// A metric converted cleanly but is zero, negative or not a number
    ZeroOrNullMetric,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingRequiredColumn => "MissingRequiredColumn",
            ReasonCode::OutOfDomain => "OutOfDomain",
            ReasonCode::TypeCoercionFailure => "TypeCoercionFailure",
            ReasonCode::ZeroOrNullMetric => "ZeroOrNullMetric",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one raw row.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted(RawRecord),
    Rejected {
        record: RawRecord,
        reason: ReasonCode,
        /// Source header of the column that failed
        column: String,
    },
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            ValidationOutcome::Accepted(_) => None,
            ValidationOutcome::Rejected { reason, .. } => Some(*reason),
        }
    }
}

/// Classifies raw rows against a dataset schema without converting values.
///
/// Rules run in a fixed order and the first failure decides the outcome:
/// presence, then domain, then coercibility.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, record: RawRecord, schema: &DatasetSchema) -> ValidationOutcome {
        match self.first_failure(&record, schema) {
            None => ValidationOutcome::Accepted(record),
            Some((reason, column)) => {
                trace!(dataset = %schema.id, %reason, %column, "row rejected by validator");
                ValidationOutcome::Rejected {
                    record,
                    reason,
                    column,
                }
            }
        }
    }

    fn first_failure(
        &self,
        record: &RawRecord,
        schema: &DatasetSchema,
    ) -> Option<(ReasonCode, String)> {
        // Presence
        for column in schema.columns.iter().filter(|c| c.required) {
            let present = record
                .get(&column.source)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false);
            if !present {
                return Some((ReasonCode::MissingRequiredColumn, column.source.clone()));
            }
        }

        // Domain
        for column in &schema.columns {
            if let (Some(domain), Some(value)) = (&column.domain, record.get(&column.source)) {
                if !domain.admits(value) {
                    return Some((ReasonCode::OutOfDomain, column.source.clone()));
                }
            }
        }

        // Coercibility; optional columns are only checked when they carry a value
        for column in &schema.columns {
            if let Some(value) = record.get(&column.source) {
                if value.trim().is_empty() && !column.required {
                    continue;
                }
                if !is_coercible(value, column.column_type) {
                    return Some((ReasonCode::TypeCoercionFailure, column.source.clone()));
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::schema::{ColumnSpec, DatasetSchema};
    use crate::types::ColumnType;

    fn batting_schema() -> DatasetSchema {
        DatasetSchema::leader_board("batting_average_stats", "AVG")
    }

    #[test]
    fn test_accepts_well_formed_row() {
        let record = RawRecord::from_pairs([
            ("Year", "2023"),
            ("League", "NL"),
            ("AVG", "0.350xyz"),
            ("Player", " Jones "),
            ("Team", "-Marlins-"),
        ]);
        let outcome = RecordValidator::new().validate(record.clone(), &batting_schema());
        assert_eq!(outcome, ValidationOutcome::Accepted(record));
    }

    #[test]
    fn test_missing_required_column() {
        let record = RawRecord::from_pairs([("Year", "2023"), ("AVG", "0.300")]);
        let outcome = RecordValidator::new().validate(record, &batting_schema());
        assert_eq!(outcome.reason(), Some(ReasonCode::MissingRequiredColumn));
    }

    #[test]
    fn test_blank_and_null_count_as_missing() {
        let validator = RecordValidator::new();
        let blank = RawRecord::from_pairs([("Year", "2023"), ("League", "  "), ("AVG", "0.300")]);
        assert_eq!(
            validator.validate(blank, &batting_schema()).reason(),
            Some(ReasonCode::MissingRequiredColumn)
        );

        let null = RawRecord::new(vec![
            ("Year".to_string(), Some("2023".to_string())),
            ("League".to_string(), Some("AL".to_string())),
            ("AVG".to_string(), None),
        ]);
        assert_eq!(
            validator.validate(null, &batting_schema()).reason(),
            Some(ReasonCode::MissingRequiredColumn)
        );
    }

    #[test]
    fn test_header_echo_row_is_out_of_domain() {
        let record = RawRecord::from_pairs([("Year", "Year"), ("League", "NL"), ("AVG", "0.300")]);
        let outcome = RecordValidator::new().validate(record, &batting_schema());
        match outcome {
            ValidationOutcome::Rejected { reason, column, .. } => {
                assert_eq!(reason, ReasonCode::OutOfDomain);
                assert_eq!(column, "Year");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_league_is_out_of_domain() {
        let record = RawRecord::from_pairs([("Year", "1901"), ("League", "FL"), ("AVG", ".422")]);
        let outcome = RecordValidator::new().validate(record, &batting_schema());
        assert_eq!(outcome.reason(), Some(ReasonCode::OutOfDomain));
    }

    #[test]
    fn test_presence_wins_over_domain() {
        // League is out of domain, but the metric is missing entirely
        let record = RawRecord::from_pairs([("Year", "1901"), ("League", "FL")]);
        let outcome = RecordValidator::new().validate(record, &batting_schema());
        assert_eq!(outcome.reason(), Some(ReasonCode::MissingRequiredColumn));
    }

    #[test]
    fn test_metric_without_digits_fails_coercion() {
        let record = RawRecord::from_pairs([("Year", "1901"), ("League", "AL"), ("AVG", "n/a")]);
        let outcome = RecordValidator::new().validate(record, &batting_schema());
        assert_eq!(outcome.reason(), Some(ReasonCode::TypeCoercionFailure));
    }

    #[test]
    fn test_zero_metric_passes_validation() {
        let record = RawRecord::from_pairs([("Year", "2023"), ("League", "AL"), ("AVG", "0")]);
        assert!(RecordValidator::new().validate(record, &batting_schema()).is_accepted());
    }

    #[test]
    fn test_integer_column_without_domain() {
        let schema = DatasetSchema::new(
            "games",
            vec![ColumnSpec::new("Games", ColumnType::Integer).required()],
            &[],
        );
        let record = RawRecord::from_pairs([("Games", "154 (tied)")]);
        let outcome = RecordValidator::new().validate(record, &schema);
        assert_eq!(outcome.reason(), Some(ReasonCode::TypeCoercionFailure));
    }
}
