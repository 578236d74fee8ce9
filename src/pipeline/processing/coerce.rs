use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ColumnType;

/// First run of digits with at most one decimal point (`0.350xyz` -> `0.350`, `.5` -> `.5`).
static NUMERIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d*)?|\.\d+").expect("valid regex"));

/// Extract the numeric token of a raw cell, discarding any surrounding text.
pub fn extract_numeric(raw: &str) -> Option<&str> {
    NUMERIC_TOKEN.find(raw).map(|m| m.as_str())
}

/// Integer coercion: the trimmed cell must be all ASCII digits and fit in an `i64`.
pub fn coerce_integer(raw: &str) -> Option<i64> {
    let value = raw.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Float coercion via the numeric token. Returns the value and the token's
/// digits as written, so output is not limited to what an `f64` can hold.
pub fn coerce_float(raw: &str) -> Option<(f64, String)> {
    let token = extract_numeric(raw)?;
    let value: f64 = token.parse().ok()?;
    Some((value, decimal_literal(token)))
}

/// Canonical spelling of a numeric token: redundant leading zeros and a bare
/// trailing point are dropped (`.350` -> `0.350`, `060.` -> `60`).
pub fn decimal_literal(token: &str) -> String {
    let (whole, fraction) = token.split_once('.').unwrap_or((token, ""));
    let whole = match whole.trim_start_matches('0') {
        "" => "0",
        digits => digits,
    };
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Whether a raw cell can be converted to `column_type`. Text always can.
pub fn is_coercible(raw: &str, column_type: ColumnType) -> bool {
    match column_type {
        ColumnType::Integer => coerce_integer(raw).is_some(),
        ColumnType::Float => coerce_float(raw).is_some(),
        ColumnType::Text => true,
    }
}
