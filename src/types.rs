use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One input row as read from a delimited file.
///
/// Column order follows the source header. A `None` value marks a null cell.
/// Records are never mutated after they are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    columns: Vec<(String, Option<String>)>,
}

impl RawRecord {
    pub fn new(columns: Vec<(String, Option<String>)>) -> Self {
        Self { columns }
    }

    /// Build a record where every listed column carries a value.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        }
    }

    /// Look up a column by exact name, falling back to a loose match that
    /// ignores case, whitespace and underscores (`Home Runs` == `home_runs`).
    ///
    /// Returns `None` for both absent columns and null cells.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(|(_, v)| v.as_deref())
    }

    /// Whether the header of this record carries the column at all.
    pub fn has_column(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn find(&self, name: &str) -> Option<&(String, Option<String>)> {
        self.columns.iter().find(|(k, _)| k == name).or_else(|| {
            let wanted = header_key(name);
            self.columns.iter().find(|(k, _)| header_key(k) == wanted)
        })
    }
}

/// Comparison key for header names.
pub fn header_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Storage type of a typed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Map a declared SQLite column type back to a `ColumnType`.
    pub fn from_sql_type(declared: &str) -> Option<Self> {
        match declared.trim().to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" => Some(ColumnType::Integer),
            "REAL" | "FLOAT" | "DOUBLE" => Some(ColumnType::Float),
            "TEXT" => Some(ColumnType::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// The two major leagues a leader-board row can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum League {
    AL,
    NL,
}

impl League {
    pub const ALL: [League; 2] = [League::AL, League::NL];

    pub fn as_str(&self) -> &'static str {
        match self {
            League::AL => "AL",
            League::NL => "NL",
        }
    }
}

impl FromStr for League {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AL" => Ok(League::AL),
            "NL" => Ok(League::NL),
            other => Err(format!("'{}' is not a league code", other)),
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed cell, either in a cleaned record or in a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    /// `literal` is the source spelling of the number, when it came from text.
    Real { value: f64, literal: Option<String> },
    Text(String),
}

impl CellValue {
    pub fn real(value: f64) -> Self {
        CellValue::Real { value, literal: None }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the cell; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Real { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real {
                literal: Some(literal),
                ..
            } => f.write_str(literal),
            CellValue::Real { value, literal: None } => write!(f, "{}", value),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}
