use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use crate::constants::{
    DATASETS, LEAGUE_COLUMN, NAME_STRIP_CHARS, PLAYER_COLUMN, TEAM_COLUMN, YEAR_COLUMN,
};
use crate::error::SchemaError;
use crate::types::{ColumnType, League};

static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("valid regex"));
static UNDERSCORE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("valid regex"));
static FOUR_DIGIT_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));

static LEAGUE_CODES: Lazy<Vec<&'static str>> =
    Lazy::new(|| League::ALL.iter().map(|l| l.as_str()).collect());

static STANDARD_CATALOG: Lazy<SchemaCatalog> = Lazy::new(SchemaCatalog::standard);

/// Turn an arbitrary header or file stem into a store identifier:
/// non-alphanumerics become `_`, runs of `_` collapse, edges are stripped,
/// and the result is lower-cased (`Home Runs` -> `home_runs`).
pub fn clean_identifier(raw: &str) -> String {
    let replaced = NON_IDENT.replace_all(raw, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_lowercase()
}

/// Allowed values for an enumerated column.
#[derive(Debug, Clone)]
pub enum Domain {
    /// Trimmed, upper-cased value must be one of the listed codes.
    OneOf(Vec<&'static str>),
    /// Trimmed value must match the pattern.
    Pattern(Regex),
}

impl Domain {
    pub fn admits(&self, raw: &str) -> bool {
        let value = raw.trim();
        match self {
            Domain::OneOf(codes) => {
                let upper = value.to_ascii_uppercase();
                codes.iter().any(|c| *c == upper)
            }
            Domain::Pattern(re) => re.is_match(value),
        }
    }
}

/// Declaration of one column of a dataset.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Header as it appears in the raw file
    pub source: String,
    /// Column name in cleaned output and in the store
    pub name: String,
    pub column_type: ColumnType,
    pub required: bool,
    pub domain: Option<Domain>,
    /// Trim surrounding whitespace during normalization
    pub trim: bool,
    /// Characters removed from the value during normalization
    pub strip_chars: &'static [char],
    /// Participates in the zero/NaN filter
    pub metric: bool,
}

impl ColumnSpec {
    pub fn new(source: &str, column_type: ColumnType) -> Self {
        Self {
            source: source.to_string(),
            name: clean_identifier(source),
            column_type,
            required: false,
            domain: None,
            trim: false,
            strip_chars: &[],
            metric: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn stripping(mut self, chars: &'static [char]) -> Self {
        self.strip_chars = chars;
        self
    }

    pub fn metric(mut self) -> Self {
        self.metric = true;
        self
    }
}

/// Ordered column name -> store type mapping used to create or check a table.
pub type ColumnTypeMap = Vec<(String, ColumnType)>;

/// Static description of one dataset: its columns, their types and
/// normalization rules, and the table key.
#[derive(Debug, Clone)]
pub struct DatasetSchema {
    pub id: String,
    pub columns: Vec<ColumnSpec>,
    /// Store column names forming the table's primary key
    pub primary_key: Vec<String>,
}

impl DatasetSchema {
    pub fn new(id: &str, columns: Vec<ColumnSpec>, primary_key: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            columns,
            primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Schema shared by every leader-board file:
    /// `Year, League, Player, Team, <metric>`, keyed on `(player, year)`.
    pub fn leader_board(id: &str, metric_header: &str) -> Self {
        let columns = vec![
            ColumnSpec::new(YEAR_COLUMN, ColumnType::Integer)
                .required()
                .with_domain(Domain::Pattern(FOUR_DIGIT_YEAR.clone())),
            ColumnSpec::new(LEAGUE_COLUMN, ColumnType::Text)
                .required()
                .with_domain(Domain::OneOf(LEAGUE_CODES.clone()))
                .trimmed(),
            ColumnSpec::new(PLAYER_COLUMN, ColumnType::Text)
                .trimmed()
                .stripping(NAME_STRIP_CHARS),
            ColumnSpec::new(TEAM_COLUMN, ColumnType::Text)
                .trimmed()
                .stripping(NAME_STRIP_CHARS),
            ColumnSpec::new(metric_header, ColumnType::Float)
                .required()
                .metric(),
        ];
        Self::new(id, columns, &["player", "year"])
    }

    /// Source headers that must be present and non-null.
    pub fn required_columns(&self) -> BTreeSet<&str> {
        self.columns
            .iter()
            .filter(|c| c.required)
            .map(|c| c.source.as_str())
            .collect()
    }

    /// Every column with its store type, in declaration order.
    pub fn typed_columns(&self) -> ColumnTypeMap {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.column_type))
            .collect()
    }

    pub fn text_trim_columns(&self) -> BTreeSet<&str> {
        self.columns
            .iter()
            .filter(|c| c.trim)
            .map(|c| c.source.as_str())
            .collect()
    }

    pub fn metric_columns(&self) -> Vec<&ColumnSpec> {
        self.columns.iter().filter(|c| c.metric).collect()
    }

    /// Find a column by store name or source header.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.name == name || c.source == name)
    }
}

/// Registry of dataset schemas, populated once at startup.
pub struct SchemaCatalog {
    schemas: HashMap<String, DatasetSchema>,
}

impl SchemaCatalog {
    pub fn new(schemas: Vec<DatasetSchema>) -> Self {
        Self {
            schemas: schemas.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    /// Catalog of the leader-board datasets in `constants::DATASETS`
    pub fn standard() -> Self {
        Self::new(
            DATASETS
                .iter()
                .map(|(id, metric)| DatasetSchema::leader_board(id, metric))
                .collect(),
        )
    }

    /// Process-wide standard catalog.
    pub fn global() -> &'static SchemaCatalog {
        &STANDARD_CATALOG
    }

    pub fn get_schema(&self, dataset_id: &str) -> Result<&DatasetSchema, SchemaError> {
        self.schemas
            .get(dataset_id)
            .ok_or_else(|| SchemaError::UnknownDataset(dataset_id.to_string()))
    }

    /// Registered dataset identifiers, sorted.
    pub fn dataset_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.schemas.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}
