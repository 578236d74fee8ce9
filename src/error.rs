use thiserror::Error;

/// Failures resolving or matching a dataset schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Schema mismatch for table '{table}': expected [{expected}], found [{found}]")]
    SchemaMismatch {
        table: String,
        expected: String,
        found: String,
    },
}

/// Failures importing a cleaned dataset into the relational store.
///
/// Individual rows rejected by the store are not errors; they are counted in
/// `ImportResult::rows_failed`.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Failed to create table '{table}': {source}")]
    CreateFailed {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),
}

/// Failures resolving, binding or executing a catalog query.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Invalid parameter '{name}': {reason}")]
    ParameterError { name: String, reason: String },

    #[error("Query execution failed: {0}")]
    QueryExecutionError(#[from] rusqlite::Error),
}

impl QueryError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::UnknownQuery(_) => "unknown_query",
            QueryError::ParameterError { .. } => "parameter_error",
            QueryError::QueryExecutionError(_) => "execution_error",
        }
    }
}

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StatsError>;
