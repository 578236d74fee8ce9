// Query layer: fixed catalog of parameterized queries and their executor

pub mod catalog;
pub mod executor;

pub use catalog::{ParameterSpec, QueryCatalog, QueryDefinition};
pub use executor::{QueryExecutor, QueryResult};
