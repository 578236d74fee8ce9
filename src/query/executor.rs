use rusqlite::types::ToSql;
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::QueryError;
use crate::observability::metrics;
use crate::pipeline::storage::quote_ident;
use crate::query::catalog::{QueryCatalog, QueryDefinition};
use crate::types::{CellValue, ColumnType};

/// Rows returned by one query execution, with their column names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Binds caller-supplied parameters to catalog queries and runs them.
///
/// Parameters are checked against their declared types before the store is
/// touched, and are always bound by name. Nothing the caller supplies is
/// ever spliced into SQL text.
pub struct QueryExecutor<'a> {
    catalog: &'a QueryCatalog,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(catalog: &'a QueryCatalog) -> Self {
        Self { catalog }
    }

    /// Look up `id` in the catalog and execute it. Only catalog ids are
    /// accepted here; listing positions are a CLI concern.
    pub fn execute_by_id(
        &self,
        conn: &Connection,
        id: &str,
        supplied: &HashMap<String, String>,
    ) -> Result<QueryResult, QueryError> {
        let definition = self.catalog.get(id).inspect_err(|e| metrics::query::failed(e.kind()))?;
        self.execute(conn, definition, supplied)
    }

    pub fn execute(
        &self,
        conn: &Connection,
        definition: &QueryDefinition,
        supplied: &HashMap<String, String>,
    ) -> Result<QueryResult, QueryError> {
        let outcome = bind_parameters(definition, supplied).and_then(|bound| {
            let named: Vec<(&str, &dyn ToSql)> = bound
                .iter()
                .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
                .collect();
            run_statement(conn, &definition.sql_template, named.as_slice())
        });

        match outcome {
            Ok(result) => {
                info!(query = %definition.id, rows = result.row_count(), "query executed");
                metrics::query::executed(&definition.id, result.row_count());
                Ok(result)
            }
            Err(e) => {
                warn!(query = %definition.id, error = %e, "query failed");
                metrics::query::failed(e.kind());
                Err(e)
            }
        }
    }

    /// Every row of a table. The name is only ever used as a quoted
    /// identifier, so a missing table fails in the store as an execution error.
    pub fn select_all(&self, conn: &Connection, table: &str) -> Result<QueryResult, QueryError> {
        let sql = format!("SELECT * FROM {}", quote_ident(table));
        run_statement(conn, &sql, &[] as &[(&str, &dyn ToSql)]).inspect_err(|e| {
            warn!(table, error = %e, "select all failed");
            metrics::query::failed(e.kind());
        })
    }
}

/// Check every declared parameter is supplied and coercible; returns the
/// typed values keyed by placeholder (`:name`).
pub fn bind_parameters(
    definition: &QueryDefinition,
    supplied: &HashMap<String, String>,
) -> Result<Vec<(String, CellValue)>, QueryError> {
    if let Some(extra) = supplied
        .keys()
        .find(|k| !definition.parameters.iter().any(|p| &p.name == *k))
    {
        return Err(QueryError::ParameterError {
            name: extra.clone(),
            reason: format!("not a parameter of query '{}'", definition.id),
        });
    }

    let mut bound = Vec::with_capacity(definition.parameters.len());
    for spec in &definition.parameters {
        let raw = supplied
            .get(&spec.name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| QueryError::ParameterError {
                name: spec.name.clone(),
                reason: "no value supplied".to_string(),
            })?;

        let value = match spec.param_type {
            ColumnType::Integer => raw.parse::<i64>().map(CellValue::Integer).map_err(|_| {
                QueryError::ParameterError {
                    name: spec.name.clone(),
                    reason: format!("'{}' is not an integer", raw),
                }
            })?,
            ColumnType::Float => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => CellValue::real(v),
                _ => {
                    return Err(QueryError::ParameterError {
                        name: spec.name.clone(),
                        reason: format!("'{}' is not a number", raw),
                    })
                }
            },
            ColumnType::Text => CellValue::Text(raw.to_string()),
        };
        bound.push((spec.placeholder(), value));
    }
    debug!(query = %definition.id, parameters = bound.len(), "parameters bound");
    Ok(bound)
}

fn run_statement(
    conn: &Connection,
    sql: &str,
    params: &[(&str, &dyn ToSql)],
) -> Result<QueryResult, QueryError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query(params)?;
    while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(CellValue::from(row.get_ref(i)?));
        }
        rows.push(cells);
    }
    Ok(QueryResult { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE home_runs_stats (year INTEGER, league TEXT, player TEXT, team TEXT, home_runs REAL);
             INSERT INTO home_runs_stats VALUES
                (1927, 'AL', 'Babe Ruth', 'New York', 60.0),
                (1928, 'AL', 'Babe Ruth', 'New York', 54.0),
                (1961, 'AL', 'Roger Maris', 'New York', 61.0);",
        )
        .unwrap();
        conn
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parameterized_query() {
        let conn = store();
        let catalog = QueryCatalog::standard();
        let result = QueryExecutor::new(&catalog)
            .execute_by_id(&conn, "player_home_runs_by_year", &params(&[("player", "Babe Ruth")]))
            .unwrap();

        assert_eq!(result.columns, vec!["year", "home_runs"]);
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows[0][0], CellValue::Integer(1927));
        assert_eq!(result.rows[0][1].as_f64(), Some(60.0));
    }

    #[test]
    fn test_injection_attempt_is_bound_as_a_value() {
        let conn = store();
        let catalog = QueryCatalog::standard();
        let result = QueryExecutor::new(&catalog)
            .execute_by_id(
                &conn,
                "player_home_runs_by_year",
                &params(&[("player", "x' OR '1'='1")]),
            )
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let conn = store();
        let catalog = QueryCatalog::standard();
        let result = QueryExecutor::new(&catalog)
            .execute_by_id(&conn, "player_home_runs_by_year", &params(&[("player", "Nobody")]))
            .unwrap();
        assert_eq!(result.columns.len(), 2);
        assert!(result.is_empty());
    }

    #[test]
    fn test_non_numeric_year_fails_before_store_access() {
        // No tables at all: reaching the store would be an execution error instead
        let conn = Connection::open_in_memory().unwrap();
        let catalog = QueryCatalog::standard();
        let err = QueryExecutor::new(&catalog)
            .execute_by_id(&conn, "top_teams_by_wins_in_year", &params(&[("year", "nineteen")]))
            .unwrap_err();
        assert!(matches!(err, QueryError::ParameterError { ref name, .. } if name == "year"));
    }

    #[test]
    fn test_missing_and_unexpected_parameters() {
        let conn = store();
        let catalog = QueryCatalog::standard();
        let executor = QueryExecutor::new(&catalog);

        let missing = executor
            .execute_by_id(&conn, "player_home_runs_by_year", &params(&[("player", "  ")]))
            .unwrap_err();
        assert!(matches!(missing, QueryError::ParameterError { ref name, .. } if name == "player"));

        let extra = executor
            .execute_by_id(&conn, "home_runs_per_year", &params(&[("year", "1927")]))
            .unwrap_err();
        assert!(matches!(extra, QueryError::ParameterError { ref name, .. } if name == "year"));
    }

    #[test]
    fn test_unknown_query() {
        let conn = store();
        let catalog = QueryCatalog::standard();
        let err = QueryExecutor::new(&catalog)
            .execute_by_id(&conn, "most_bunts", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownQuery(ref id) if id == "most_bunts"));
    }

    #[test]
    fn test_missing_table_surfaces_execution_error() {
        let conn = store();
        let catalog = QueryCatalog::standard();
        let err = QueryExecutor::new(&catalog)
            .execute_by_id(&conn, "top_teams_by_stolen_bases", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, QueryError::QueryExecutionError(_)));
        assert!(err.to_string().contains("stolen_bases_stats"));
    }

    #[test]
    fn test_listing_position_is_not_a_query_id() {
        let conn = store();
        let catalog = QueryCatalog::standard();
        let err = QueryExecutor::new(&catalog)
            .execute_by_id(&conn, "6", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownQuery(ref id) if id == "6"));
    }

    #[test]
    fn test_select_all_missing_table_is_execution_error() {
        let conn = store();
        let catalog = QueryCatalog::standard();
        let executor = QueryExecutor::new(&catalog);
        assert_eq!(executor.select_all(&conn, "home_runs_stats").unwrap().row_count(), 3);

        let err = executor.select_all(&conn, "wins_stats").unwrap_err();
        assert!(matches!(err, QueryError::QueryExecutionError(_)));
        assert!(err.to_string().contains("no such table"));

        let err = executor
            .select_all(&conn, "home_runs_stats; DROP TABLE home_runs_stats")
            .unwrap_err();
        assert!(matches!(err, QueryError::QueryExecutionError(_)));
        assert_eq!(executor.select_all(&conn, "home_runs_stats").unwrap().row_count(), 3);
    }
}
