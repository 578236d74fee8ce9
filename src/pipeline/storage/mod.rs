//! Relational store boundary: connection handles and the table importer.

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ImportError, SchemaError};
use crate::observability::metrics;
use crate::pipeline::processing::normalize::CleanedRecord;
use crate::pipeline::processing::schema::{ColumnTypeMap, DatasetSchema};
use crate::types::{CellValue, ColumnType};

/// Location of the SQLite database. Connections are opened per operation
/// and closed when the returned handle is dropped.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Store {
    pub fn new<P: Into<PathBuf>>(path: P, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a scoped connection, creating the database directory if needed.
    pub fn connect(&self) -> crate::error::Result<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        debug!(path = %self.path.display(), "opened store connection");
        Ok(conn)
    }
}

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Drop and recreate the table inside the import transaction
    CreateOrReplace,
    /// Keep existing rows; the table's columns must match the schema
    AppendExisting,
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "create_or_replace" | "replace" => Ok(ImportMode::CreateOrReplace),
            "append_existing" | "append" => Ok(ImportMode::AppendExisting),
            other => Err(format!("unknown import mode '{}'", other)),
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportMode::CreateOrReplace => "create_or_replace",
            ImportMode::AppendExisting => "append_existing",
        })
    }
}

/// Table layout derived from a dataset schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub columns: ColumnTypeMap,
    pub primary_key: Vec<String>,
}

impl TableSpec {
    pub fn for_schema(schema: &DatasetSchema) -> Self {
        Self {
            name: schema.id.clone(),
            columns: schema.typed_columns(),
            primary_key: schema.primary_key.clone(),
        }
    }

    fn create_sql(&self) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| {
                let not_null = if self.primary_key.contains(name) { " NOT NULL" } else { "" };
                format!("{} {}{}", quote_ident(name), ty.sql_type(), not_null)
            })
            .collect();
        if !self.primary_key.is_empty() {
            let key: Vec<String> = self.primary_key.iter().map(|c| quote_ident(c)).collect();
            defs.push(format!("PRIMARY KEY ({})", key.join(", ")));
        }
        format!("CREATE TABLE {} ({}) STRICT", quote_ident(&self.name), defs.join(", "))
    }

    fn insert_sql(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|(n, _)| quote_ident(n)).collect();
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.name),
            names.join(", "),
            placeholders.join(", ")
        )
    }
}

/// A row the store refused during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// Position in the imported sequence
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub table: String,
    pub mode: ImportMode,
    pub rows_imported: usize,
    pub rows_failed: usize,
    pub failures: Vec<RowFailure>,
}

/// Loads cleaned records into one table per dataset.
///
/// Table creation or replacement and all row inserts run in a single
/// `IMMEDIATE` transaction: readers see either the prior table or the new
/// one, and concurrent writers to the same database wait on the write lock.
/// Rows rejected by the store's own constraints are counted and skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableImporter;

impl TableImporter {
    pub fn new() -> Self {
        Self
    }

    pub fn import(
        &self,
        conn: &mut Connection,
        table: &TableSpec,
        records: &[CleanedRecord],
        mode: ImportMode,
    ) -> Result<ImportResult, ImportError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = table_exists(&tx, &table.name)?;

        match (mode, exists) {
            (ImportMode::CreateOrReplace, true) => {
                info!(table = %table.name, "replacing existing table");
                tx.execute_batch(&format!("DROP TABLE {}", quote_ident(&table.name)))?;
                create_table(&tx, table)?;
            }
            (ImportMode::AppendExisting, true) => assert_columns_match(&tx, table)?,
            (_, false) => create_table(&tx, table)?,
        }

        let mut result = ImportResult {
            table: table.name.clone(),
            mode,
            rows_imported: 0,
            rows_failed: 0,
            failures: Vec::new(),
        };

        {
            let mut stmt = tx.prepare(&table.insert_sql())?;
            for (index, record) in records.iter().enumerate() {
                let row = table
                    .columns
                    .iter()
                    .map(|(name, _)| record.get(name).unwrap_or(&CellValue::Null));
                match stmt.execute(params_from_iter(row)) {
                    Ok(_) => result.rows_imported += 1,
                    Err(e) => {
                        debug!(table = %table.name, index, error = %e, "row rejected by store");
                        result.rows_failed += 1;
                        result.failures.push(RowFailure {
                            index,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        tx.commit()?;

        if result.rows_failed > 0 {
            warn!(
                table = %table.name,
                failed = result.rows_failed,
                imported = result.rows_imported,
                "some rows were rejected by the store"
            );
        }
        info!(table = %table.name, %mode, imported = result.rows_imported, "import committed");
        metrics::import::table_written(&table.name, result.rows_imported, result.rows_failed);
        Ok(result)
    }
}

/// A table in the store with its DDL and key columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescription {
    pub name: String,
    pub create_sql: String,
    pub primary_key: Vec<String>,
}

/// List user tables with their `CREATE` statements and primary-key columns.
pub fn describe_tables(conn: &Connection) -> rusqlite::Result<Vec<TableDescription>> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut described = Vec::with_capacity(tables.len());
    for (name, create_sql) in tables {
        let mut key: Vec<(i64, String)> = table_info(conn, &name)?
            .into_iter()
            .filter(|c| c.pk > 0)
            .map(|c| (c.pk, c.name))
            .collect();
        key.sort();
        described.push(TableDescription {
            name,
            create_sql,
            primary_key: key.into_iter().map(|(_, n)| n).collect(),
        });
    }
    Ok(described)
}

pub fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Double-quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table(tx: &Transaction<'_>, table: &TableSpec) -> Result<(), ImportError> {
    tx.execute_batch(&table.create_sql())
        .map_err(|source| ImportError::CreateFailed {
            table: table.name.clone(),
            source,
        })?;
    debug!(table = %table.name, "table created");
    Ok(())
}

struct ColumnInfo {
    name: String,
    declared_type: String,
    pk: i64,
}

fn table_info(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                declared_type: row.get(2)?,
                pk: row.get(5)?,
            })
        })?
        .collect();
    columns
}

fn assert_columns_match(conn: &Connection, table: &TableSpec) -> Result<(), ImportError> {
    let found: Vec<(String, Option<ColumnType>)> = table_info(conn, &table.name)?
        .into_iter()
        .map(|c| {
            let ty = ColumnType::from_sql_type(&c.declared_type);
            (c.name, ty)
        })
        .collect();
    let expected: Vec<(String, Option<ColumnType>)> = table
        .columns
        .iter()
        .map(|(n, t)| (n.clone(), Some(*t)))
        .collect();

    if found != expected {
        return Err(SchemaError::SchemaMismatch {
            table: table.name.clone(),
            expected: describe_columns(&expected),
            found: describe_columns(&found),
        }
        .into());
    }
    Ok(())
}

fn describe_columns(columns: &[(String, Option<ColumnType>)]) -> String {
    columns
        .iter()
        .map(|(name, ty)| match ty {
            Some(ty) => format!("{} {}", name, ty),
            None => format!("{} ?", name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            CellValue::Real { value, .. } => ToSqlOutput::Owned(Value::Real(*value)),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for CellValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(f) => CellValue::real(f),
            ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => CellValue::Text(hex::encode(bytes)),
        }
    }
}
