//! Read-only access to a database catalog.
//!
//! The [`Catalog`] trait is the only thing the inference engine and the query
//! pipeline know about storage. [`SqliteCatalog`] implements it on top of
//! `rusqlite`; tests substitute in-memory fakes.
//!
//! Implementations must run [`Catalog::execute_read_only`] in a session that
//! refuses writes on its own, independent of the guardrails that already
//! screened the statement.

mod sqlite;

use std::{fmt, time::Duration};

use compact_str::CompactString;
use serde::Serialize;
pub use sqlite::SqliteCatalog;
use thiserror::Error;

use crate::{
    config::GuardConfig,
    guard::{self, PreparedStatement},
    schema::{Column, ForeignKey, IntrospectionError}
};

/// Catalog metadata and read-only execution.
///
/// Must be `Send + Sync`: tables are introspected in parallel.
pub trait Catalog: Send + Sync {
    /// User tables, excluding internal/system tables.
    fn list_tables(&self) -> Result<Vec<CompactString>, IntrospectionError>;

    /// Columns of `table` in declaration order.
    fn columns(&self, table: &str) -> Result<Vec<Column>, IntrospectionError>;

    /// Foreign keys declared on `table`.
    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, IntrospectionError>;

    /// Run a query in a read-only session, giving up after `timeout`.
    fn execute_read_only(&self, sql: &str, timeout: Duration)
    -> Result<QueryResult, ExecutionError>;
}

/// Failure reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ExecutionError {
    /// Statement was interrupted at the deadline
    #[error("query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// Connection or statement error, including writes refused by the session
    #[error("{0}")]
    Failed(String)
}

/// Single result cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>)
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Real(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
            Self::Blob(v) => write!(f, "<{} bytes>", v.len())
        }
    }
}

/// Column names and rows returned by a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows:    Vec<Vec<Cell>>
}

/// Row count of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: CompactString,
    pub rows:  i64
}

/// Quote an identifier for interpolation into SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// First `limit` rows of a table.
///
/// The generated statement goes through the same guardrails as model output.
///
/// # Errors
///
/// Returns [`ExecutionError`] when the statement is rejected or fails.
pub fn preview_table(
    catalog: &dyn Catalog,
    table: &str,
    limit: u64,
    timeout: Duration
) -> Result<QueryResult, ExecutionError> {
    let sql = format!("SELECT * FROM {} LIMIT {};", quote_ident(table), limit);
    let prepared = guarded(&sql, limit)?;
    catalog.execute_read_only(&prepared.sql, timeout)
}

/// Row counts for every table in the catalog.
///
/// A table whose count fails is skipped with a warning.
///
/// # Errors
///
/// Returns [`IntrospectionError`] when the table list cannot be read.
pub fn row_counts(
    catalog: &dyn Catalog,
    timeout: Duration
) -> Result<Vec<TableCount>, IntrospectionError> {
    let mut counts = Vec::new();
    for table in catalog.list_tables()? {
        let sql = format!("SELECT COUNT(*) AS count FROM {};", quote_ident(&table));
        let result = guarded(&sql, 1).and_then(|p| catalog.execute_read_only(&p.sql, timeout));
        match result {
            Ok(result) => {
                let rows = match result.rows.first().and_then(|r| r.first()) {
                    Some(Cell::Integer(n)) => *n,
                    _ => 0
                };
                counts.push(TableCount {
                    table,
                    rows
                });
            }
            Err(err) => tracing::warn!(table = %table, error = %err, "row count failed")
        }
    }
    Ok(counts)
}

fn guarded(sql: &str, limit: u64) -> Result<PreparedStatement, ExecutionError> {
    let config = GuardConfig {
        default_limit: limit,
        strict:        false
    };
    guard::prepare(sql, &config).map_err(|e| ExecutionError::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("teams"), "\"teams\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Null.to_string(), "NULL");
        assert_eq!(Cell::Integer(3).to_string(), "3");
        assert_eq!(Cell::Text("x".into()).to_string(), "x");
        assert_eq!(Cell::Blob(vec![1, 2]).to_string(), "<2 bytes>");
    }

    #[test]
    fn test_timeout_display() {
        let err = ExecutionError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "query timed out after 250ms");
    }
}
