//! SQLite catalog backed by `rusqlite`.
//!
//! Every call opens its own connection and drops it before returning, so no
//! handle outlives a request and error paths release the file like success
//! paths do. Query execution always sets `PRAGMA query_only`; when
//! [`DatabaseConfig::read_only`] is set the file itself is opened read-only.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError}
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant}
};

use compact_str::CompactString;
use rusqlite::{Connection, InterruptHandle, OpenFlags, OptionalExtension, types::ValueRef};

use super::{Catalog, Cell, ExecutionError, QueryResult};
use crate::{
    config::DatabaseConfig,
    schema::{Column, ForeignKey, IntrospectionError, IntrospectionStage}
};

/// Catalog over a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    config: DatabaseConfig
}

impl SqliteCatalog {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = if self.config.read_only {
            Connection::open_with_flags(
                &self.config.path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX
            )?
        } else {
            Connection::open(&self.config.path)?
        };
        if self.config.read_only {
            conn.pragma_update(None, "query_only", true)?;
        }
        Ok(conn)
    }

    fn introspect<T>(
        &self,
        table: Option<&str>,
        stage: IntrospectionStage,
        read: impl FnOnce(&Connection) -> rusqlite::Result<T>
    ) -> Result<T, IntrospectionError> {
        self.connect()
            .and_then(|conn| read(&conn))
            .map_err(|e| IntrospectionError::new(table, stage, e.to_string()))
    }
}

impl Catalog for SqliteCatalog {
    fn list_tables(&self) -> Result<Vec<CompactString>, IntrospectionError> {
        let prefix = self.config.system_table_prefix.as_str();
        self.introspect(None, IntrospectionStage::Tables, |conn| {
            let mut stmt =
                conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names
                .into_iter()
                .filter(|name| prefix.is_empty() || !name.starts_with(prefix))
                .map(CompactString::from)
                .collect())
        })
    }

    fn columns(&self, table: &str) -> Result<Vec<Column>, IntrospectionError> {
        self.introspect(Some(table), IntrospectionStage::Columns, |conn| {
            let mut stmt =
                conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
            let columns = stmt
                .query_map([table], |row| {
                    Ok(Column::new(
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(columns)
        })
    }

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, IntrospectionError> {
        self.introspect(Some(table), IntrospectionStage::ForeignKeys, |conn| {
            let mut stmt = conn.prepare(
                "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq"
            )?;
            let rows = stmt
                .query_map([table], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|(from, ref_table, to)| {
                    // A NULL target column means the parent's primary key.
                    let to = match to {
                        Some(to) => to,
                        None => primary_key(conn, &ref_table)?
                    };
                    Ok(ForeignKey::new(from, ref_table, to))
                })
                .collect()
        })
    }

    fn execute_read_only(
        &self,
        sql: &str,
        timeout: Duration
    ) -> Result<QueryResult, ExecutionError> {
        let started = Instant::now();
        let conn = self
            .connect()
            .map_err(|e| ExecutionError::Failed(e.to_string()))?;
        conn.pragma_update(None, "query_only", true)
            .map_err(|e| ExecutionError::Failed(e.to_string()))?;

        let watchdog = Watchdog::arm(conn.get_interrupt_handle(), timeout);
        let result = run_query(&conn, sql);
        let timed_out = watchdog.disarm();

        match result {
            Ok(result) => {
                tracing::info!(
                    rows = result.rows.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query completed"
                );
                Ok(result)
            }
            Err(_) if timed_out => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "query interrupted");
                Err(ExecutionError::Timeout(timeout))
            }
            Err(e) => Err(ExecutionError::Failed(e.to_string()))
        }
    }
}

fn primary_key(conn: &Connection, table: &str) -> rusqlite::Result<String> {
    let pk = conn
        .query_row(
            "SELECT name FROM pragma_table_info(?1) WHERE pk = 1",
            [table],
            |row| row.get::<_, String>(0)
        )
        .optional()?;
    Ok(pk.unwrap_or_else(|| String::from("rowid")))
}

fn run_query(conn: &Connection, sql: &str) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            cells.push(cell(row.get_ref(idx)?));
        }
        out.push(cells);
    }
    Ok(QueryResult {
        columns,
        rows: out
    })
}

fn cell(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(v) => Cell::Integer(v),
        ValueRef::Real(v) => Cell::Real(v),
        ValueRef::Text(v) => Cell::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Cell::Blob(v.to_vec())
    }
}

/// Interrupts a running statement once the deadline passes.
///
/// Dropping or disarming the watchdog stops the timer thread and joins it.
struct Watchdog {
    cancel: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    fired:  Arc<AtomicBool>
}

impl Watchdog {
    fn arm(handle: InterruptHandle, timeout: Duration) -> Self {
        let (cancel, wait) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let thread = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = wait.recv_timeout(timeout) {
                flag.store(true, Ordering::SeqCst);
                handle.interrupt();
            }
        });
        Self {
            cancel: Some(cancel),
            thread: Some(thread),
            fired
        }
    }

    /// Stop the timer; returns whether it fired.
    fn disarm(mut self) -> bool {
        self.stop();
        self.fired.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        drop(self.cancel.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
