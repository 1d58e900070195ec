// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Store: a single SQLite file behind a small checkout/checkin
//! connection pool.
//!
//! Every public API acquires a connection from the pool and returns it on
//! drop; nothing holds a connection across an await point. WAL journaling
//! gives readers snapshot isolation while the single writer proceeds.

use crate::schema::SCHEMA;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Busy timeout applied to every connection.
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on idle pooled connections.
const MAX_IDLE_CONNS: usize = 4;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("illegal status transition for task {task_id}: {from} -> {to}")]
    IllegalTransition {
        task_id: String,
        from: String,
        to: String,
    },
    #[error("decision record {0} failed integrity check")]
    Integrity(String),
}

impl StoreError {
    /// True when the underlying error is a UNIQUE/PRIMARY KEY violation.
    /// The inbox treats this as benign deduplication.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// True when a read hit a table that does not exist yet. First reads
/// against a fresh or foreign database return empty results instead of
/// faulting.
pub(crate) fn is_missing_table(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.contains("no such table"),
        _ => false,
    }
}

struct Inner {
    path: PathBuf,
    pool: Mutex<Vec<Connection>>,
}

/// Handle to the embedded database. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

/// A connection checked out of the pool. Returned on drop.
pub struct PooledConn {
    conn: Option<Connection>,
    inner: Arc<Inner>,
}

impl Deref for PooledConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Present from construction until drop.
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection taken before drop"),
        }
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let mut pool = self.inner.pool.lock();
            if pool.len() < MAX_IDLE_CONNS {
                pool.push(conn);
            }
        }
    }
}

/// A set of operations executing inside one transaction.
///
/// Obtained via [`Store::with_transaction`]; exposes the same row-level
/// operations as [`Store`], bound to the open transaction. The supervisor
/// uses this to keep a policy's decision atomic with the inbox update.
pub struct StoreTx<'a> {
    pub(crate) conn: &'a Connection,
}

impl Store {
    /// Open (or create) the database at `path` and initialise the schema.
    ///
    /// Initialisation is idempotent; opening an existing database re-runs
    /// the `IF NOT EXISTS` statements and leaves data untouched.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            inner: Arc::new(Inner {
                path: path.to_owned(),
                pool: Mutex::new(Vec::new()),
            }),
        };
        let conn = store.conn()?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// Check a connection out of the pool, opening a new one if empty.
    pub(crate) fn conn(&self) -> Result<PooledConn, StoreError> {
        let pooled = self.inner.pool.lock().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => {
                let conn = Connection::open(&self.inner.path)?;
                conn.pragma_update(None, "journal_mode", "wal")?;
                conn.pragma_update(None, "synchronous", "normal")?;
                conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
                conn.pragma_update(None, "foreign_keys", "on")?;
                conn
            }
        };
        Ok(PooledConn {
            conn: Some(conn),
            inner: Arc::clone(&self.inner),
        })
    }

    /// Run `f` inside a single immediate transaction.
    ///
    /// Rolls back when `f` errors, commits otherwise. Generic over the
    /// error type so callers can run their own logic (e.g. a policy)
    /// atomically with store writes. Keep the closure small; the write
    /// lock is held for its whole duration.
    pub fn with_transaction<T, E>(
        &self,
        f: impl FnOnce(&StoreTx<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let conn = self.conn().map_err(E::from)?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(StoreError::from(e)))?;
        let tx = StoreTx { conn: &conn };
        match f(&tx) {
            Ok(value) => {
                conn.execute_batch("COMMIT")
                    .map_err(|e| E::from(StoreError::from(e)))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether any row matches `where_clause` in `table`.
    ///
    /// Used by evidence verification. Both arguments come from internally
    /// constructed evidence, never user input; the table name is still
    /// restricted to identifier characters as a guard.
    pub fn row_exists(&self, table: &str, where_clause: &str) -> Result<bool, StoreError> {
        if !table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StoreError::NotFound(format!("invalid table name: {table}")));
        }
        let conn = self.conn()?;
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {where_clause}");
        let result = conn.query_row(&sql, [], |row| row.get::<_, i64>(0));
        match result {
            Ok(count) => Ok(count > 0),
            Err(e) if is_missing_table(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
