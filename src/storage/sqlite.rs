//! `SQLite`-based row backend.
//!
//! Provides durable storage using `SQLite` as the source of truth for the
//! document table.

use crate::storage::metrics::record_operation_metrics;
use crate::storage::traits::{Row, RowBackend, validate_table_name};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::instrument;

/// Helper to acquire the connection lock with poison recovery.
///
/// If the mutex is poisoned by a panic in a previous critical section, the
/// inner connection is still in a valid state; recover it and log a warning
/// rather than cascading the failure.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a `SQLite` connection for concurrent access.
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to 5 seconds for locks instead of failing
fn configure_connection(conn: &Connection) {
    // journal_mode returns a result string ("wal"), so use pragma_update and
    // ignore the returned value.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
}

/// `SQLite`-based row backend.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// WAL mode and the `busy_timeout` pragma mitigate contention between
/// processes sharing the database file.
pub struct SqliteBackend {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Table holding the `(key, value)` rows.
    table: String,
    /// Path to the database file (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteBackend {
    /// Creates a new `SQLite` backend over a database file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTable`] for a malformed table name, or
    /// [`Error::BackendUnavailable`] if the database cannot be opened.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use dotstore::SqliteBackend;
    ///
    /// let backend = SqliteBackend::new("./data.db", "documents")?;
    /// # Ok::<(), dotstore::Error>(())
    /// ```
    pub fn new(db_path: impl Into<PathBuf>, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;

        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| Error::BackendUnavailable {
            backend: "sqlite".to_string(),
            cause: e.to_string(),
        })?;
        configure_connection(&conn);

        Ok(Self {
            conn: Mutex::new(conn),
            table,
            db_path: Some(db_path),
        })
    }

    /// Creates an in-memory `SQLite` backend (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTable`] for a malformed table name, or
    /// [`Error::BackendUnavailable`] if the database cannot be opened.
    pub fn in_memory(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;

        let conn = Connection::open_in_memory().map_err(|e| Error::BackendUnavailable {
            backend: "sqlite".to_string(),
            cause: e.to_string(),
        })?;
        configure_connection(&conn);

        Ok(Self {
            conn: Mutex::new(conn),
            table,
            db_path: None,
        })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Maps a rusqlite error to a query failure.
    fn query_error(operation: &str, e: impl std::fmt::Display) -> Error {
        Error::QueryFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        }
    }
}

impl RowBackend for SqliteBackend {
    #[instrument(skip(self), fields(operation = "ensure_table", backend = "sqlite"))]
    fn ensure_table(&self) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            // PRIMARY KEY on key makes the ON CONFLICT upsert possible and
            // rules out duplicate rows for a root key.
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        key TEXT PRIMARY KEY,
                        value TEXT NOT NULL
                    )",
                    self.table
                ),
                [],
            )
            .map_err(|e| Self::query_error("create_table", e))?;

            Ok(())
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "ensure_table", start, status);
        result
    }

    #[instrument(skip(self), fields(operation = "fetch_all", backend = "sqlite"))]
    fn fetch_all(&self) -> Result<Vec<Row>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            let mut stmt = conn
                .prepare(&format!("SELECT key, value FROM {}", self.table))
                .map_err(|e| Self::query_error("prepare_fetch_all", e))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(Row {
                        key: row.get(0)?,
                        value: row.get(1)?,
                    })
                })
                .map_err(|e| Self::query_error("fetch_all", e))?
                .collect::<std::result::Result<Vec<Row>, _>>()
                .map_err(|e| Self::query_error("fetch_all_row", e))?;

            Ok(rows)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "fetch_all", start, status);
        result
    }

    #[instrument(skip(self), fields(operation = "fetch", backend = "sqlite", row.key = %key))]
    fn fetch(&self, key: &str) -> Result<Option<Row>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            conn.query_row(
                &format!("SELECT key, value FROM {} WHERE key = ?1", self.table),
                params![key],
                |row| {
                    Ok(Row {
                        key: row.get(0)?,
                        value: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Self::query_error("fetch", e))
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "fetch", start, status);
        result
    }

    #[instrument(skip(self, value), fields(operation = "upsert", backend = "sqlite", row.key = %key))]
    fn upsert(&self, key: &str, value: &str) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            conn.execute(
                &format!(
                    "INSERT INTO {} (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    self.table
                ),
                params![key, value],
            )
            .map_err(|e| Self::query_error("upsert", e))?;

            Ok(())
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "upsert", start, status);
        result
    }

    #[instrument(skip(self), fields(operation = "delete", backend = "sqlite", row.key = %key))]
    fn delete(&self, key: &str) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            let deleted = conn
                .execute(
                    &format!("DELETE FROM {} WHERE key = ?1", self.table),
                    params![key],
                )
                .map_err(|e| Self::query_error("delete", e))?;

            Ok(deleted > 0)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "delete", start, status);
        result
    }

    #[instrument(skip(self), fields(operation = "exists", backend = "sqlite", row.key = %key))]
    fn exists(&self, key: &str) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            let exists: bool = conn
                .query_row(
                    &format!("SELECT 1 FROM {} WHERE key = ?1", self.table),
                    params![key],
                    |_| Ok(true),
                )
                .optional()
                .map_err(|e| Self::query_error("exists", e))?
                .unwrap_or(false);

            Ok(exists)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "exists", start, status);
        result
    }

    #[instrument(skip(self), fields(operation = "count", backend = "sqlite"))]
    fn count(&self) -> Result<usize> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                    row.get(0)
                })
                .map_err(|e| Self::query_error("count", e))?;

            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            Ok(count as usize)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "count", start, status);
        result
    }
}
