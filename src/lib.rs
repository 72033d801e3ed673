//! # Dotstore
//!
//! A dot-path document store over SQLite and PostgreSQL.
//!
//! Dotstore presents a nested-property, document-like interface
//! (`"user.money"`) on top of a flat relational `(key, value)` table. The
//! first dot-delimited segment of a key is the *root key* and maps to one
//! persisted row; the remaining segments address into the JSON document
//! stored in that row's value column. An in-process cache mirrors the
//! committed table state, so reads are memory-speed and every mutation is
//! written through to the backend before it returns.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dotstore::{SqliteBackend, Store};
//! use serde_json::json;
//!
//! let mut store = Store::new(SqliteBackend::in_memory("documents")?);
//! store.init()?;
//! store.set("user.money", json!(100))?;
//! assert_eq!(store.get("user.money"), Some(json!(100)));
//! # Ok::<(), dotstore::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cache;
pub mod config;
pub mod observability;
pub mod path;
pub mod storage;
pub mod store;

// Re-exports for convenience
pub use cache::DocumentCache;
pub use config::{BackendKind, StoreConfig};
pub use storage::postgres::PostgresBackend;
pub use storage::sqlite::SqliteBackend;
pub use storage::traits::{Row, RowBackend};
pub use store::Store;

/// Error type for dotstore operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `BackendUnavailable` | Database open fails, pool creation/acquire fails |
/// | `QueryFailed` | A statement fails against the backend table |
/// | `Deserialization` | A stored value is not valid JSON |
/// | `InvalidTable` | Table name fails identifier validation |
/// | `NotImplemented` | Nested-path delete; PostgreSQL calls without the feature |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The backend could not be reached or opened.
    ///
    /// Raised when:
    /// - The `SQLite` database file cannot be opened
    /// - The PostgreSQL connection URL cannot be parsed
    /// - The connection pool cannot be created or a client acquired
    ///
    /// Fatal for the operation; no retry is attempted.
    #[error("backend '{backend}' unavailable: {cause}")]
    BackendUnavailable {
        /// The backend that failed ("sqlite" or "postgres").
        backend: String,
        /// The underlying cause.
        cause: String,
    },

    /// A query against the backend table failed.
    ///
    /// Surfaces immediately with no retry and no partial-state cleanup.
    /// After a failed mutating call the cache and the table may diverge for
    /// the affected root key; callers should re-read via `get`/`all`.
    #[error("operation '{operation}' failed: {cause}")]
    QueryFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A stored value could not be deserialized as JSON.
    ///
    /// Raised when reading the offending row. Bulk enumeration (`init`,
    /// `all`) skips such rows with a warning instead of aborting.
    #[error("value for key '{key}' is not valid JSON: {cause}")]
    Deserialization {
        /// The root key whose value failed to parse.
        key: String,
        /// The underlying parse error.
        cause: String,
    },

    /// The configured table name is not a valid SQL identifier.
    ///
    /// Table names are interpolated into statements and therefore restricted
    /// to `[A-Za-z_][A-Za-z0-9_]*`.
    #[error("invalid table name: {0}")]
    InvalidTable(String),

    /// The requested operation is not implemented.
    ///
    /// Raised when:
    /// - `delete` is called with a nested path (only root-level deletion is
    ///   supported)
    /// - The PostgreSQL backend is used without the `postgres` feature
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias for dotstore operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::BackendUnavailable {
            backend: "sqlite".to_string(),
            cause: "no such file".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "backend 'sqlite' unavailable: no such file"
        );

        let err = Error::QueryFailed {
            operation: "upsert".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'upsert' failed: disk full");

        let err = Error::Deserialization {
            key: "user".to_string(),
            cause: "expected value".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "value for key 'user' is not valid JSON: expected value"
        );

        let err = Error::InvalidTable("bad;name".to_string());
        assert_eq!(err.to_string(), "invalid table name: bad;name");
    }
}
