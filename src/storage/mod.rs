//! Backend storage layer.
//!
//! Backends implement the [`RowBackend`](traits::RowBackend) trait over a
//! two-column `(key, value)` table: `SQLite` for embedded use, PostgreSQL
//! (behind the `postgres` feature) for networked deployments. Both are thin
//! mechanical I/O; the document semantics live in [`crate::store`].

pub mod metrics;
pub mod postgres;
pub mod sqlite;
pub mod traits;

pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;
pub use traits::{Row, RowBackend, validate_table_name};
