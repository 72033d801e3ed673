//! Backend trait for row storage.

use crate::{Error, Result};

/// A single `(key, value)` row as stored in the backend table.
///
/// `value` is an opaque serialized JSON document; the backend never inspects
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// The root key.
    pub key: String,
    /// The serialized document.
    pub value: String,
}

/// Trait for row storage backends.
///
/// Backends are the durable source of truth. They expose a flat table of
/// `(key TEXT PRIMARY KEY, value TEXT)` rows and nothing else; splitting keys
/// into paths and interpreting values as documents happens above them.
///
/// `upsert` must be atomic insert-or-replace on the key column. The primary
/// key constraint plus a conflict clause collapses the probe/insert/update
/// round-trips into one statement and rules out duplicate rows under
/// concurrent writers.
pub trait RowBackend: Send + Sync {
    /// Idempotently creates the backing table.
    fn ensure_table(&self) -> Result<()>;

    /// Returns every row in the table.
    fn fetch_all(&self) -> Result<Vec<Row>>;

    /// Returns the row for a root key, if present.
    fn fetch(&self, key: &str) -> Result<Option<Row>>;

    /// Atomically inserts or replaces the row for a root key.
    fn upsert(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes the row for a root key. Returns whether a row was removed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Checks whether a row exists for a root key.
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.fetch(key)?.is_some())
    }

    /// Returns the total row count.
    fn count(&self) -> Result<usize> {
        Ok(self.fetch_all()?.len())
    }
}

impl<B: RowBackend + ?Sized> RowBackend for Box<B> {
    fn ensure_table(&self) -> Result<()> {
        (**self).ensure_table()
    }

    fn fetch_all(&self) -> Result<Vec<Row>> {
        (**self).fetch_all()
    }

    fn fetch(&self, key: &str) -> Result<Option<Row>> {
        (**self).fetch(key)
    }

    fn upsert(&self, key: &str, value: &str) -> Result<()> {
        (**self).upsert(key, value)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }

    fn count(&self) -> Result<usize> {
        (**self).count()
    }
}

/// Validates a table name before it is interpolated into SQL.
///
/// Table names cannot be bound as statement parameters, so they are
/// restricted to `[A-Za-z_][A-Za-z0-9_]*`.
///
/// # Errors
///
/// Returns [`Error::InvalidTable`] if the name is empty or contains any
/// character outside the allowed set.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_first && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidTable(name.to_string()))
    }
}
