//! Store facade: dot-path operations over a row backend.
//!
//! The facade owns the [`DocumentCache`] and a [`RowBackend`], and turns
//! dotted keys into root-row reads and whole-document write-backs. The
//! contract is identical for every backend.
//!
//! # Write path
//!
//! Every mutation follows the same strictly ordered sequence: read the
//! cached root document, mutate a copy via the path resolver, update the
//! cache, atomically upsert the serialized document, then confirm-read the
//! row. The sequence is not transactional: if the upsert fails after the
//! cache update, cache and table diverge for that root until the caller
//! re-reads. There is no rollback and no retry.
//!
//! # Concurrency
//!
//! One logical writer per facade instance is assumed; the facade adds no
//! locking of its own. The atomic upsert keeps the table free of duplicate
//! rows even under interleaved writers, but two facades over the same table
//! maintain independent caches that are not reconciled with each other.

use crate::cache::DocumentCache;
use crate::path::{resolve_get, resolve_has, resolve_set, split};
use crate::storage::traits::{Row, RowBackend};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Dot-path document store over a row backend.
pub struct Store<B: RowBackend> {
    backend: B,
    cache: DocumentCache,
}

impl<B: RowBackend> Store<B> {
    /// Creates a store over the given backend.
    ///
    /// Call [`Store::init`] before other operations; until then the cache is
    /// empty and reads behave as if the table were empty. This is a
    /// documented quirk, not an error.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: DocumentCache::new(),
        }
    }

    /// Returns a reference to the backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Ensures the backing table exists and loads every row into the cache.
    ///
    /// A row whose value is not valid JSON is skipped with a warning; the
    /// remaining rows still load.
    ///
    /// # Errors
    ///
    /// Returns an error if table creation or the row scan fails.
    pub fn init(&mut self) -> Result<()> {
        self.backend.ensure_table()?;
        self.cache.clear();
        for row in self.backend.fetch_all()? {
            match serde_json::from_str(&row.value) {
                Ok(doc) => self.cache.insert(row.key, doc),
                Err(e) => {
                    warn!(key = %row.key, error = %e, "skipping row with invalid JSON");
                },
            }
        }
        Ok(())
    }

    /// Reads the value at a dotted key from the cache.
    ///
    /// Pure read: no default row is created on a miss. Returns `None` when
    /// the root key is uncached or any path segment is absent; a stored
    /// `null` returns `Some(Value::Null)`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let (root, path) = split(key);
        let doc = self.cache.get(root)?;
        resolve_get(doc, path).cloned()
    }

    /// Alias for [`Store::get`].
    #[must_use]
    pub fn fetch(&self, key: &str) -> Option<Value> {
        self.get(key)
    }

    /// Reads the value at a dotted key, persisting `default` first when the
    /// root key is absent from the cache.
    ///
    /// This is the explicit form of a defaulting read: on a root miss it
    /// performs a full [`Store::set`] of the default (creating the backend
    /// row) before reading. The write side effect is the point of this
    /// method; use [`Store::get`] for a side-effect-free read.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the default fails.
    pub fn get_or_insert(&mut self, key: &str, default: Value) -> Result<Value> {
        let (root, _) = split(key);
        if !self.cache.contains(root) {
            self.set(key, default)?;
        }
        Ok(self.get(key).unwrap_or(Value::Null))
    }

    /// Sets the value at a dotted key and persists the whole root document.
    ///
    /// For a root-only key the document is replaced outright; for a nested
    /// key the cached document (or an empty object) is copied, the leaf set
    /// with intermediate objects created as needed, and the result written
    /// back. Returns the row as read back from the backend after the upsert.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, the upsert, or the confirm read
    /// fails. On failure after the cache update, cache and table may
    /// diverge for this root key.
    pub fn set(&mut self, key: &str, value: Value) -> Result<Row> {
        let (root, path) = split(key);

        // Root-only keys replace the document outright; resolve_set with an
        // empty path would do the same, this just skips the cache clone.
        let doc = if path.is_empty() {
            value
        } else {
            let mut doc = self
                .cache
                .get(root)
                .cloned()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            resolve_set(&mut doc, path, value);
            doc
        };

        let serialized = serde_json::to_string(&doc).map_err(|e| Error::QueryFailed {
            operation: "serialize_document".to_string(),
            cause: e.to_string(),
        })?;

        self.cache.insert(root, doc);
        self.backend.upsert(root, &serialized)?;

        self.backend
            .fetch(root)?
            .ok_or_else(|| Error::QueryFailed {
                operation: "confirm_upsert".to_string(),
                cause: format!("row '{root}' missing after upsert"),
            })
    }

    /// Returns true iff the dotted key exists.
    ///
    /// Root-only keys check cache membership; nested paths resolve against
    /// the cached root document. Neither branch writes anything: existence
    /// checks never create default rows.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        let (root, path) = split(key);
        if path.is_empty() {
            return self.cache.contains(root);
        }
        self.cache
            .get(root)
            .is_some_and(|doc| resolve_has(doc, path))
    }

    /// Deletes the row for a root key from the backend and the cache.
    ///
    /// Only root-level deletion is supported; a nested path is rejected.
    /// Returns whether a backend row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotImplemented`] for a nested path, or a query error
    /// if the backend delete fails.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let (root, path) = split(key);
        if !path.is_empty() {
            return Err(Error::NotImplemented(format!(
                "nested-path delete ('{key}'); delete the root key '{root}' instead"
            )));
        }
        let deleted = self.backend.delete(root)?;
        self.cache.remove(root);
        Ok(deleted)
    }

    /// Appends values to the array at a dotted key, one persisted `set` per
    /// element.
    ///
    /// Coercion policy, per element in order:
    /// - no current value: start a one-element array
    /// - current value is not an array: coerce to `[existing, new]`
    /// - current value is an array: append
    ///
    /// Each element's array state is persisted before the next element is
    /// applied (not batched). Returns the final value via a trailing read.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the per-element `set` calls fails;
    /// elements already persisted stay persisted.
    pub fn push(&mut self, key: &str, values: impl IntoIterator<Item = Value>) -> Result<Value> {
        let mut current = self.get(key);
        for value in values {
            let next = match current {
                None => Value::Array(vec![value]),
                Some(Value::Array(mut items)) => {
                    items.push(value);
                    Value::Array(items)
                },
                Some(existing) => Value::Array(vec![existing, value]),
            };
            self.set(key, next.clone())?;
            current = Some(next);
        }
        Ok(self.get(key).unwrap_or(Value::Null))
    }

    /// Re-reads the row for a key's root fresh from the backend, replacing
    /// the cache entry, and returns the value at the key.
    ///
    /// This is the resync path after a failed mutation: the committed row
    /// wins, whatever the cache held. When the row is gone the cache entry
    /// is dropped too. Unlike the bulk scans in [`Store::init`] and
    /// [`Store::all`], a corrupt value here is a targeted read of that row
    /// and surfaces as an error instead of being skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Deserialization`] when the stored value is not
    /// valid JSON, or a query error if the fetch fails. The cache entry is
    /// left unchanged on either failure.
    pub fn reload(&mut self, key: &str) -> Result<Option<Value>> {
        let (root, path) = split(key);
        match self.backend.fetch(root)? {
            Some(row) => {
                let doc: Value =
                    serde_json::from_str(&row.value).map_err(|e| Error::Deserialization {
                        key: root.to_string(),
                        cause: e.to_string(),
                    })?;
                let value = resolve_get(&doc, path).cloned();
                self.cache.insert(root, doc);
                Ok(value)
            },
            None => {
                self.cache.remove(root);
                Ok(None)
            },
        }
    }

    /// Returns every root key and its document, read fresh from the backend.
    ///
    /// Bypasses the cache entirely, so out-of-band writes to the table are
    /// visible here before any `init()` reload. Rows with invalid JSON are
    /// skipped with a warning rather than aborting the enumeration.
    ///
    /// # Errors
    ///
    /// Returns an error if the row scan fails.
    pub fn all(&self) -> Result<BTreeMap<String, Value>> {
        let mut documents = BTreeMap::new();
        for row in self.backend.fetch_all()? {
            match serde_json::from_str(&row.value) {
                Ok(doc) => {
                    documents.insert(row.key, doc);
                },
                Err(e) => {
                    warn!(key = %row.key, error = %e, "skipping row with invalid JSON");
                },
            }
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::SqliteBackend;
    use serde_json::json;

    fn store() -> Store<SqliteBackend> {
        let mut store = Store::new(SqliteBackend::in_memory("documents").unwrap());
        store.init().unwrap();
        store
    }

    #[test]
    fn test_root_key_roundtrip() {
        let mut store = store();
        store.set("user", json!({"money": 100})).unwrap();
        assert_eq!(store.get("user"), Some(json!({"money": 100})));
    }

    #[test]
    fn test_nested_key_roundtrip() {
        let mut store = store();
        store.set("user.money", json!(100)).unwrap();
        assert_eq!(store.get("user.money"), Some(json!(100)));
        assert_eq!(store.get("user"), Some(json!({"money": 100})));
    }

    #[test]
    fn test_set_returns_persisted_row() {
        let mut store = store();
        let row = store.set("user.money", json!(100)).unwrap();
        assert_eq!(row.key, "user");
        assert_eq!(
            serde_json::from_str::<Value>(&row.value).unwrap(),
            json!({"money": 100})
        );
    }

    #[test]
    fn test_get_miss_has_no_side_effects() {
        let store = store();
        assert_eq!(store.get("user.money"), None);
        assert!(!store.has("user"));
        assert!(store.all().unwrap().is_empty());
        // fetch is a true alias
        assert_eq!(store.fetch("user.money"), None);
    }

    #[test]
    fn test_get_or_insert_persists_default() {
        let mut store = store();
        let value = store.get_or_insert("user.money", json!(0)).unwrap();
        assert_eq!(value, json!(0));

        // The default row is durable, not just cached
        assert_eq!(
            store.all().unwrap().get("user"),
            Some(&json!({"money": 0}))
        );

        // Present root: no overwrite
        store.set("user.money", json!(50)).unwrap();
        let value = store.get_or_insert("user.money", json!(0)).unwrap();
        assert_eq!(value, json!(50));
    }

    #[test]
    fn test_has_after_set() {
        let mut store = store();
        store.set("user", json!("x")).unwrap();
        store.set("guild.name", json!("alpha")).unwrap();

        assert!(store.has("user"));
        assert!(store.has("guild"));
        assert!(store.has("guild.name"));
        assert!(!store.has("guild.rank"));
        assert!(!store.has("nobody"));
        assert!(!store.has("nobody.path"));
    }

    #[test]
    fn test_has_is_true_for_falsy_values() {
        let mut store = store();
        store.set("flags.dark_mode", json!(false)).unwrap();
        store.set("flags.note", json!("")).unwrap();
        store.set("flags.maybe", json!(null)).unwrap();

        assert!(store.has("flags.dark_mode"));
        assert!(store.has("flags.note"));
        assert!(store.has("flags.maybe"));
    }

    #[test]
    fn test_push_creates_array() {
        let mut store = store();
        let value = store.push("a.items", [json!("x")]).unwrap();
        assert_eq!(value, json!(["x"]));
        assert_eq!(store.get("a.items"), Some(json!(["x"])));
    }

    #[test]
    fn test_push_appends() {
        let mut store = store();
        store.push("a.items", [json!("x")]).unwrap();
        let value = store.push("a.items", [json!("y")]).unwrap();
        assert_eq!(value, json!(["x", "y"]));
    }

    #[test]
    fn test_push_coerces_scalar() {
        let mut store = store();
        store.set("a.single", json!("x")).unwrap();
        let value = store.push("a.single", [json!("y")]).unwrap();
        assert_eq!(value, json!(["x", "y"]));
    }

    #[test]
    fn test_push_multiple_values_in_order() {
        let mut store = store();
        let value = store
            .push("a.items", [json!(1), json!(2), json!(3)])
            .unwrap();
        assert_eq!(value, json!([1, 2, 3]));
        // Each element was persisted individually; the table has the final state
        assert_eq!(
            store.all().unwrap().get("a"),
            Some(&json!({"items": [1, 2, 3]}))
        );
    }

    #[test]
    fn test_delete_root() {
        let mut store = store();
        store.set("user", json!(1)).unwrap();

        assert!(store.delete("user").unwrap());
        assert!(!store.has("user"));
        assert!(!store.all().unwrap().contains_key("user"));
        assert!(!store.delete("user").unwrap());
    }

    #[test]
    fn test_delete_nested_path_rejected() {
        let mut store = store();
        store.set("user.money", json!(1)).unwrap();

        let result = store.delete("user.money");
        assert!(matches!(result, Err(Error::NotImplemented(_))));
        // Nothing was removed
        assert!(store.has("user.money"));
    }

    #[test]
    fn test_all_contains_last_set_documents() {
        let mut store = store();
        store.set("p", json!({"a": 1})).unwrap();
        store.set("q", json!({"b": 2})).unwrap();
        store.set("p", json!({"a": 9})).unwrap();

        let all = store.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("p"), Some(&json!({"a": 9})));
        assert_eq!(all.get("q"), Some(&json!({"b": 2})));
    }

    #[test]
    fn test_all_bypasses_cache() {
        let store = store();
        // Out-of-band write directly against the backend
        store.backend().upsert("ghost", r#"{"seen":true}"#).unwrap();

        assert!(!store.has("ghost"));
        assert_eq!(
            store.all().unwrap().get("ghost"),
            Some(&json!({"seen": true}))
        );
    }

    #[test]
    fn test_all_skips_corrupt_rows() {
        let mut store = store();
        store.set("good", json!(1)).unwrap();
        store.backend().upsert("bad", "not json {{").unwrap();

        let all = store.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("good"), Some(&json!(1)));
    }

    #[test]
    fn test_reload_picks_up_out_of_band_write() {
        let mut store = store();
        store.set("user.money", json!(100)).unwrap();

        // Another writer replaces the row behind the cache's back
        store
            .backend()
            .upsert("user", r#"{"money":250}"#)
            .unwrap();
        assert_eq!(store.get("user.money"), Some(json!(100)));

        let value = store.reload("user.money").unwrap();
        assert_eq!(value, Some(json!(250)));
        // The cache now agrees with the table
        assert_eq!(store.get("user.money"), Some(json!(250)));
    }

    #[test]
    fn test_reload_corrupt_row_surfaces_deserialization_error() {
        let mut store = store();
        store.set("user.money", json!(100)).unwrap();
        store.backend().upsert("user", "not json {{").unwrap();

        let result = store.reload("user");
        assert!(matches!(
            result,
            Err(Error::Deserialization { ref key, .. }) if key == "user"
        ));
        // Cache entry untouched on failure
        assert_eq!(store.get("user.money"), Some(json!(100)));
    }

    #[test]
    fn test_reload_missing_row_drops_cache_entry() {
        let mut store = store();
        store.set("user.money", json!(100)).unwrap();
        store.backend().delete("user").unwrap();

        assert_eq!(store.reload("user.money").unwrap(), None);
        assert!(!store.has("user"));
    }

    #[test]
    fn test_init_loads_existing_rows() {
        let backend = SqliteBackend::in_memory("documents").unwrap();
        backend.ensure_table().unwrap();
        backend.upsert("user", r#"{"money":100}"#).unwrap();
        backend.upsert("bad", "not json").unwrap();

        let mut store = Store::new(backend);
        store.init().unwrap();

        assert_eq!(store.get("user.money"), Some(json!(100)));
        // Corrupt row skipped, not fatal
        assert!(!store.has("bad"));
    }

    #[test]
    fn test_init_on_empty_table() {
        let store = store();
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_operations_before_init_behave_as_empty() {
        let backend = SqliteBackend::in_memory("documents").unwrap();
        backend.ensure_table().unwrap();
        backend.upsert("user", r#"{"money":100}"#).unwrap();

        let store = Store::new(backend);
        // Cache empty until init: reads miss, no error
        assert_eq!(store.get("user.money"), None);
        assert!(!store.has("user"));
    }

    #[test]
    fn test_set_overwrites_whole_document_for_root_key() {
        let mut store = store();
        store.set("user", json!({"money": 100, "name": "a"})).unwrap();
        store.set("user", json!(7)).unwrap();
        assert_eq!(store.get("user"), Some(json!(7)));
    }

    #[test]
    fn test_nested_set_preserves_siblings() {
        let mut store = store();
        store.set("user.money", json!(100)).unwrap();
        store.set("user.name", json!("a")).unwrap();
        assert_eq!(store.get("user"), Some(json!({"money": 100, "name": "a"})));
    }

    #[test]
    fn test_deeply_nested_set() {
        let mut store = store();
        store.set("a.b.c.d", json!("deep")).unwrap();
        assert_eq!(store.get("a"), Some(json!({"b": {"c": {"d": "deep"}}})));
        assert!(store.has("a.b.c"));
    }

    #[test]
    fn test_full_scenario() {
        let mut store = store();
        assert!(store.all().unwrap().is_empty());

        store.set("user", json!({"money": 100})).unwrap();
        assert_eq!(store.get("user.money"), Some(json!(100)));

        store.push("user.items", [json!("Apple")]).unwrap();
        assert_eq!(store.get("user.items"), Some(json!(["Apple"])));

        store.push("user.items", [json!("Banana")]).unwrap();
        assert_eq!(store.get("user.items"), Some(json!(["Apple", "Banana"])));

        store.delete("user").unwrap();
        assert!(!store.has("user"));
        assert!(!store.all().unwrap().contains_key("user"));
    }
}
