//! In-memory document cache.
//!
//! The cache is the read path of the store facade: after `init()` it holds
//! one entry per backend row, and every successful mutation writes through
//! before returning, so cache and table agree per root key. It is owned
//! exclusively by its [`Store`](crate::Store) instance; there is no shared
//! or static state, and two stores over the same table do not see each
//! other's entries.

use serde_json::Value;
use std::collections::HashMap;

/// Mapping from root key to its current document.
///
/// Pure in-memory, no I/O. Last write wins; the map structure itself
/// guarantees a single document per root at any time.
#[derive(Debug, Default)]
pub struct DocumentCache {
    entries: HashMap<String, Value>,
}

impl DocumentCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached document for a root key, if present.
    #[must_use]
    pub fn get(&self, root: &str) -> Option<&Value> {
        self.entries.get(root)
    }

    /// Inserts or replaces the document for a root key.
    pub fn insert(&mut self, root: impl Into<String>, doc: Value) {
        self.entries.insert(root.into(), doc);
    }

    /// Returns true if the root key has a cached document.
    #[must_use]
    pub fn contains(&self, root: &str) -> bool {
        self.entries.contains_key(root)
    }

    /// Removes the entry for a root key, returning the document if present.
    pub fn remove(&mut self, root: &str) -> Option<Value> {
        self.entries.remove(root)
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached root keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(root, document)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_get() {
        let mut cache = DocumentCache::new();
        assert!(cache.is_empty());

        cache.insert("user", json!({"money": 100}));
        assert_eq!(cache.get("user"), Some(&json!({"money": 100})));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("user"));
        assert!(!cache.contains("guild"));
    }

    #[test]
    fn test_last_write_wins() {
        let mut cache = DocumentCache::new();
        cache.insert("user", json!(1));
        cache.insert("user", json!(2));
        assert_eq!(cache.get("user"), Some(&json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut cache = DocumentCache::new();
        cache.insert("user", json!("v"));

        assert_eq!(cache.remove("user"), Some(json!("v")));
        assert_eq!(cache.remove("user"), None);
        assert!(!cache.contains("user"));
    }

    #[test]
    fn test_clear() {
        let mut cache = DocumentCache::new();
        cache.insert("a", json!(1));
        cache.insert("b", json!(2));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_iter() {
        let mut cache = DocumentCache::new();
        cache.insert("a", json!(1));
        cache.insert("b", json!(2));

        let mut keys: Vec<&str> = cache.iter().map(|(k, _)| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
