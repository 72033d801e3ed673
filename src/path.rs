//! Dot-path resolution against JSON documents.
//!
//! A user-facing key like `"user.money"` is split into a root key (`"user"`,
//! the backend row) and a property path (`"money"`, a position inside that
//! row's JSON document). The resolvers here are pure: they never touch the
//! cache or the backend.

use serde_json::{Map, Value};

/// Splits a dotted key into `(root, path)`.
///
/// The root is the first dot-delimited segment; the path is everything after
/// the first dot, or empty when the key has no dot. A dotless key and a
/// one-segment path are indistinguishable in outcome: both address the whole
/// document.
///
/// # Examples
///
/// ```
/// use dotstore::path::split;
///
/// assert_eq!(split("user.money"), ("user", "money"));
/// assert_eq!(split("user.bank.balance"), ("user", "bank.balance"));
/// assert_eq!(split("user"), ("user", ""));
/// ```
#[must_use]
pub fn split(key: &str) -> (&str, &str) {
    key.split_once('.').unwrap_or((key, ""))
}

/// Resolves a property path against a document, returning a reference to the
/// value at that position.
///
/// An empty path returns the document itself. `None` means *absent*: some
/// intermediate segment is missing or not an object. A stored `Value::Null`
/// resolves to `Some(&Value::Null)`, which is distinct from absence.
#[must_use]
pub fn resolve_get<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(doc);
    }
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Sets the value at a property path, creating intermediate objects as needed.
///
/// An empty path replaces the whole document. Intermediate segments that are
/// missing, or present but not objects, are replaced by fresh objects; this
/// mirrors the leaf-wins policy of `resolve_get` (a scalar cannot be
/// descended into, so it is overwritten).
pub fn resolve_set(doc: &mut Value, path: &str, value: Value) {
    if path.is_empty() {
        *doc = value;
        return;
    }
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    let (segment, rest) = split(path);
    // Guaranteed by the replacement above.
    let Some(map) = doc.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        map.insert(segment.to_string(), value);
        return;
    }
    let entry = map
        .entry(segment.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    resolve_set(entry, rest, value);
}

/// Returns true iff the final path segment exists in the document.
///
/// Existence is independent of the value: a present `null`, empty string, or
/// empty array all count. The traversal is the same as [`resolve_get`].
#[must_use]
pub fn resolve_has(doc: &Value, path: &str) -> bool {
    resolve_get(doc, path).is_some()
}
