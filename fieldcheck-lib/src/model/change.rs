//! Change: the field values submitted for validation

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A set of field updates, keyed by field name.
///
/// A `Change` is either the partial update handed to
/// [`Validator::request`](crate::validator::Validator::request) or the
/// accumulated view the validator builds by overlaying those partial updates.
/// Fields are kept in name order, so rule evaluation and results are
/// deterministic.
///
/// # Example
///
/// ```
/// use fieldcheck_lib::model::Change;
/// use serde_json::json;
///
/// let change = Change::new()
///     .with("username", "alice")
///     .with("age", 42);
///
/// assert_eq!(change.get("username"), Some(&json!("alice")));
/// assert_eq!(change.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Change(BTreeMap<String, Value>);

impl Change {
    /// Creates an empty change.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds a field value, returning the updated change.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Sets a field value, returning the previous value if any.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Returns the value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns `true` if the change contains the field.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Iterates over the field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over `(field, value)` pairs in field order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the change has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new change with `other` laid over `self`.
    ///
    /// Fields present in both take the value from `other`.
    pub fn merged(&self, other: Change) -> Change {
        let mut merged = self.clone();
        merged.0.extend(other.0);
        merged
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Change {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Change {
    fn from(fields: [(K, V); N]) -> Self {
        fields.into_iter().collect()
    }
}

impl From<serde_json::Map<String, Value>> for Change {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl IntoIterator for Change {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Change {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
