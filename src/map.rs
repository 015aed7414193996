//! Mapping type for IPLD nodes.
//!
//! [`NodeMap`] wraps an [`IndexMap`] so a node keeps the order its keys were
//! inserted or decoded in. That order is what [`crate::walk()`] follows; the
//! canonical CBOR encoder sorts keys itself and never depends on it.
//!
//! Equality ignores order: two maps holding the same key/value pairs are
//! equal whatever order they were built in.
//!
//! ## Examples
//!
//! ```rust
//! use ipld_stream::{NodeMap, Value};
//!
//! let mut a = NodeMap::new();
//! a.insert("x".to_string(), Value::from(1));
//! a.insert("y".to_string(), Value::from(2));
//!
//! let b: NodeMap = vec![
//!     ("y".to_string(), Value::from(2)),
//!     ("x".to_string(), Value::from(1)),
//! ]
//! .into_iter()
//! .collect();
//!
//! assert_eq!(a, b);
//! ```

use indexmap::IndexMap;
use std::collections::BTreeMap;

/// A mapping of string keys to values, keys unique.
///
/// # Examples
///
/// ```rust
/// use ipld_stream::{NodeMap, Value};
///
/// let mut map = NodeMap::new();
/// map.insert("first".to_string(), Value::from(1));
/// map.insert("second".to_string(), Value::from(2));
///
/// let keys: Vec<_> = map.keys().cloned().collect();
/// assert_eq!(keys, vec!["first", "second"]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeMap(IndexMap<String, crate::Value>);

impl NodeMap {
    #[must_use]
    pub fn new() -> Self {
        NodeMap(IndexMap::new())
    }

    /// Preallocates room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        NodeMap(IndexMap::with_capacity(capacity))
    }

    /// Inserts a key-value pair, returning the previous value for the key.
    ///
    /// Replacing a key keeps its original position.
    pub fn insert(&mut self, key: String, value: crate::Value) -> Option<crate::Value> {
        self.0.insert(key, value)
    }

    /// Looks up the child under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&crate::Value> {
        self.0.get(key)
    }

        pub fn get_mut(&mut self, key: &str) -> Option<&mut crate::Value> {
        self.0.get_mut(key)
    }

    /// Removes a key, keeping the relative order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<crate::Value> {
        self.0.shift_remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in the order they were inserted or decoded.
    pub fn keys(&self) -> indexmap::map::Keys<'_, String, crate::Value> {
        self.0.keys()
    }

    /// Values, following key order.
    pub fn values(&self) -> indexmap::map::Values<'_, String, crate::Value> {
        self.0.values()
    }

    /// Entries in the order they were inserted or decoded.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, crate::Value> {
        self.0.iter()
    }

    /// Returns the entries ordered by the byte-wise order of their keys.
    ///
    /// This is the order every in-memory reader and the canonical CBOR
    /// encoder use.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ipld_stream::{NodeMap, Value};
    ///
    /// let map: NodeMap = vec![
    ///     ("b".to_string(), Value::Null),
    ///     ("B".to_string(), Value::Null),
    ///     ("a".to_string(), Value::Null),
    /// ]
    /// .into_iter()
    /// .collect();
    ///
    /// let keys: Vec<_> = map.sorted_entries().into_iter().map(|(k, _)| k.as_str()).collect();
    /// assert_eq!(keys, vec!["B", "a", "b"]);
    /// ```
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<(&String, &crate::Value)> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        entries
    }
}

impl From<BTreeMap<String, crate::Value>> for NodeMap {
    fn from(map: BTreeMap<String, crate::Value>) -> Self {
        NodeMap(map.into_iter().collect())
    }
}

impl IntoIterator for NodeMap {
    type Item = (String, crate::Value);
    type IntoIter = indexmap::map::IntoIter<String, crate::Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodeMap {
    type Item = (&'a String, &'a crate::Value);
    type IntoIter = indexmap::map::Iter<'a, String, crate::Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, crate::Value)> for NodeMap {
    fn from_iter<T: IntoIterator<Item = (String, crate::Value)>>(iter: T) -> Self {
        NodeMap(IndexMap::from_iter(iter))
    }
}

impl Extend<(String, crate::Value)> for NodeMap {
    fn extend<T: IntoIterator<Item = (String, crate::Value)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}
