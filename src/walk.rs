//! Depth-first traversal and transformation of materialized trees.
//!
//! [`walk`] visits every value (mappings, sequences and scalars, the root
//! included) before its children and rebuilds the tree from the visitor's
//! decisions. The source tree is never mutated.
//!
//! ```rust
//! use ipld_stream::{ipld, walk, Value, Visit};
//!
//! let tree = ipld!({"a": 1, "b": {"c": 2}});
//! let doubled = walk(&tree, |_root, current, _path| {
//!     Ok(match current.as_i64() {
//!         Some(n) => Visit::Replace(Value::from(n * 2)),
//!         None => Visit::Continue,
//!     })
//! })
//! .unwrap();
//! assert_eq!(doubled, ipld!({"a": 2, "b": {"c": 4}}));
//! ```

use crate::link::{Link, LinkRef};
use crate::path::{flatten_path, PathSegment};
use crate::{Error, NodeMap, Result, Value};
use std::collections::BTreeMap;

/// Decision returned by a [`walk`] visitor.
#[derive(Debug, Clone, PartialEq)]
pub enum Visit {
    /// Keep the current value and descend into its children.
    Continue,
    /// Use this value instead and descend into its children.
    Replace(Value),
    /// Keep the current value as is and do not descend.
    Skip,
}

/// Links of a tree keyed by their flattened, escaped path.
pub type LinkIndex = BTreeMap<String, Link>;

/// Walks `root` depth-first, returning the rebuilt tree.
///
/// The visitor receives the root, the current value and the path to it. Map
/// keys are visited in the mapping's own order, list elements by index.
///
/// # Errors
///
/// The first error returned by the visitor halts the walk and is returned
/// unchanged.
pub fn walk<F>(root: &Value, mut visit: F) -> Result<Value>
where
    F: FnMut(&Value, &Value, &[PathSegment]) -> Result<Visit>,
{
    let mut path = Vec::new();
    walk_inner(root, root, &mut path, &mut visit)
}

/// Walks only the subtree of `root` at `prefix`.
///
/// The visitor still receives full paths from the root.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if nothing lives at `prefix`.
pub fn walk_from<F>(root: &Value, prefix: &[PathSegment], mut visit: F) -> Result<Value>
where
    F: FnMut(&Value, &Value, &[PathSegment]) -> Result<Visit>,
{
    let start = get_path(root, prefix).ok_or_else(|| Error::not_found(&flatten_path(prefix)))?;
    let mut path = prefix.to_vec();
    walk_inner(root, start, &mut path, &mut visit)
}

fn walk_inner<F>(
    root: &Value,
    current: &Value,
    path: &mut Vec<PathSegment>,
    visit: &mut F,
) -> Result<Value>
where
    F: FnMut(&Value, &Value, &[PathSegment]) -> Result<Visit>,
{
    let replaced;
    let source = match visit(root, current, path)? {
        Visit::Skip => return Ok(current.clone()),
        Visit::Replace(value) => {
            replaced = value;
            &replaced
        }
        Visit::Continue => current,
    };

    match source {
        Value::Map(map) => {
            let mut out = NodeMap::with_capacity(map.len());
            for (key, child) in map.iter() {
                path.push(PathSegment::Key(key.clone()));
                let rebuilt = walk_inner(root, child, path, visit);
                path.pop();
                out.insert(key.clone(), rebuilt?);
            }
            Ok(Value::Map(out))
        }
        Value::List(list) => {
            let mut out = Vec::with_capacity(list.len());
            for (i, child) in list.iter().enumerate() {
                path.push(PathSegment::Index(i));
                let rebuilt = walk_inner(root, child, path, visit);
                path.pop();
                out.push(rebuilt?);
            }
            Ok(Value::List(out))
        }
        scalar => Ok(scalar.clone()),
    }
}

/// Descends `root` along `path` without visiting anything else.
///
/// Returns `None` when a key is missing, an index is out of bounds or not
/// numeric, or a scalar is reached before the path ends.
#[must_use]
pub fn get_path<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, segment| match (current, segment) {
        (Value::Map(map), PathSegment::Key(key)) => map.get(key),
        (Value::List(list), PathSegment::Index(i)) => list.get(*i),
        (Value::List(list), PathSegment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|i| list.get(i))
        }
        _ => None,
    })
}

/// [`get_path`] on a flattened, escaped string path.
///
/// ```rust
/// use ipld_stream::{get_str_path, ipld, Value};
///
/// let tree = ipld!({"a/b": [10, 20]});
/// assert_eq!(get_str_path(&tree, "a\\/b/1"), Some(&Value::from(20)));
/// assert_eq!(get_str_path(&tree, "a\\/b/x"), None);
/// ```
#[must_use]
pub fn get_str_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    get_path(root, &crate::path::parse_path(path))
}

/// Collects every link in the tree, keyed by flattened path.
///
/// A link's own children are still visited, so nested links are found too.
///
/// ```rust
/// use ipld_stream::{extract_links, ipld};
///
/// let tree = ipld!({
///     "foo": "bar",
///     "baz": {"@link": "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo", "size": 42}
/// });
/// let links = extract_links(&tree);
/// assert_eq!(links.len(), 1);
/// assert_eq!(links["baz"].size(), Some(42));
/// ```
#[must_use]
pub fn extract_links(root: &Value) -> LinkIndex {
    let mut index = LinkIndex::new();
    // only collects, so the walk cannot fail
    let _ = walk(root, |_root, current, path| {
        if let Some(link) = current.as_map().and_then(LinkRef::from_map) {
            index.insert(flatten_path(path), link.to_link());
        }
        Ok(Visit::Continue)
    });
    index
}
