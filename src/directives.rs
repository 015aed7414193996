//! Directive keys and the two views they fold into.
//!
//! A node may carry reserved keys: `@type`, `@context`, `@container`,
//! `@index` and `@attrs`. A literal key starting with `@` is escaped as
//! `\@`, and a literal backslash as `\\`. The link key `@link` is data,
//! not a directive. Directive escaping is separate
//! from path escaping: a `/` in a key is never touched here.
//!
//! - The plain view drops every directive. A node with
//!   `"@container": "@index"` has its content lifted into the result, or
//!   nested under the index name when `@attrs` brings other fields along.
//! - The linked-data view keeps `@type` and `@context`, lifts `@attrs`, and
//!   nests the index content under the index name.
//!
//! ```rust
//! use ipld_stream::directives::{strip_directives_all, to_linked_data_all};
//! use ipld_stream::ipld;
//!
//! let node = ipld!({"@container": "@index", "@index": "files", "a": 1, "b": 2});
//! assert_eq!(strip_directives_all(&node), ipld!({"a": 1, "b": 2}));
//! assert_eq!(to_linked_data_all(&node), ipld!({"files": {"a": 1, "b": 2}}));
//! ```

use crate::link::LINK_KEY;
use crate::{NodeMap, Value};

pub const ATTRS: &str = "@attrs";
pub const CONTAINER: &str = "@container";
pub const CONTEXT: &str = "@context";
pub const INDEX: &str = "@index";
pub const TYPE: &str = "@type";

/// Index name used when a container node has no `@index` string.
pub const DEFAULT_INDEX_NAME: &str = "@index";

/// A node split by role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeIndex {
    /// Contents of `@attrs`, the `@index` directive, and for a non-container
    /// node every unescaped plain key.
    pub attrs: NodeMap,
    /// Every other directive.
    pub directives: NodeMap,
    /// Plain keys of a container node, unescaped.
    pub index: NodeMap,
    /// Plain keys of a container node, as written.
    pub escaped_index: NodeMap,
}

/// Whether `map` has `"@container": "@index"`.
#[must_use]
pub fn is_container_index(map: &NodeMap) -> bool {
    map.get(CONTAINER).and_then(Value::as_str) == Some(INDEX)
}

/// The `@index` name of `map`, or `default`.
#[must_use]
pub fn container_index_name<'a>(map: &'a NodeMap, default: &'a str) -> &'a str {
    map.get(INDEX).and_then(Value::as_str).unwrap_or(default)
}

/// Escapes a literal key so it is not read as a directive.
///
/// ```rust
/// use ipld_stream::directives::{escape_key, unescape_key};
///
/// assert_eq!(escape_key("@bazz"), r"\@bazz");
/// assert_eq!(unescape_key(&escape_key(r"a\b")), r"a\b");
/// ```
#[must_use]
pub fn escape_key(key: &str) -> String {
    let escaped = key.replace('\\', "\\\\");
    if escaped.starts_with('@') {
        format!("\\{}", escaped)
    } else {
        escaped
    }
}

/// Undoes [`escape_key`]: `\@` becomes `@`, `\\` becomes `\`.
#[must_use]
pub fn unescape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('\\', Some(&next)) if next == '@' || next == '\\' => {
                out.push(next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

fn is_directive(key: &str) -> bool {
    key.starts_with('@') && key != LINK_KEY
}

/// Splits `map` into attributes, directives and index content.
#[must_use]
pub fn parse_node_index(map: &NodeMap) -> NodeIndex {
    let mut parsed = NodeIndex::default();
    if let Some(Value::Map(attrs)) = map.get(ATTRS) {
        parsed.attrs = attrs.clone();
    }
    let container = is_container_index(map);

    for (key, value) in map {
        if key == ATTRS {
            continue;
        }
        if is_directive(key) {
            if key == INDEX {
                parsed.attrs.insert(key.clone(), value.clone());
            } else {
                parsed.directives.insert(key.clone(), value.clone());
            }
        } else if container {
            parsed.escaped_index.insert(key.clone(), value.clone());
            parsed.index.insert(unescape_key(key), value.clone());
        } else {
            parsed.attrs.insert(unescape_key(key), value.clone());
        }
    }
    parsed
}

fn plain(map: &NodeMap, child: &dyn Fn(&Value) -> Value) -> NodeMap {
    let parsed = parse_node_index(map);
    let mut out: NodeMap = parsed
        .attrs
        .iter()
        .filter(|(key, _)| key.as_str() != INDEX)
        .map(|(key, value)| (key.clone(), child(value)))
        .collect();

    if is_container_index(map) {
        let content = parsed
            .index
            .iter()
            .map(|(key, value)| (key.clone(), child(value)));
        if out.is_empty() {
            out.extend(content);
        } else {
            let name = container_index_name(map, DEFAULT_INDEX_NAME).to_string();
            out.insert(name, Value::Map(content.collect()));
        }
    }
    out
}

fn linked(map: &NodeMap, child: &dyn Fn(&Value) -> Value) -> NodeMap {
    let parsed = parse_node_index(map);
    let mut out: NodeMap = parsed
        .directives
        .iter()
        .filter(|(key, _)| key.as_str() != CONTAINER)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    out.extend(
        parsed
            .attrs
            .iter()
            .filter(|(key, _)| key.as_str() != INDEX)
            .map(|(key, value)| (key.clone(), child(value))),
    );

    if is_container_index(map) {
        let name = container_index_name(map, DEFAULT_INDEX_NAME).to_string();
        let content = parsed
            .index
            .iter()
            .map(|(key, value)| (key.clone(), child(value)))
            .collect();
        out.insert(name, Value::Map(content));
    }
    out
}

fn map_values(value: &Value, node: fn(&NodeMap, &dyn Fn(&Value) -> Value) -> NodeMap) -> Value {
    match value {
        Value::Map(map) => Value::Map(node(map, &|child: &Value| map_values(child, node))),
        Value::List(items) => Value::List(items.iter().map(|item| map_values(item, node)).collect()),
        other => other.clone(),
    }
}

/// The plain view of one node; children are copied as they are.
#[must_use]
pub fn strip_directives(map: &NodeMap) -> NodeMap {
    plain(map, &Value::clone)
}

/// The plain view of every node in the tree.
#[must_use]
pub fn strip_directives_all(value: &Value) -> Value {
    map_values(value, plain)
}

/// The linked-data view of one node; children are copied as they are.
#[must_use]
pub fn to_linked_data(map: &NodeMap) -> NodeMap {
    linked(map, &Value::clone)
}

/// The linked-data view of every node in the tree.
#[must_use]
pub fn to_linked_data_all(value: &Value) -> Value {
    map_values(value, linked)
}
