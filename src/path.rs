//! Paths into a tree and their flattened string form.
//!
//! A path is a sequence of [`PathSegment`]s: mapping keys or sequence
//! indices. The flattened form joins components with `/`, escaping a literal
//! backslash as `\\` and a literal slash as `\/`, so keys containing either
//! character survive a round trip.
//!
//! ```rust
//! use ipld_stream::path::{join_path, split_path};
//!
//! let flat = join_path(&["files", "bar/ra\\b"]);
//! assert_eq!(flat, "files/bar\\/ra\\\\b");
//! assert_eq!(split_path(&flat), vec!["files", "bar/ra\\b"]);
//! ```

use std::fmt;

/// One step of a path: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

pub type Path = Vec<PathSegment>;

impl PathSegment {
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(k) => Some(k),
            PathSegment::Index(_) => None,
        }
    }

    #[must_use]
    pub const fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Key(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Key(value.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(value: String) -> Self {
        PathSegment::Key(value)
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

/// Escapes `\` then `/` in a single component.
#[must_use]
pub fn escape_component(component: &str) -> String {
    component.replace('\\', "\\\\").replace('/', "\\/")
}

/// Joins components with `/`, escaping each one.
#[must_use]
pub fn join_path<S: AsRef<str>>(components: &[S]) -> String {
    components
        .iter()
        .map(|c| escape_component(c.as_ref()))
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits a flattened path on unescaped `/`.
///
/// A backslash makes the next character literal. Empty components from
/// leading, trailing or doubled separators are dropped.
#[must_use]
pub fn split_path(path: &str) -> Vec<String> {
    let mut components = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in path.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '/' {
            if !current.is_empty() {
                components.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    if !current.is_empty() {
        components.push(current);
    }
    components
}

/// Renders every segment as a string; indices become decimal digits.
#[must_use]
pub fn to_string_path(path: &[PathSegment]) -> Vec<String> {
    path.iter().map(ToString::to_string).collect()
}

/// Flattens a native path into its escaped string form.
#[must_use]
pub fn flatten_path(path: &[PathSegment]) -> String {
    join_path(&to_string_path(path))
}

/// Parses a flattened path into key segments.
///
/// Segments are always keys here; lookups accept a numeric key on a sequence.
#[must_use]
pub fn parse_path(path: &str) -> Path {
    split_path(path).into_iter().map(PathSegment::Key).collect()
}
