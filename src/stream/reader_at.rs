//! A reader restricted to the subtree at a path.

use super::{finish_read, Flow, NodeReader, ReadFn, Token};
use crate::path::{split_path, PathSegment};
use crate::{Error, Result};

/// Forwards only the tokens under `prefix`, re-rooted at the subtree.
///
/// Children that cannot lead to the prefix are skipped without being
/// decoded into tokens, and the read stops as soon as the subtree has been
/// left.
///
/// ```rust
/// use ipld_stream::stream::ReaderAt;
/// use ipld_stream::{ipld, Value};
///
/// let tree = ipld!({"files": {"readme": {"size": 12}}, "other": [1, 2]});
/// let mut at = ReaderAt::from_str_path(&tree, "files/readme");
/// assert_eq!(Value::from_reader(&mut at).unwrap(), ipld!({"size": 12}));
/// ```
#[derive(Debug)]
pub struct ReaderAt<R> {
    inner: R,
    prefix: Vec<String>,
}

impl<R: NodeReader> ReaderAt<R> {
    pub fn new(inner: R, prefix: &[PathSegment]) -> Self {
        ReaderAt {
            inner,
            prefix: prefix.iter().map(ToString::to_string).collect(),
        }
    }

    /// Builds the prefix from a flattened, escaped path.
    pub fn from_str_path(inner: R, path: &str) -> Self {
        ReaderAt {
            inner,
            prefix: split_path(path),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn starts_with(path: &[PathSegment], prefix: &[String]) -> bool {
    path.len() >= prefix.len()
        && path
            .iter()
            .zip(prefix)
            .all(|(segment, expected)| segment_matches(segment, expected))
}

fn segment_matches(segment: &PathSegment, expected: &str) -> bool {
    match segment {
        PathSegment::Key(k) => k == expected,
        PathSegment::Index(i) => expected.parse::<usize>().map_or(false, |e| e == *i),
    }
}

impl<R: NodeReader> NodeReader for ReaderAt<R> {
    fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        let prefix = &self.prefix;
        let mut found = false;
        let result = self.inner.read(&mut |path, token| {
            if starts_with(path, prefix) {
                found = true;
                return f(&path[prefix.len()..], token);
            }
            if found {
                return Ok(Flow::Abort);
            }
            let depth = path.len();
            let toward_prefix = depth < prefix.len()
                && match token {
                    Token::Key(k) => k == &prefix[depth],
                    Token::Index(i) => segment_matches(&PathSegment::Index(*i), &prefix[depth]),
                    _ => true,
                };
            Ok(if toward_prefix {
                Flow::Continue
            } else {
                Flow::Skip
            })
        });
        finish_read(result)?;
        if found {
            Ok(())
        } else {
            Err(Error::not_found(&crate::path::join_path(prefix)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipld;
    use crate::stream::record_tokens;
    use crate::Value;

    #[test]
    fn test_scalar_at_path() {
        let tree = ipld!({"a": [10, {"b": "x"}]});
        let mut at = ReaderAt::from_str_path(&tree, "a/1/b");
        let tokens = record_tokens(&mut at).unwrap();
        assert_eq!(tokens, vec![("".to_string(), Token::Value(Value::from("x")))]);
    }

    #[test]
    fn test_escaped_prefix() {
        let tree = ipld!({"a/b": {"c": 1}, "a": {"b": {"c": 2}}});
        let mut at = ReaderAt::from_str_path(&tree, "a\\/b");
        assert_eq!(Value::from_reader(&mut at).unwrap(), ipld!({"c": 1}));
    }

    #[test]
    fn test_subtree_is_rerooted() {
        let tree = ipld!({"x": {"deep": 1}, "y": {"z": 2}});
        let mut calls = Vec::new();
        let mut counting = |path: &[PathSegment], token: &Token| -> Result<Flow> {
            calls.push((path.len(), token.clone()));
            Ok(Flow::Continue)
        };
        let mut at = ReaderAt::new(&tree, &[PathSegment::from("y")]);
        at.read(&mut counting).unwrap();
        assert_eq!(
            calls,
            vec![
                (0, Token::BeginNode),
                (0, Token::Key("z".into())),
                (1, Token::Value(Value::from(2))),
                (0, Token::EndNode),
            ]
        );
    }

    #[test]
    fn test_missing_prefix() {
        let tree = ipld!({"a": 1});
        let mut at = ReaderAt::from_str_path(&tree, "a/b");
        assert!(matches!(record_tokens(&mut at), Err(Error::NotFound(_))));
    }
}
