//! Reading a materialized tree as tokens, and building one back from tokens.

use super::{copy, finish_read, Flow, NodeReader, NodeWriter, ReadFn, ScopeTracker, Token};
use crate::{Error, NodeMap, Result, Value};

impl NodeReader for &Value {
    /// Mapping keys come out in bytewise order, matching the canonical
    /// encoders, so every reader of the same tree agrees on token order.
    fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        let mut tracker = ScopeTracker::new();
        finish_read(emit_value(&mut tracker, f, *self))
    }
}

impl NodeReader for Value {
    fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        let mut borrowed: &Value = self;
        borrowed.read(f)
    }
}

fn emit_value(tracker: &mut ScopeTracker, f: &mut ReadFn<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Map(map) => emit_map(tracker, f, map),
        Value::List(list) => {
            tracker.open(f, Token::BeginArray)?;
            if !tracker.skipping() {
                for (i, child) in list.iter().enumerate() {
                    tracker.index(f, i)?;
                    if !tracker.skipping() {
                        emit_value(tracker, f, child)?;
                    }
                    tracker.leave();
                }
            }
            tracker.close(f, Token::EndArray)
        }
        scalar => tracker.value(f, scalar.clone()),
    }
}

fn emit_map(tracker: &mut ScopeTracker, f: &mut ReadFn<'_>, map: &NodeMap) -> Result<()> {
    tracker.open(f, Token::BeginNode)?;
    if !tracker.skipping() {
        for (key, child) in map.sorted_entries() {
            tracker.key(f, key)?;
            if !tracker.skipping() {
                emit_value(tracker, f, child)?;
            }
            tracker.leave();
        }
    }
    tracker.close(f, Token::EndNode)
}

#[derive(Debug)]
enum Frame {
    Node { map: NodeMap, key: Option<String> },
    Array(Vec<Value>),
}

/// A [`NodeWriter`] that materializes the tokens it receives.
///
/// ```rust
/// use ipld_stream::stream::{NodeWriter, ValueBuilder};
/// use ipld_stream::{ipld, Value};
///
/// let mut builder = ValueBuilder::new();
/// builder.write_begin_node().unwrap();
/// builder.write_node_key("n").unwrap();
/// builder.write_value(&Value::from(1)).unwrap();
/// builder.write_end_node().unwrap();
/// assert_eq!(builder.finish().unwrap(), ipld!({"n": 1}));
/// ```
#[derive(Debug, Default)]
pub struct ValueBuilder {
    stack: Vec<Frame>,
    root: Option<Value>,
}

impl ValueBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed tree.
    ///
    /// # Errors
    ///
    /// Fails if no value was written or a scope is still open.
    pub fn finish(self) -> Result<Value> {
        if !self.stack.is_empty() {
            return Err(Error::custom(format!(
                "token stream ended with {} open scope(s)",
                self.stack.len()
            )));
        }
        self.root
            .ok_or_else(|| Error::custom("token stream produced no value"))
    }

    fn attach(&mut self, value: Value) -> Result<()> {
        match self.stack.last_mut() {
            None if self.root.is_none() => {
                self.root = Some(value);
                Ok(())
            }
            None => Err(Error::custom("token stream has more than one root")),
            Some(Frame::Array(list)) => {
                list.push(value);
                Ok(())
            }
            Some(Frame::Node { map, key }) => match key.take() {
                Some(key) => {
                    map.insert(key, value);
                    Ok(())
                }
                None => Err(Error::custom("value inside a node without a preceding key")),
            },
        }
    }
}

impl NodeWriter for ValueBuilder {
    fn write_begin_node(&mut self) -> Result<()> {
        self.stack.push(Frame::Node {
            map: NodeMap::new(),
            key: None,
        });
        Ok(())
    }

    fn write_node_key(&mut self, key: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Node { key: slot, .. }) => {
                *slot = Some(key.to_string());
                Ok(())
            }
            _ => Err(Error::custom(format!("key {:?} outside of a node", key))),
        }
    }

    fn write_begin_array(&mut self) -> Result<()> {
        self.stack.push(Frame::Array(Vec::new()));
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        self.attach(value.clone())
    }

    fn write_end_node(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Node { map, .. }) => self.attach(Value::Map(map)),
            _ => Err(Error::custom("end-node without a matching begin-node")),
        }
    }

    fn write_end_array(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Array(list)) => self.attach(Value::List(list)),
            _ => Err(Error::custom("end-array without a matching begin-array")),
        }
    }
}

impl Value {
    /// Materializes everything a reader produces.
    ///
    /// # Errors
    ///
    /// Returns the reader's error, or an error if its tokens are unbalanced.
    pub fn from_reader<R: NodeReader + ?Sized>(reader: &mut R) -> Result<Value> {
        let mut builder = ValueBuilder::new();
        copy(reader, &mut builder)?;
        builder.finish()
    }
}

/// Collects `(flattened path, token)` pairs; handy for inspecting streams.
pub fn record_tokens<R: NodeReader + ?Sized>(reader: &mut R) -> Result<Vec<(String, Token)>> {
    let mut out = Vec::new();
    reader.read(&mut |path, token| {
        out.push((crate::path::flatten_path(path), token.clone()));
        Ok(Flow::Continue)
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipld;
    use crate::path::PathSegment;

    #[test]
    fn test_keys_are_sorted_bytewise() {
        let tree = ipld!({"b": 1, "a": 2, "B": 3});
        let keys: Vec<_> = record_tokens(&mut &tree)
            .unwrap()
            .into_iter()
            .filter_map(|(_, t)| match t {
                Token::Key(k) => Some(k),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec!["B", "a", "b"]);
    }

    #[test]
    fn test_token_paths() {
        let tree = ipld!({"a": [true]});
        let tokens = record_tokens(&mut &tree).unwrap();
        assert_eq!(
            tokens,
            vec![
                ("".to_string(), Token::BeginNode),
                ("".to_string(), Token::Key("a".into())),
                ("a".to_string(), Token::BeginArray),
                ("a".to_string(), Token::Index(0)),
                ("a/0".to_string(), Token::Value(Value::Bool(true))),
                ("a".to_string(), Token::EndArray),
                ("".to_string(), Token::EndNode),
            ]
        );
    }

    #[test]
    fn test_skip_and_abort() {
        let tree = ipld!({"a": {"x": 1}, "b": 2, "c": 3});
        let mut seen = Vec::new();
        let mut reader = &tree;
        let result = reader.read(&mut |path: &[PathSegment], token: &Token| {
            seen.push(token.clone());
            Ok(match token {
                Token::Key(k) if k == "a" => Flow::Skip,
                Token::Value(_) if path == [PathSegment::from("b")] => Flow::Abort,
                _ => Flow::Continue,
            })
        });
        assert!(result.is_ok());
        assert_eq!(
            seen,
            vec![
                Token::BeginNode,
                Token::Key("a".into()),
                Token::Key("b".into()),
                Token::Value(Value::from(2)),
            ]
        );
    }

    #[test]
    fn test_builder_rejects_unbalanced_streams() {
        let mut builder = ValueBuilder::new();
        builder.write_begin_array().unwrap();
        assert!(builder.finish().is_err());

        let mut builder = ValueBuilder::new();
        assert!(builder.write_end_node().is_err());

        let mut builder = ValueBuilder::new();
        builder.write_begin_node().unwrap();
        assert!(builder.write_value(&Value::Null).is_err());
    }

    #[test]
    fn test_from_reader_round_trip() {
        let tree = ipld!({"z": [1, {"y": null}], "bytes": "b"});
        let mut reader = tree.clone();
        assert_eq!(Value::from_reader(&mut reader).unwrap(), tree);
    }
}
