//! Shared helpers for the integration tests.

#![allow(dead_code)]

use ipld_stream::path::flatten_path;
use ipld_stream::stream::{Flow, NodeReader, Token};
use ipld_stream::{ipld, Result, Value};

pub const H1: &str = "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo";
pub const H2: &str = "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPb";

pub type Event = (String, Token);

/// Records every token, answering `Skip` on keys named in `skip`.
pub fn record_skipping<R>(reader: &mut R, skip: &[&str]) -> Result<Vec<Event>>
where
    R: NodeReader + ?Sized,
{
    let mut events = Vec::new();
    reader.read(&mut |path, token| {
        events.push((flatten_path(path), token.clone()));
        Ok(match token {
            Token::Key(key) if skip.contains(&key.as_str()) => Flow::Skip,
            _ => Flow::Continue,
        })
    })?;
    Ok(events)
}

/// Records tokens until `limit` have been seen, then aborts.
pub fn record_until<R>(reader: &mut R, limit: usize) -> Result<Vec<Event>>
where
    R: NodeReader + ?Sized,
{
    let mut events = Vec::new();
    reader.read(&mut |path, token| {
        events.push((flatten_path(path), token.clone()));
        Ok(if events.len() >= limit {
            Flow::Abort
        } else {
            Flow::Continue
        })
    })?;
    Ok(events)
}

/// Asserts that `reader` emits exactly `expected`.
pub fn check_tokens<R>(reader: &mut R, expected: &[(&str, Token)])
where
    R: NodeReader + ?Sized,
{
    let events = record_skipping(reader, &[]).unwrap();
    let expected: Vec<Event> = expected
        .iter()
        .map(|(path, token)| (path.to_string(), token.clone()))
        .collect();
    assert_eq!(events, expected);
}

pub fn key(k: &str) -> Token {
    Token::Key(k.to_string())
}

pub fn value(v: impl Into<Value>) -> Token {
    Token::Value(v.into())
}

/// The node used by the round-trip examples.
pub fn sample_node() -> Value {
    ipld!({
        "foo": "bar",
        "baz": {"@link": H1, "size": 42}
    })
}

/// A node with links at several depths.
pub fn linked_tree() -> Value {
    ipld!({
        "name": "root",
        "links": [
            {"@link": H1, "name": "a", "size": 10},
            {"@link": H2, "name": "b", "size": 20}
        ],
        "meta": {"owner": {"@link": H2}, "tags": ["x", "y"]},
        "nested": {"@link": H1, "child": {"@link": H2}}
    })
}
