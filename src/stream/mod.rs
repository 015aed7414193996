//! The push-style token protocol shared by every reader and writer.
//!
//! A [`NodeReader`] drives one depth-first pass over a tree, handing each
//! [`Token`] and the path it belongs to to a callback. The callback answers
//! with a [`Flow`]:
//!
//! - [`Flow::Continue`] keeps going
//! - [`Flow::Skip`] suppresses the scope that was just opened, or the child
//!   announced by a `Key`/`Index` token, while siblings are still read
//! - [`Flow::Abort`] stops the whole read; the reader reports success
//!
//! Returning an error stops the read and surfaces that error.
//!
//! ## Token order
//!
//! ```text
//! {"a": [true]}
//!
//! []          BeginNode
//! []          Key("a")
//! ["a"]       BeginArray
//! ["a"]       Index(0)
//! ["a", 0]    Value(true)
//! ["a"]       EndArray
//! []          EndNode
//! ```
//!
//! `Key` and `Index` carry the parent's path; every other token carries the
//! path of the value it describes. A skipped scope produces neither its
//! descendants nor its closing token.
//!
//! A [`NodeWriter`] is the dual. [`copy`] drives any reader into any writer,
//! which is how one codec is recoded into another without materializing the
//! tree.

pub mod iterator;
pub mod memory;
pub mod reader_at;

use crate::error::swallow_abort;
use crate::path::PathSegment;
use crate::{Error, Result, Value};

pub use iterator::{iterate, NodeIterator, ReadItem};
pub use memory::{record_tokens, ValueBuilder};
pub use reader_at::ReaderAt;

/// One event of the depth-first token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginNode,
    Key(String),
    BeginArray,
    Index(usize),
    /// A scalar child; never a list or a mapping.
    Value(Value),
    EndNode,
    EndArray,
}

impl Token {
    /// Name of the token kind, used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Token::BeginNode => "begin-node",
            Token::Key(_) => "key",
            Token::BeginArray => "begin-array",
            Token::Index(_) => "index",
            Token::Value(_) => "value",
            Token::EndNode => "end-node",
            Token::EndArray => "end-array",
        }
    }

    #[must_use]
    #[inline]
    pub const fn is_begin(&self) -> bool {
        matches!(self, Token::BeginNode | Token::BeginArray)
    }

    #[must_use]
    #[inline]
    pub const fn is_end(&self) -> bool {
        matches!(self, Token::EndNode | Token::EndArray)
    }
}

/// The callback's answer for the token it was just given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    Skip,
    Abort,
}

/// Callback type handed to [`NodeReader::read`].
pub type ReadFn<'a> = dyn FnMut(&[PathSegment], &Token) -> Result<Flow> + 'a;

/// A single-pass producer of tokens.
pub trait NodeReader {
    /// Emits the whole token stream into `f`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the source or by `f`. An abort
    /// requested by `f` is reported as `Ok(())`.
    fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()>;
}

impl<R: NodeReader + ?Sized> NodeReader for &mut R {
    fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        (**self).read(f)
    }
}

impl<R: NodeReader + ?Sized> NodeReader for Box<R> {
    fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        (**self).read(f)
    }
}

/// A consumer of tokens.
pub trait NodeWriter {
    fn write_begin_node(&mut self) -> Result<()>;
    fn write_node_key(&mut self, key: &str) -> Result<()>;
    fn write_begin_array(&mut self) -> Result<()>;
    fn write_value(&mut self, value: &Value) -> Result<()>;
    fn write_end_node(&mut self) -> Result<()>;
    fn write_end_array(&mut self) -> Result<()>;

    /// Dispatches one token. `Index` tokens carry no information for a
    /// writer and are ignored.
    fn write_token(&mut self, token: &Token) -> Result<()> {
        match token {
            Token::BeginNode => self.write_begin_node(),
            Token::Key(key) => self.write_node_key(key),
            Token::BeginArray => self.write_begin_array(),
            Token::Index(_) => Ok(()),
            Token::Value(value) => self.write_value(value),
            Token::EndNode => self.write_end_node(),
            Token::EndArray => self.write_end_array(),
        }
    }
}

/// Drives every token of `reader` into `writer`.
///
/// ```rust
/// use ipld_stream::stream::{copy, ValueBuilder};
/// use ipld_stream::ipld;
///
/// let tree = ipld!({"a": [1, 2], "b": "x"});
/// let mut builder = ValueBuilder::new();
/// copy(&mut &tree, &mut builder).unwrap();
/// assert_eq!(builder.finish().unwrap(), tree);
/// ```
///
/// # Errors
///
/// Returns the first error of either side.
pub fn copy<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
    R: NodeReader + ?Sized,
    W: NodeWriter + ?Sized,
{
    reader.read(&mut |_path, token| {
        writer.write_token(token)?;
        Ok(Flow::Continue)
    })
}

/// Scope bookkeeping shared by readers.
///
/// Tracks the current path and a stack of "callback enabled" flags, one per
/// open scope. Once a scope is skipped, nothing below it reaches the
/// callback, but the reader keeps calling the tracker so that its own input
/// is still consumed in order.
#[derive(Debug, Default)]
pub struct ScopeTracker {
    enabled: Vec<bool>,
    path: Vec<PathSegment>,
}

impl ScopeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while inside a skipped scope.
    #[must_use]
    #[inline]
    pub fn skipping(&self) -> bool {
        self.enabled.last().map_or(false, |enabled| !enabled)
    }

    #[must_use]
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    fn emit(&mut self, f: &mut ReadFn<'_>, token: &Token) -> Result<Flow> {
        if self.skipping() {
            return Ok(Flow::Skip);
        }
        match f(&self.path, token)? {
            Flow::Abort => Err(Error::Aborted),
            flow => Ok(flow),
        }
    }

    /// Emits `BeginNode` or `BeginArray` and opens its scope.
    pub fn open(&mut self, f: &mut ReadFn<'_>, token: Token) -> Result<()> {
        let flow = self.emit(f, &token)?;
        self.enabled.push(flow != Flow::Skip);
        Ok(())
    }

    /// Emits `EndNode` or `EndArray` if the scope was delivered, then closes it.
    pub fn close(&mut self, f: &mut ReadFn<'_>, token: Token) -> Result<()> {
        if self.enabled.pop().unwrap_or(false) {
            if let Flow::Abort = f(&self.path, &token)? {
                return Err(Error::Aborted);
            }
        }
        Ok(())
    }

    /// Emits `Key` at the parent path and enters the child's path.
    pub fn key(&mut self, f: &mut ReadFn<'_>, key: &str) -> Result<()> {
        let flow = self.emit(f, &Token::Key(key.to_string()))?;
        self.enabled.push(flow != Flow::Skip);
        self.path.push(PathSegment::Key(key.to_string()));
        Ok(())
    }

    /// Emits `Index` at the parent path and enters the element's path.
    pub fn index(&mut self, f: &mut ReadFn<'_>, index: usize) -> Result<()> {
        let flow = self.emit(f, &Token::Index(index))?;
        self.enabled.push(flow != Flow::Skip);
        self.path.push(PathSegment::Index(index));
        Ok(())
    }

    /// Leaves the child entered by [`key`](Self::key) or [`index`](Self::index).
    pub fn leave(&mut self) {
        self.enabled.pop();
        self.path.pop();
    }

    /// Emits a scalar `Value` at the current path.
    pub fn value(&mut self, f: &mut ReadFn<'_>, value: Value) -> Result<()> {
        self.emit(f, &Token::Value(value)).map(|_| ())
    }
}

/// Runs a reader body, turning a consumer abort into success.
pub(crate) fn finish_read(result: Result<()>) -> Result<()> {
    swallow_abort(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_on_key_suppresses_child_only() {
        let mut tracker = ScopeTracker::new();
        let mut seen = Vec::new();
        let mut f = |path: &[PathSegment], token: &Token| -> Result<Flow> {
            seen.push((path.len(), token.clone()));
            Ok(if token == &Token::Key("a".into()) {
                Flow::Skip
            } else {
                Flow::Continue
            })
        };

        tracker.open(&mut f, Token::BeginNode).unwrap();
        tracker.key(&mut f, "a").unwrap();
        tracker.value(&mut f, Value::from(1)).unwrap();
        tracker.leave();
        tracker.key(&mut f, "b").unwrap();
        tracker.value(&mut f, Value::from(2)).unwrap();
        tracker.leave();
        tracker.close(&mut f, Token::EndNode).unwrap();

        assert_eq!(
            seen,
            vec![
                (0, Token::BeginNode),
                (0, Token::Key("a".into())),
                (0, Token::Key("b".into())),
                (1, Token::Value(Value::from(2))),
                (0, Token::EndNode),
            ]
        );
    }

    #[test]
    fn test_skipped_scope_has_no_end_token() {
        let mut tracker = ScopeTracker::new();
        let mut seen = Vec::new();
        let mut f = |_: &[PathSegment], token: &Token| -> Result<Flow> {
            seen.push(token.clone());
            Ok(if token == &Token::BeginArray {
                Flow::Skip
            } else {
                Flow::Continue
            })
        };

        tracker.open(&mut f, Token::BeginNode).unwrap();
        tracker.key(&mut f, "list").unwrap();
        tracker.open(&mut f, Token::BeginArray).unwrap();
        tracker.index(&mut f, 0).unwrap();
        assert!(tracker.skipping());
        tracker.value(&mut f, Value::Null).unwrap();
        tracker.leave();
        tracker.close(&mut f, Token::EndArray).unwrap();
        tracker.leave();
        tracker.close(&mut f, Token::EndNode).unwrap();

        assert_eq!(
            seen,
            vec![
                Token::BeginNode,
                Token::Key("list".into()),
                Token::BeginArray,
                Token::EndNode
            ]
        );
    }

    #[test]
    fn test_abort_becomes_error_inside_and_success_outside() {
        let mut tracker = ScopeTracker::new();
        let mut f = |_: &[PathSegment], _: &Token| -> Result<Flow> { Ok(Flow::Abort) };
        let result = tracker.open(&mut f, Token::BeginNode);
        assert!(matches!(result, Err(Error::Aborted)));
        assert!(finish_read(result).is_ok());
    }
}
