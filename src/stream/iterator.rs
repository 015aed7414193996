//! Pull-style iteration over a push-style reader.
//!
//! The reader runs on its own thread and hands each token over a rendezvous
//! channel. It then blocks until the consumer answers with a [`Flow`], so at
//! most one token is in flight and the reader never runs ahead of the
//! consumer. Answers are sent lazily: the answer for an item goes out when
//! the next item is requested, defaulting to `Continue` unless
//! [`NodeIterator::skip`] or [`NodeIterator::abort`] changed it.
//!
//! ```rust
//! use ipld_stream::stream::{iterate, Token};
//! use ipld_stream::ipld;
//!
//! let mut tree = ipld!({"a": {"deep": [1, 2, 3]}, "b": "kept"});
//! let values = iterate(&mut tree, |it| {
//!     let mut values = Vec::new();
//!     while let Some(item) = it.advance() {
//!         match &item.token {
//!             Token::Key(k) if k == "a" => it.skip(),
//!             Token::Value(v) => values.push(v.clone()),
//!             _ => {}
//!         }
//!     }
//!     Ok(values)
//! })
//! .unwrap();
//! assert_eq!(values, vec![ipld!("kept")]);
//! ```

use super::{Flow, NodeReader, Token};
use crate::path::{flatten_path, PathSegment};
use crate::{Error, Result, Value};
use std::thread::JoinHandle;
use tracing::debug;

/// One token together with the path it was emitted at.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadItem {
    pub path: Vec<PathSegment>,
    pub token: Token,
}

impl ReadItem {
    /// The escaped, flattened form of [`path`](Self::path).
    #[must_use]
    pub fn string_path(&self) -> String {
        flatten_path(&self.path)
    }

    /// The scalar carried by a `Value` token.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match &self.token {
            Token::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The key carried by a `Key` token.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match &self.token {
            Token::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Text, or bytes that are valid UTF-8.
    #[must_use]
    pub fn to_str(&self) -> Option<&str> {
        match self.value()? {
            Value::Text(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Bytes, or the UTF-8 encoding of text.
    #[must_use]
    pub fn to_bytes(&self) -> Option<&[u8]> {
        match self.value()? {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        self.value().and_then(Value::as_i64)
    }

    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        self.value().and_then(Value::as_u64)
    }

    /// Floats, and integers a double holds exactly.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        self.value().and_then(Value::as_f64)
    }
}

enum Message {
    Item(ReadItem),
    Done(Result<()>),
}

/// Consumer side of the bridge.
///
/// Dropping the iterator aborts the reader and waits for its thread.
pub struct NodeIterator {
    items: flume::Receiver<Message>,
    replies: flume::Sender<Flow>,
    pending: Option<Flow>,
    done: bool,
    last_error: Option<Error>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for NodeIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIterator")
            .field("pending", &self.pending)
            .field("done", &self.done)
            .field("last_error", &self.last_error)
            .finish()
    }
}

struct Producer {
    items: flume::Sender<Message>,
    replies: flume::Receiver<Flow>,
}

impl Producer {
    fn run<R: NodeReader + ?Sized>(self, reader: &mut R) {
        let result = reader.read(&mut |path, token| {
            let item = ReadItem {
                path: path.to_vec(),
                token: token.clone(),
            };
            self.items
                .send(Message::Item(item))
                .map_err(|_| Error::Aborted)?;
            self.replies.recv().map_err(|_| Error::Aborted)
        });
        // A consumer that went away no longer wants the outcome.
        let _ = self.items.send(Message::Done(crate::error::swallow_abort(result)));
    }
}

impl NodeIterator {
    fn channel() -> (Self, Producer) {
        let (item_tx, item_rx) = flume::bounded(0);
        let (reply_tx, reply_rx) = flume::bounded(0);
        let iterator = NodeIterator {
            items: item_rx,
            replies: reply_tx,
            pending: None,
            done: false,
            last_error: None,
            handle: None,
        };
        let producer = Producer {
            items: item_tx,
            replies: reply_rx,
        };
        (iterator, producer)
    }

    /// Runs `reader` on a new thread and iterates its tokens.
    ///
    /// ```rust
    /// use ipld_stream::stream::{NodeIterator, Token};
    /// use ipld_stream::ipld;
    ///
    /// let mut it = NodeIterator::spawn(ipld!([1, 2]));
    /// assert_eq!(it.advance().unwrap().token, Token::BeginArray);
    /// it.close().unwrap();
    /// assert!(it.advance().is_none());
    /// ```
    pub fn spawn<R>(reader: R) -> Self
    where
        R: NodeReader + Send + 'static,
    {
        let (mut iterator, producer) = Self::channel();
        debug!("starting reader thread");
        iterator.handle = Some(std::thread::spawn(move || {
            let mut reader = reader;
            producer.run(&mut reader);
        }));
        iterator
    }

    /// Returns the next token, or `None` once the reader has finished.
    ///
    /// After `None`, [`error`](Self::error) reports whether the reader
    /// failed.
    pub fn advance(&mut self) -> Option<ReadItem> {
        if self.done {
            return None;
        }
        if let Some(flow) = self.pending.take() {
            if self.replies.send(flow).is_err() {
                self.finish_with(Ok(()));
                return None;
            }
        }
        match self.items.recv() {
            Ok(Message::Item(item)) => {
                self.pending = Some(Flow::Continue);
                Some(item)
            }
            Ok(Message::Done(result)) => {
                self.finish_with(result);
                None
            }
            Err(_) => {
                self.finish_with(Err(Error::custom("reader thread stopped unexpectedly")));
                None
            }
        }
    }

    /// Skips the scope opened by the last item, or the child its key or
    /// index announced. No effect on values and closing tokens.
    pub fn skip(&mut self) {
        if self.pending.is_some() {
            self.pending = Some(Flow::Skip);
        }
    }

    /// Stops the reader at the next [`advance`](Self::advance).
    pub fn abort(&mut self) {
        if self.pending.is_some() {
            self.pending = Some(Flow::Abort);
        }
    }

    /// Aborts the reader, waits for it to wind down and reports its outcome.
    ///
    /// # Errors
    ///
    /// Returns the reader's failure, if it had one before the abort landed.
    pub fn close(&mut self) -> Result<()> {
        if !self.done {
            debug!("draining reader");
        }
        while !self.done {
            self.abort();
            self.advance();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() && self.last_error.is_none() {
                self.last_error = Some(Error::custom("reader thread panicked"));
            }
        }
        self.last_error.clone().map_or(Ok(()), Err)
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The reader's failure, once it has finished.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Takes the reader's failure, leaving `Ok(())` behind.
    pub fn take_result(&mut self) -> Result<()> {
        self.last_error.take().map_or(Ok(()), Err)
    }

    fn finish_with(&mut self, result: Result<()>) {
        self.done = true;
        self.pending = None;
        if let Err(e) = result {
            self.last_error = Some(e);
        }
    }
}

impl Iterator for NodeIterator {
    type Item = ReadItem;

    fn next(&mut self) -> Option<ReadItem> {
        self.advance()
    }
}

impl Drop for NodeIterator {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Iterates a borrowed reader for the duration of `f`.
///
/// The reader runs on a scoped thread. Whatever `f` leaves unread is
/// aborted when it returns.
///
/// # Errors
///
/// Returns the error of `f` if it failed, otherwise the reader's.
pub fn iterate<R, F, T>(reader: &mut R, f: F) -> Result<T>
where
    R: NodeReader + Send + ?Sized,
    F: FnOnce(&mut NodeIterator) -> Result<T>,
{
    std::thread::scope(|scope| {
        let (mut iterator, producer) = NodeIterator::channel();
        scope.spawn(move || producer.run(reader));
        let out = f(&mut iterator);
        let read = iterator.close();
        let out = out?;
        read.map(|()| out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipld;
    use crate::stream::ReadFn;

    struct Failing;

    impl NodeReader for Failing {
        fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
            f(&[], &Token::BeginNode)?;
            Err(Error::malformed("test", "truncated"))
        }
    }

    #[test]
    fn test_items_and_paths() {
        let items: Vec<_> = NodeIterator::spawn(ipld!({"a": [7]})).collect();
        let rendered: Vec<_> = items
            .iter()
            .map(|i| (i.string_path(), i.token.name()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("".to_string(), "begin-node"),
                ("".to_string(), "key"),
                ("a".to_string(), "begin-array"),
                ("a".to_string(), "index"),
                ("a/0".to_string(), "value"),
                ("a".to_string(), "end-array"),
                ("".to_string(), "end-node"),
            ]
        );
        assert_eq!(items[4].to_i64(), Some(7));
    }

    #[test]
    fn test_reader_error_is_reported() {
        let mut it = NodeIterator::spawn(Failing);
        assert!(it.advance().is_some());
        assert!(it.advance().is_none());
        assert!(matches!(it.error(), Some(Error::MalformedWire { .. })));
    }

    #[test]
    fn test_abort_is_not_an_error() {
        let mut it = NodeIterator::spawn(ipld!([1, 2, 3]));
        it.advance();
        it.abort();
        assert!(it.advance().is_none());
        assert!(it.error().is_none());
    }

    #[test]
    fn test_scalar_conversions() {
        let item = ReadItem {
            path: vec![],
            token: Token::Value(Value::Bytes(b"hi".to_vec())),
        };
        assert_eq!(item.to_str(), Some("hi"));
        assert_eq!(item.to_bytes(), Some(&b"hi"[..]));
        assert_eq!(item.to_i64(), None);

        let item = ReadItem {
            path: vec![],
            token: Token::Value(Value::Uint(u64::MAX)),
        };
        assert_eq!(item.to_u64(), Some(u64::MAX));
        assert_eq!(item.to_i64(), None);
        assert_eq!(item.to_f64(), None);
    }

    #[test]
    fn test_iterate_prefers_callback_error() {
        let mut reader = Failing;
        let result: Result<()> = iterate(&mut reader, |it| {
            it.advance();
            Err(Error::custom("mine"))
        });
        assert!(matches!(result, Err(Error::Custom(ref m)) if m == "mine"));

        let result = iterate(&mut reader, |it| {
            while it.advance().is_some() {}
            Ok(())
        });
        assert!(matches!(result, Err(Error::MalformedWire { .. })));
    }
}
