//! Binding token streams into typed records.
//!
//! A record type describes itself with a [`Schema`]: a table of slots, each
//! naming where a piece of the stream lands in the record.
//!
//! | Slot | Receives |
//! |---|---|
//! | [`multihash`](Schema::multihash) | the decoded hash of the node's `"@link"` |
//! | [`link`](Schema::link) | the raw `"@link"` string |
//! | [`name`](Schema::name) | the last component of the node's path |
//! | [`string_path`](Schema::string_path), [`path`](Schema::path) | the path to the node |
//! | [`key`](Schema::key) | the scalar under a key, converted losslessly |
//! | [`value`](Schema::value) | the subtree under a key, materialized |
//! | [`record`](Schema::record), [`records`](Schema::records) | a nested record, or a list of them |
//! | [`flatten`](Schema::flatten) | every slot of an embedded record |
//!
//! The first slot declared for a kind or a key wins. Keys without a slot are
//! skipped unread. A scalar that does not convert leaves its field at the
//! default; a scope where a record or a list of records must be fails with
//! [`Error::TypeMismatch`].
//!
//! ```rust
//! use ipld_stream::bind::{unmarshal, Bind, Schema, SimpleHashLink};
//! use ipld_stream::ipld;
//!
//! #[derive(Default)]
//! struct Node {
//!     links: Vec<SimpleHashLink>,
//!     data: String,
//! }
//!
//! impl Bind for Node {
//!     fn schema() -> Schema<Self> {
//!         Schema::<Self>::new()
//!             .records("links", |n| &mut n.links)
//!             .key("data", |n| &mut n.data)
//!     }
//! }
//!
//! let mut tree = ipld!({
//!     "links": [{"@link": "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo"}],
//!     "data": "foobar"
//! });
//! let node: Node = unmarshal(&mut tree).unwrap();
//! assert_eq!(node.links.len(), 1);
//! assert_eq!(node.data, "foobar");
//! ```

mod links;

pub use links::{read_links, BaseLink, SimpleHashLink, SimpleLink};

use crate::link::{decode_multihash, is_link_key, Hash};
use crate::path::{to_string_path, Path, PathSegment};
use crate::stream::{iterate, NodeIterator, NodeReader, NodeWriter, ReadItem, Token, ValueBuilder};
use crate::{Error, Result, Value};
use num_bigint::BigInt;
use std::fmt;
use tracing::trace;

type Setter<T, A> = Box<dyn Fn(&mut T, A) + Send + Sync>;
type Filler<T> = Box<dyn Fn(&mut T, &mut NodeIterator, ReadItem) -> Result<()> + Send + Sync>;

/// A record that can be bound from a token stream.
pub trait Bind: Default + Send + 'static {
    fn schema() -> Schema<Self>;
}

/// The slot table of a record type.
pub struct Schema<T> {
    multihash: Option<Setter<T, Hash>>,
    link: Option<Setter<T, String>>,
    name: Option<Setter<T, String>>,
    string_path: Option<Setter<T, Vec<String>>>,
    path: Option<Setter<T, Path>>,
    keys: Vec<(String, Filler<T>)>,
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("multihash", &self.multihash.is_some())
            .field("link", &self.link.is_some())
            .field("name", &self.name.is_some())
            .field("string_path", &self.string_path.is_some())
            .field("path", &self.path.is_some())
            .field("keys", &self.keys.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

impl<T: 'static> Default for Schema<T> {
    fn default() -> Self {
        Schema {
            multihash: None,
            link: None,
            name: None,
            string_path: None,
            path: None,
            keys: Vec::new(),
        }
    }
}

fn setter<T: 'static, A: 'static>(field: fn(&mut T) -> &mut A) -> Setter<T, A> {
    Box::new(move |record: &mut T, value: A| *field(record) = value)
}

fn lift<T: 'static, B: 'static, A: 'static>(
    field: fn(&mut T) -> &mut B,
    inner: Setter<B, A>,
) -> Setter<T, A> {
    Box::new(move |record: &mut T, value: A| inner(field(record), value))
}

impl<T: 'static> Schema<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn multihash(mut self, field: fn(&mut T) -> &mut Hash) -> Self {
        self.multihash.get_or_insert_with(|| setter(field));
        self
    }

    #[must_use]
    pub fn link(mut self, field: fn(&mut T) -> &mut String) -> Self {
        self.link.get_or_insert_with(|| setter(field));
        self
    }

    #[must_use]
    pub fn name(mut self, field: fn(&mut T) -> &mut String) -> Self {
        self.name.get_or_insert_with(|| setter(field));
        self
    }

    /// Receives the path with every segment rendered as a string.
    #[must_use]
    pub fn string_path(mut self, field: fn(&mut T) -> &mut Vec<String>) -> Self {
        self.string_path.get_or_insert_with(|| setter(field));
        self
    }

    #[must_use]
    pub fn path(mut self, field: fn(&mut T) -> &mut Path) -> Self {
        self.path.get_or_insert_with(|| setter(field));
        self
    }

    /// A scalar under `key`. A scope under the key is skipped.
    #[must_use]
    pub fn key<V: FromScalar + 'static>(self, key: &str, field: fn(&mut T) -> &mut V) -> Self {
        self.slot(
            key,
            Box::new(move |record: &mut T, it: &mut NodeIterator, first: ReadItem| {
                if let Some(value) = scalar::<V>(it, &first)? {
                    *field(record) = value;
                }
                Ok(())
            }),
        )
    }

    /// Whatever is under `key`, as a [`Value`].
    #[must_use]
    pub fn value(self, key: &str, field: fn(&mut T) -> &mut Value) -> Self {
        self.slot(
            key,
            Box::new(move |record: &mut T, it: &mut NodeIterator, first: ReadItem| {
                *field(record) = subtree(it, first)?;
                Ok(())
            }),
        )
    }

    /// A nested record under `key`; `null` leaves it at its default.
    #[must_use]
    pub fn record<U: Bind>(self, key: &str, field: fn(&mut T) -> &mut U) -> Self {
        self.slot(
            key,
            Box::new(move |record: &mut T, it: &mut NodeIterator, first: ReadItem| match &first.token {
                Token::BeginNode => {
                    *field(record) = bind_node(it, &U::schema(), &first)?;
                    Ok(())
                }
                Token::Value(Value::Null) => Ok(()),
                _ => Err(mismatch(&first, "node")),
            }),
        )
    }

    /// A list of records under `key`, in stream order.
    #[must_use]
    pub fn records<U: Bind>(self, key: &str, field: fn(&mut T) -> &mut Vec<U>) -> Self {
        self.slot(
            key,
            Box::new(move |record: &mut T, it: &mut NodeIterator, first: ReadItem| bind_records(it, &first, field(record))),
        )
    }

    /// Every slot of an embedded record, bound through `field`.
    #[must_use]
    pub fn flatten<B: Bind>(mut self, field: fn(&mut T) -> &mut B) -> Self {
        let inner = B::schema();
        if let Some(set) = inner.multihash {
            self.multihash.get_or_insert_with(|| lift(field, set));
        }
        if let Some(set) = inner.link {
            self.link.get_or_insert_with(|| lift(field, set));
        }
        if let Some(set) = inner.name {
            self.name.get_or_insert_with(|| lift(field, set));
        }
        if let Some(set) = inner.string_path {
            self.string_path.get_or_insert_with(|| lift(field, set));
        }
        if let Some(set) = inner.path {
            self.path.get_or_insert_with(|| lift(field, set));
        }
        for (key, fill) in inner.keys {
            self = self.slot(
                &key,
                Box::new(move |record: &mut T, it: &mut NodeIterator, first: ReadItem| fill(field(record), it, first)),
            );
        }
        self
    }

    fn slot(mut self, key: &str, fill: Filler<T>) -> Self {
        if !self.keys.iter().any(|(k, _)| k == key) {
            self.keys.push((key.to_string(), fill));
        }
        self
    }

    /// Whether the record can hold a link target.
    #[must_use]
    pub fn has_link_slot(&self) -> bool {
        self.link.is_some() || self.multihash.is_some()
    }

    pub(crate) fn filler(&self, key: &str) -> Option<&Filler<T>> {
        self.keys.iter().find(|(k, _)| k == key).map(|(_, fill)| fill)
    }

    /// Fills the position slots for a node at `path`.
    pub(crate) fn place(&self, record: &mut T, path: &[PathSegment]) {
        let strings = to_string_path(path);
        if let Some(set) = &self.name {
            set(record, strings.last().cloned().unwrap_or_default());
        }
        if let Some(set) = &self.path {
            set(record, path.to_vec());
        }
        if let Some(set) = &self.string_path {
            set(record, strings);
        }
    }

    /// Fills the link slots; returns whether any took the target.
    pub(crate) fn place_link(&self, record: &mut T, target: &str) -> bool {
        let mut placed = false;
        if let Some(set) = &self.link {
            set(record, target.to_string());
            placed = true;
        }
        if let Some(set) = &self.multihash {
            match decode_multihash(target) {
                Ok(hash) => {
                    set(record, hash);
                    placed = true;
                }
                Err(e) => trace!(%target, error = %e, "link is not a multihash"),
            }
        }
        placed
    }
}

/// Lossless conversion out of a scalar [`Value`].
pub trait FromScalar: Sized {
    fn from_scalar(value: &Value) -> Option<Self>;
}

fn integral_float(value: &Value) -> Option<i128> {
    let f = match value {
        Value::F32(f) => f64::from(*f),
        Value::F64(f) => *f,
        _ => return None,
    };
    let in_range = f >= -1.7e38 && f <= 1.7e38;
    (f.fract() == 0.0 && in_range).then(|| f as i128)
}

macro_rules! from_scalar_int {
    ($($t:ty),*) => {
        $(impl FromScalar for $t {
            fn from_scalar(value: &Value) -> Option<Self> {
                if let Some(b) = value.to_bigint() {
                    <$t>::try_from(b).ok()
                } else {
                    integral_float(value).and_then(|i| <$t>::try_from(i).ok())
                }
            }
        })*
    };
}

from_scalar_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl FromScalar for f64 {
    fn from_scalar(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromScalar for f32 {
    fn from_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::F32(f) => Some(*f),
            _ => {
                let f = value.as_f64()?;
                let narrow = f as f32;
                (f64::from(narrow) == f || f.is_nan()).then_some(narrow)
            }
        }
    }
}

impl FromScalar for bool {
    fn from_scalar(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromScalar for String {
    fn from_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
            _ => None,
        }
    }
}

impl FromScalar for Vec<u8> {
    fn from_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::Bytes(b) => Some(b.clone()),
            Value::Text(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        }
    }
}

impl FromScalar for BigInt {
    fn from_scalar(value: &Value) -> Option<Self> {
        value.to_bigint()
    }
}

impl FromScalar for Value {
    fn from_scalar(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<V: FromScalar> FromScalar for Option<V> {
    fn from_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => V::from_scalar(other).map(Some),
        }
    }
}

pub(crate) fn next_item(it: &mut NodeIterator) -> Result<ReadItem> {
    it.advance().ok_or_else(|| {
        it.take_result()
            .err()
            .unwrap_or_else(|| Error::custom("token stream ended inside a scope"))
    })
}

fn mismatch(item: &ReadItem, expected: &str) -> Error {
    let found = match &item.token {
        Token::Value(v) => v.kind(),
        other => other.name(),
    };
    Error::type_mismatch(&item.string_path(), expected, found)
}

fn scalar<V: FromScalar>(it: &mut NodeIterator, first: &ReadItem) -> Result<Option<V>> {
    match &first.token {
        Token::Value(value) => {
            let converted = V::from_scalar(value);
            if converted.is_none() {
                trace!(path = %first.string_path(), kind = value.kind(), "scalar left at default");
            }
            Ok(converted)
        }
        Token::BeginNode | Token::BeginArray => {
            it.skip();
            Ok(None)
        }
        _ => Err(mismatch(first, "value")),
    }
}

/// Materializes the value that starts with `first`.
fn subtree(it: &mut NodeIterator, first: ReadItem) -> Result<Value> {
    let mut builder = ValueBuilder::new();
    let mut depth = 0usize;
    let mut item = first;
    loop {
        if item.token.is_begin() {
            depth += 1;
        } else if item.token.is_end() {
            depth = depth
                .checked_sub(1)
                .ok_or_else(|| mismatch(&item, "value"))?;
        }
        builder.write_token(&item.token)?;
        if depth == 0 {
            return builder.finish();
        }
        item = next_item(it)?;
    }
}

/// Binds the node opened by `first`, reading up to its `EndNode`.
pub(crate) fn bind_node<T>(it: &mut NodeIterator, schema: &Schema<T>, first: &ReadItem) -> Result<T>
where
    T: Default + 'static,
{
    let mut record = T::default();
    schema.place(&mut record, &first.path);
    loop {
        let item = next_item(it)?;
        match &item.token {
            Token::EndNode => return Ok(record),
            Token::Key(key) if is_link_key(key) => {
                let value = next_item(it)?;
                match &value.token {
                    Token::Value(Value::Text(target)) => {
                        schema.place_link(&mut record, target);
                    }
                    Token::Value(_) => {}
                    _ => it.skip(),
                }
            }
            Token::Key(key) => match schema.filler(key) {
                Some(fill) => {
                    let value = next_item(it)?;
                    fill(&mut record, it, value)?;
                }
                None => it.skip(),
            },
            _ => return Err(mismatch(&item, "key")),
        }
    }
}

fn bind_records<U: Bind>(it: &mut NodeIterator, first: &ReadItem, out: &mut Vec<U>) -> Result<()> {
    match &first.token {
        Token::BeginArray => {}
        Token::Value(Value::Null) => return Ok(()),
        _ => return Err(mismatch(first, "list")),
    }
    let schema = U::schema();
    loop {
        let item = next_item(it)?;
        match &item.token {
            Token::EndArray => return Ok(()),
            Token::Index(_) => {
                let element = next_item(it)?;
                match &element.token {
                    Token::BeginNode => out.push(bind_node(it, &schema, &element)?),
                    _ => return Err(mismatch(&element, "node")),
                }
            }
            _ => return Err(mismatch(&item, "index")),
        }
    }
}

/// Binds the node at the root of `reader`.
///
/// # Errors
///
/// [`Error::TypeMismatch`] if the root is not a node or a structural slot
/// meets the wrong kind of scope; any error of the reader.
pub fn unmarshal<T, R>(reader: &mut R) -> Result<T>
where
    T: Bind,
    R: NodeReader + Send + ?Sized,
{
    iterate(reader, |it| {
        let first = next_item(it)?;
        match first.token {
            Token::BeginNode => bind_node(it, &T::schema(), &first),
            _ => Err(mismatch(&first, "node")),
        }
    })
}

/// [`unmarshal`] over a materialized tree.
///
/// # Errors
///
/// See [`unmarshal`].
pub fn bind_value<T: Bind>(value: &Value) -> Result<T> {
    let mut reader = value;
    unmarshal(&mut reader)
}
