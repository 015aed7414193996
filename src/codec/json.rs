//! JSON decoding and encoding.
//!
//! Decoding walks `serde_json`'s deserializer with a visitor that turns each
//! JSON event into tokens as it is parsed, so a document is never
//! materialized. Non-negative integers become `Int` (or `Uint` above
//! `i64::MAX`), negative ones `Int`, anything with a fraction or exponent
//! `F64`. Skipped subtrees are still parsed, as [`IgnoredAny`].
//!
//! Encoding streams text. Byte strings have no JSON form and are written as
//! base64 text; they decode back as text.

use crate::codec::ByteSource;
use crate::stream::{copy, finish_read, NodeReader, NodeWriter, ReadFn, ScopeTracker, Token};
use crate::{Error, Result, Value};
use base64::Engine;
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::io::{Read, Seek, Write};

const CODEC: &str = "json";

/// Streams one JSON document as tokens.
#[derive(Debug)]
pub struct JsonDecoder<R> {
    source: ByteSource<R>,
}

impl<R: Read> JsonDecoder<R> {
    pub fn new(reader: R) -> Self {
        JsonDecoder {
            source: ByteSource::forward(reader),
        }
    }

    pub fn from_source(source: ByteSource<R>) -> Self {
        JsonDecoder { source }
    }
}

impl<R: Read + Seek> JsonDecoder<R> {
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the position cannot be queried.
    pub fn seekable(reader: R) -> Result<Self> {
        Ok(JsonDecoder {
            source: ByteSource::seekable(reader)?,
        })
    }
}

impl<R: Read> NodeReader for JsonDecoder<R> {
    fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        let input = self.source.begin()?;
        let mut de = serde_json::Deserializer::from_reader(input);
        let mut ctx = Ctx {
            tracker: ScopeTracker::new(),
            f,
            failure: None,
        };
        let outcome = NodeSeed { ctx: &mut ctx }.deserialize(&mut de);
        finish_read(match outcome {
            Ok(()) => de.end().map_err(|e| Error::malformed(CODEC, e)),
            Err(e) => Err(ctx
                .failure
                .take()
                .unwrap_or_else(|| Error::malformed(CODEC, e))),
        })
    }
}

/// Shared state of one decode. A failure raised on the token side is kept
/// here while `serde_json` unwinds with a placeholder error.
struct Ctx<'c, 'f> {
    tracker: ScopeTracker,
    f: &'c mut ReadFn<'f>,
    failure: Option<Error>,
}

impl Ctx<'_, '_> {
    fn lift<E: de::Error>(&mut self, result: Result<()>) -> std::result::Result<(), E> {
        result.map_err(|e| {
            self.failure = Some(e);
            E::custom("token stream stopped")
        })
    }

    fn value<E: de::Error>(&mut self, value: Value) -> std::result::Result<(), E> {
        let result = self.tracker.value(self.f, value);
        self.lift(result)
    }
}

struct NodeSeed<'a, 'c, 'f> {
    ctx: &'a mut Ctx<'c, 'f>,
}

impl<'de> DeserializeSeed<'de> for NodeSeed<'_, '_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        if self.ctx.tracker.skipping() {
            IgnoredAny::deserialize(deserializer)?;
            return Ok(());
        }
        deserializer.deserialize_any(NodeVisitor { ctx: self.ctx })
    }
}

/// Emits the `Index` token for an element once `serde_json` has found one.
struct ElementSeed<'a, 'c, 'f> {
    ctx: &'a mut Ctx<'c, 'f>,
    index: usize,
}

impl<'de> DeserializeSeed<'de> for ElementSeed<'_, '_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let result = self.ctx.tracker.index(self.ctx.f, self.index);
        self.ctx.lift(result)?;
        NodeSeed {
            ctx: &mut *self.ctx,
        }
        .deserialize(deserializer)?;
        self.ctx.tracker.leave();
        Ok(())
    }
}

struct NodeVisitor<'a, 'c, 'f> {
    ctx: &'a mut Ctx<'c, 'f>,
}

impl<'de> Visitor<'de> for NodeVisitor<'_, '_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<(), E> {
        self.ctx.value(Value::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<(), E> {
        self.ctx.value(Value::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<(), E> {
        self.ctx
            .value(i64::try_from(value).map_or(Value::Uint(value), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<(), E> {
        self.ctx.value(Value::F64(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<(), E> {
        self.ctx.value(Value::Text(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<(), E> {
        self.ctx.value(Value::Text(value))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<(), E> {
        self.ctx.value(Value::Null)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let ctx = self.ctx;
        let result = ctx.tracker.open(ctx.f, Token::BeginArray);
        ctx.lift(result)?;
        let mut index = 0;
        while seq
            .next_element_seed(ElementSeed {
                ctx: &mut *ctx,
                index,
            })?
            .is_some()
        {
            index += 1;
        }
        let result = ctx.tracker.close(ctx.f, Token::EndArray);
        ctx.lift(result)
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let ctx = self.ctx;
        let result = ctx.tracker.open(ctx.f, Token::BeginNode);
        ctx.lift(result)?;
        while let Some(key) = map.next_key::<String>()? {
            let result = ctx.tracker.key(ctx.f, &key);
            ctx.lift(result)?;
            map.next_value_seed(NodeSeed { ctx: &mut *ctx })?;
            ctx.tracker.leave();
        }
        let result = ctx.tracker.close(ctx.f, Token::EndNode);
        ctx.lift(result)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    is_map: bool,
    first: bool,
}

/// A [`NodeWriter`] streaming compact JSON text.
///
/// ```rust
/// use ipld_stream::codec::json::JsonWriter;
/// use ipld_stream::stream::copy;
/// use ipld_stream::ipld;
///
/// let tree = ipld!({"b": [1, "x"], "a": null});
/// let mut writer = JsonWriter::new(Vec::new());
/// copy(&mut &tree, &mut writer).unwrap();
/// let out = writer.finish().unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), r#"{"a":null,"b":[1,"x"]}"#);
/// ```
#[derive(Debug)]
pub struct JsonWriter<W> {
    out: W,
    frames: Vec<Frame>,
}

fn write_error(err: serde_json::Error) -> Error {
    Error::Io(err.to_string())
}

impl<W: Write> JsonWriter<W> {
    pub fn new(out: W) -> Self {
        JsonWriter {
            out,
            frames: Vec::new(),
        }
    }

    /// Returns the sink once every scope has been closed.
    ///
    /// # Errors
    ///
    /// Fails if a scope is still open.
    pub fn finish(self) -> Result<W> {
        if self.frames.is_empty() {
            Ok(self.out)
        } else {
            Err(Error::custom(format!(
                "json writer finished with {} open scope(s)",
                self.frames.len()
            )))
        }
    }

    /// Writes the comma in front of an array element.
    fn separate(&mut self) -> Result<()> {
        if let Some(frame) = self.frames.last_mut() {
            if !frame.is_map {
                if !frame.first {
                    self.out.write_all(b",")?;
                }
                frame.first = false;
            }
        }
        Ok(())
    }

    fn open(&mut self, is_map: bool) -> Result<()> {
        self.separate()?;
        self.out.write_all(if is_map { b"{" } else { b"[" })?;
        self.frames.push(Frame { is_map, first: true });
        Ok(())
    }

    fn close(&mut self, is_map: bool) -> Result<()> {
        match self.frames.pop() {
            Some(frame) if frame.is_map == is_map => {
                self.out.write_all(if is_map { b"}" } else { b"]" })?;
                Ok(())
            }
            _ => Err(Error::custom("json writer got an unbalanced closing token")),
        }
    }

    fn scalar<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, value).map_err(write_error)
    }
}

impl<W: Write> NodeWriter for JsonWriter<W> {
    fn write_begin_node(&mut self) -> Result<()> {
        self.open(true)
    }

    fn write_node_key(&mut self, key: &str) -> Result<()> {
        match self.frames.last_mut() {
            Some(frame) if frame.is_map => {
                if !frame.first {
                    self.out.write_all(b",")?;
                }
                frame.first = false;
            }
            _ => return Err(Error::custom(format!("key {:?} outside of a node", key))),
        }
        self.scalar(key)?;
        self.out.write_all(b":")?;
        Ok(())
    }

    fn write_begin_array(&mut self) -> Result<()> {
        self.open(false)
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        if matches!(value, Value::List(_) | Value::Map(_)) {
            let mut reader = value;
            return copy(&mut reader, self);
        }
        self.separate()?;
        match value {
            Value::Null => self.out.write_all(b"null")?,
            Value::Bool(b) => self.scalar(b)?,
            Value::Int(i) => self.scalar(i)?,
            Value::Uint(u) => self.scalar(u)?,
            Value::BigInt(b) => self.out.write_all(b.to_string().as_bytes())?,
            Value::F32(x) => self.scalar(x)?,
            Value::F64(x) => self.scalar(x)?,
            Value::Text(s) => self.scalar(s.as_str())?,
            Value::Bytes(b) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(b);
                self.scalar(encoded.as_str())?;
            }
            Value::List(_) | Value::Map(_) => {}
        }
        Ok(())
    }

    fn write_end_node(&mut self) -> Result<()> {
        self.close(true)
    }

    fn write_end_array(&mut self) -> Result<()> {
        self.close(false)
    }
}

/// Writes `value` as JSON, mapping keys in bytewise order.
///
/// # Errors
///
/// Returns [`Error::Io`] if the sink fails.
pub fn encode<W: Write>(w: W, value: &Value) -> Result<()> {
    let mut writer = JsonWriter::new(w);
    let mut reader = value;
    copy(&mut reader, &mut writer)?;
    writer.finish().map(|_| ())
}

/// Encodes `value` into a fresh buffer.
///
/// # Errors
///
/// Never fails for a well-formed tree; the signature mirrors [`encode`].
pub fn to_vec(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode(&mut out, value)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipld;
    use crate::stream::{record_tokens, Flow};
    use num_bigint::BigInt;

    fn decode(text: &str) -> Result<Value> {
        Value::from_reader(&mut JsonDecoder::new(text.as_bytes()))
    }

    #[test]
    fn test_number_disambiguation() {
        let v = decode(r#"[1, -2, 18446744073709551615, 1.5, 1e3]"#).unwrap();
        let list = v.as_list().unwrap();
        assert!(matches!(list[0], Value::Int(1)));
        assert!(matches!(list[1], Value::Int(-2)));
        assert!(matches!(list[2], Value::Uint(u64::MAX)));
        assert!(matches!(list[3], Value::F64(_)));
        assert!(matches!(list[4], Value::F64(_)));
    }

    #[test]
    fn test_token_order_follows_text() {
        let tokens = record_tokens(&mut JsonDecoder::new(&br#"{"z": [true], "a": null}"#[..]))
            .unwrap();
        assert_eq!(
            tokens,
            vec![
                ("".to_string(), Token::BeginNode),
                ("".to_string(), Token::Key("z".into())),
                ("z".to_string(), Token::BeginArray),
                ("z".to_string(), Token::Index(0)),
                ("z/0".to_string(), Token::Value(Value::Bool(true))),
                ("z".to_string(), Token::EndArray),
                ("".to_string(), Token::Key("a".into())),
                ("a".to_string(), Token::Value(Value::Null)),
                ("".to_string(), Token::EndNode),
            ]
        );
    }

    #[test]
    fn test_skip_consumes_subtree() {
        let text = br#"{"skip": {"x": [1, 2, {"y": 3}]}, "keep": "v"}"#;
        let mut seen = Vec::new();
        JsonDecoder::new(&text[..])
            .read(&mut |_, token| {
                seen.push(token.clone());
                Ok(if token == &Token::Key("skip".into()) {
                    Flow::Skip
                } else {
                    Flow::Continue
                })
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![
                Token::BeginNode,
                Token::Key("skip".into()),
                Token::Key("keep".into()),
                Token::Value(Value::from("v")),
                Token::EndNode,
            ]
        );
    }

    #[test]
    fn test_abort_and_callback_errors() {
        let text = br#"[1, 2, 3]"#;
        let mut count = 0;
        let result = JsonDecoder::new(&text[..]).read(&mut |_, _| {
            count += 1;
            Ok(if count == 2 { Flow::Abort } else { Flow::Continue })
        });
        assert!(result.is_ok());
        assert_eq!(count, 2);

        let result = JsonDecoder::new(&text[..]).read(&mut |_, _| Err(Error::custom("no")));
        assert!(matches!(result, Err(Error::Custom(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(decode("{\"a\": }"), Err(Error::MalformedWire { .. })));
        assert!(matches!(decode(""), Err(Error::MalformedWire { .. })));
    }

    #[test]
    fn test_trailing_bytes() {
        assert!(matches!(decode("[1] garbage"), Err(Error::MalformedWire { .. })));
        assert!(matches!(decode("{} {}"), Err(Error::MalformedWire { .. })));
        assert_eq!(decode("[1]\n  ").unwrap(), ipld!([1]));
    }

    #[test]
    fn test_abort_leaves_rest_unread() {
        let mut reader = JsonDecoder::new(&b"[1, 2] trailing"[..]);
        assert!(reader.read(&mut |_, _| Ok(Flow::Abort)).is_ok());
    }

    #[test]
    fn test_writer_values() {
        let big = BigInt::from(u64::MAX) * 10;
        let mut map = crate::NodeMap::new();
        map.insert("big".to_string(), Value::BigInt(big));
        map.insert("bytes".to_string(), Value::Bytes(vec![0, 1, 2]));
        map.insert("f".to_string(), Value::F32(1.1));
        map.insert("nested".to_string(), ipld!([[], {}]));
        let out = String::from_utf8(to_vec(&Value::Map(map)).unwrap()).unwrap();
        assert_eq!(
            out,
            r#"{"big":184467440737095516150,"bytes":"AAEC","f":1.1,"nested":[[],{}]}"#
        );
    }

    #[test]
    fn test_round_trip_through_writer() {
        let tree = ipld!({"a": [1, (-2), {"b": "c"}], "d": true, "e": 2.5});
        let bytes = to_vec(&tree).unwrap();
        assert_eq!(decode(std::str::from_utf8(&bytes).unwrap()).unwrap(), tree);
    }
}
