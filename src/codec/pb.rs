//! The legacy merkledag protobuf record.
//!
//! ```text
//! message PBLink { optional bytes Hash = 1; optional string Name = 2; optional uint64 Tsize = 3; }
//! message PBNode { repeated PBLink Links = 2; optional bytes Data = 1; }
//! ```
//!
//! A decoded node has the shape
//! `{"data": bytes, "links": [{"@link": base58(hash), "name": .., "size": ..}]}`.
//! The encoder also accepts the older
//! `{"data", "named-links": {name: link}, "ordered-links": [name | link]}`
//! layout, see [`fold_named_links`].
//!
//! On a byte stream the record is framed msgio style, behind a 4-byte
//! big-endian length.

use crate::codec::ByteSource;
use crate::link::{decode_multihash, LINK_KEY};
use crate::stream::{
    finish_read, NodeReader, NodeWriter, ReadFn, ScopeTracker, Token, ValueBuilder,
};
use crate::{Error, NodeMap, Result, Value};
use std::collections::HashSet;
use std::io::{Read, Seek, Write};
use tracing::warn;

const CODEC: &str = "protobuf";

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

pub const DATA_KEY: &str = "data";
pub const LINKS_KEY: &str = "links";
pub const NAMED_LINKS_KEY: &str = "named-links";
pub const ORDERED_LINKS_KEY: &str = "ordered-links";

#[derive(Debug, Default, Clone, PartialEq)]
struct PbLink {
    hash: Vec<u8>,
    name: Option<String>,
    size: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct PbNode {
    data: Option<Vec<u8>>,
    links: Vec<PbLink>,
}

struct Wire<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Wire<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Wire { buf, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| Error::malformed(CODEC, "truncated varint"))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::malformed(CODEC, "varint overflows 64 bits"))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| Error::malformed(CODEC, "field runs past the end of the message"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn len_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.varint()?;
        let len = usize::try_from(len).map_err(|e| Error::malformed(CODEC, e))?;
        self.take(len)
    }

    fn key(&mut self) -> Result<(u64, u8)> {
        let key = self.varint()?;
        Ok((key >> 3, (key & 0x7) as u8))
    }

    fn skip(&mut self, wire_type: u8) -> Result<()> {
        match wire_type {
            WIRE_VARINT => self.varint().map(|_| ()),
            WIRE_FIXED64 => self.take(8).map(|_| ()),
            WIRE_LEN => self.len_delimited().map(|_| ()),
            WIRE_FIXED32 => self.take(4).map(|_| ()),
            other => Err(Error::malformed(
                CODEC,
                format!("unsupported wire type {}", other),
            )),
        }
    }
}

fn expect_len(field: u64, wire_type: u8) -> Result<()> {
    if wire_type == WIRE_LEN {
        Ok(())
    } else {
        Err(Error::malformed(
            CODEC,
            format!("field {} has wire type {}", field, wire_type),
        ))
    }
}

fn parse_link(buf: &[u8]) -> Result<PbLink> {
    let mut wire = Wire::new(buf);
    let mut link = PbLink::default();
    while !wire.done() {
        match wire.key()? {
            (1, wire_type) => {
                expect_len(1, wire_type)?;
                link.hash = wire.len_delimited()?.to_vec();
            }
            (2, wire_type) => {
                expect_len(2, wire_type)?;
                let name = std::str::from_utf8(wire.len_delimited()?)
                    .map_err(|e| Error::malformed(CODEC, e))?;
                link.name = Some(name.to_string());
            }
            (3, WIRE_VARINT) => link.size = Some(wire.varint()?),
            (_, wire_type) => wire.skip(wire_type)?,
        }
    }
    Ok(link)
}

fn parse_node(buf: &[u8]) -> Result<PbNode> {
    let mut wire = Wire::new(buf);
    let mut node = PbNode::default();
    while !wire.done() {
        match wire.key()? {
            (1, wire_type) => {
                expect_len(1, wire_type)?;
                node.data = Some(wire.len_delimited()?.to_vec());
            }
            (2, wire_type) => {
                expect_len(2, wire_type)?;
                node.links.push(parse_link(wire.len_delimited()?)?);
            }
            (_, wire_type) => wire.skip(wire_type)?,
        }
    }
    Ok(node)
}

fn emit_entry(
    tracker: &mut ScopeTracker,
    f: &mut ReadFn<'_>,
    key: &str,
    value: Value,
) -> Result<()> {
    tracker.key(f, key)?;
    tracker.value(f, value)?;
    tracker.leave();
    Ok(())
}

fn emit_link(tracker: &mut ScopeTracker, f: &mut ReadFn<'_>, link: &PbLink) -> Result<()> {
    tracker.open(f, Token::BeginNode)?;
    let target = bs58::encode(&link.hash).into_string();
    emit_entry(tracker, f, LINK_KEY, Value::Text(target))?;
    if let Some(name) = &link.name {
        emit_entry(tracker, f, "name", Value::Text(name.clone()))?;
    }
    if let Some(size) = link.size {
        emit_entry(tracker, f, "size", Value::from(size))?;
    }
    tracker.close(f, Token::EndNode)
}

fn emit_node(
    tracker: &mut ScopeTracker,
    f: &mut ReadFn<'_>,
    node: &PbNode,
    legacy_shape: bool,
) -> Result<()> {
    tracker.open(f, Token::BeginNode)?;
    let data = node.data.clone().unwrap_or_default();
    emit_entry(tracker, f, DATA_KEY, Value::Bytes(data))?;
    if legacy_shape {
        emit_legacy_links(tracker, f, &node.links)?;
    } else {
        tracker.key(f, LINKS_KEY)?;
        tracker.open(f, Token::BeginArray)?;
        for (i, link) in node.links.iter().enumerate() {
            tracker.index(f, i)?;
            emit_link(tracker, f, link)?;
            tracker.leave();
        }
        tracker.close(f, Token::EndArray)?;
        tracker.leave();
    }
    tracker.close(f, Token::EndNode)
}

/// The older layout: links by name, plus their order. A name seen twice
/// keeps its first link in `named-links`; later ones go into
/// `ordered-links` whole.
fn emit_legacy_links(
    tracker: &mut ScopeTracker,
    f: &mut ReadFn<'_>,
    links: &[PbLink],
) -> Result<()> {
    let mut seen = HashSet::new();
    let first: Vec<bool> = links
        .iter()
        .map(|link| seen.insert(link.name.as_deref().unwrap_or_default()))
        .collect();

    tracker.key(f, NAMED_LINKS_KEY)?;
    tracker.open(f, Token::BeginNode)?;
    for (link, _) in links.iter().zip(&first).filter(|(_, first)| **first) {
        tracker.key(f, link.name.as_deref().unwrap_or_default())?;
        emit_link(tracker, f, link)?;
        tracker.leave();
    }
    tracker.close(f, Token::EndNode)?;
    tracker.leave();

    tracker.key(f, ORDERED_LINKS_KEY)?;
    tracker.open(f, Token::BeginArray)?;
    for (i, (link, first)) in links.iter().zip(&first).enumerate() {
        tracker.index(f, i)?;
        if *first {
            let name = link.name.clone().unwrap_or_default();
            tracker.value(f, Value::Text(name))?;
        } else {
            emit_link(tracker, f, link)?;
        }
        tracker.leave();
    }
    tracker.close(f, Token::EndArray)?;
    tracker.leave();
    Ok(())
}

/// Reads one protobuf node, framed or raw.
#[derive(Debug)]
pub struct PbDecoder<R> {
    source: ByteSource<R>,
    framed: bool,
    legacy_shape: bool,
}

impl<R: Read> PbDecoder<R> {
    /// A decoder for a msgio-framed record.
    pub fn new(reader: R) -> Self {
        Self::from_source(ByteSource::forward(reader), true)
    }

    /// A decoder for a bare record filling the whole input.
    pub fn raw(reader: R) -> Self {
        Self::from_source(ByteSource::forward(reader), false)
    }

    pub fn from_source(source: ByteSource<R>, framed: bool) -> Self {
        PbDecoder {
            source,
            framed,
            legacy_shape: false,
        }
    }

    /// Emit the `named-links`/`ordered-links` layout instead of `links`.
    #[must_use]
    pub fn legacy_shape(mut self, legacy: bool) -> Self {
        self.legacy_shape = legacy;
        self
    }

    fn message(&mut self) -> Result<Vec<u8>> {
        let framed = self.framed;
        let input = self.source.begin()?;
        let mut buf = Vec::new();
        if framed {
            let mut len = [0u8; 4];
            input
                .read_exact(&mut len)
                .map_err(|e| Error::malformed(CODEC, e))?;
            let len = u64::from(u32::from_be_bytes(len));
            let read = input.take(len).read_to_end(&mut buf)?;
            if read as u64 != len {
                return Err(Error::malformed(CODEC, "message shorter than its frame"));
            }
        } else {
            input.read_to_end(&mut buf)?;
        }
        Ok(buf)
    }
}

impl<R: Read + Seek> PbDecoder<R> {
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the position cannot be queried.
    pub fn seekable(reader: R) -> Result<Self> {
        Ok(Self::from_source(ByteSource::seekable(reader)?, true))
    }
}

impl<R: Read> NodeReader for PbDecoder<R> {
    fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        let buf = self.message()?;
        let node = parse_node(&buf)?;
        let mut tracker = ScopeTracker::new();
        finish_read(emit_node(&mut tracker, f, &node, self.legacy_shape))
    }
}

fn reject(strict: bool, msg: String) -> Result<()> {
    if strict {
        warn!(%msg, "rejecting node for protobuf encoding");
        Err(Error::schema(msg))
    } else {
        warn!(%msg, "dropping field from protobuf encoding");
        Ok(())
    }
}

/// Converts the `named-links`/`ordered-links` layout to the `links` one.
///
/// Each `ordered-links` entry is either the name of a link in `named-links`
/// or a whole link. A looked-up link gets its name filled in if it has none.
///
/// # Errors
///
/// Returns [`Error::SchemaViolation`] if either key is missing or has the
/// wrong shape, or a name has no link.
pub fn fold_named_links(map: &NodeMap) -> Result<NodeMap> {
    let named = map
        .get(NAMED_LINKS_KEY)
        .and_then(Value::as_map)
        .ok_or_else(|| Error::schema("named-links must be a mapping"))?;
    let ordered = map
        .get(ORDERED_LINKS_KEY)
        .and_then(Value::as_list)
        .ok_or_else(|| Error::schema("ordered-links must be a list"))?;

    let mut links = Vec::with_capacity(ordered.len());
    for (i, entry) in ordered.iter().enumerate() {
        match entry {
            Value::Text(name) => {
                let mut link = named
                    .get(name)
                    .and_then(Value::as_map)
                    .cloned()
                    .ok_or_else(|| {
                        Error::schema(format!("ordered link #{} names missing link {:?}", i, name))
                    })?;
                if !link.contains_key("name") {
                    link.insert("name".to_string(), Value::Text(name.clone()));
                }
                links.push(Value::Map(link));
            }
            Value::Map(link) => links.push(Value::Map(link.clone())),
            other => {
                return Err(Error::schema(format!(
                    "ordered link #{} is a {}",
                    i,
                    other.kind()
                )))
            }
        }
    }

    let mut out = NodeMap::with_capacity(2);
    if let Some(data) = map.get(DATA_KEY) {
        out.insert(DATA_KEY.to_string(), data.clone());
    }
    out.insert(LINKS_KEY.to_string(), Value::List(links));
    Ok(out)
}

fn link_from_value(i: usize, value: &Value, strict: bool) -> Result<PbLink> {
    let map = value
        .as_map()
        .ok_or_else(|| Error::schema(format!("link #{} is a {}", i, value.kind())))?;
    let target = map
        .get(LINK_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::schema(format!("link #{} has no {:?} string", i, LINK_KEY)))?;

    let hash = if strict {
        let hash = decode_multihash(target)?;
        let bytes = hash.to_bytes();
        if bs58::encode(&bytes).into_string() != target {
            reject(true, format!("link #{} hash {:?} is not canonical", i, target))?;
        }
        bytes
    } else {
        bs58::decode(target)
            .into_vec()
            .map_err(|e| Error::schema(format!("link #{} is not base-58: {}", i, e)))?
    };

    for key in map.keys() {
        if !matches!(key.as_str(), LINK_KEY | "name" | "size") {
            reject(strict, format!("link #{} has extra field {:?}", i, key))?;
        }
    }

    let name = match map.get("name") {
        None => None,
        Some(Value::Text(name)) => Some(name.clone()),
        Some(other) => {
            reject(strict, format!("link #{} name is a {}", i, other.kind()))?;
            None
        }
    };
    let size = match map.get("size") {
        None => None,
        Some(value) => match value.as_u64() {
            Some(size) => Some(size),
            None => {
                reject(strict, format!("link #{} size is not a u64", i))?;
                None
            }
        },
    };
    Ok(PbLink { hash, name, size })
}

fn node_from_value(value: &Value, strict: bool) -> Result<PbNode> {
    let map = value
        .as_map()
        .ok_or_else(|| Error::schema(format!("protobuf node must be a mapping, not a {}", value.kind())))?;

    let folded;
    let map = if !map.contains_key(LINKS_KEY) && map.contains_key(ORDERED_LINKS_KEY) {
        for key in map.keys() {
            if !matches!(key.as_str(), DATA_KEY | NAMED_LINKS_KEY | ORDERED_LINKS_KEY) {
                reject(strict, format!("node has extra field {:?}", key))?;
            }
        }
        folded = fold_named_links(map)?;
        &folded
    } else {
        for key in map.keys() {
            if !matches!(key.as_str(), DATA_KEY | LINKS_KEY) {
                reject(strict, format!("node has extra field {:?}", key))?;
            }
        }
        map
    };

    let data = match map.get(DATA_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::Bytes(b)) => Some(b.clone()),
        Some(Value::Text(s)) if !strict => Some(s.as_bytes().to_vec()),
        Some(other) => {
            return Err(Error::schema(format!("data must be bytes, not a {}", other.kind())))
        }
    };

    let links = match map.get(LINKS_KEY) {
        None => Vec::new(),
        Some(Value::List(links)) => links
            .iter()
            .enumerate()
            .map(|(i, link)| link_from_value(i, link, strict))
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(Error::schema(format!("links must be a list, not a {}", other.kind())))
        }
    };
    Ok(PbNode { data, links })
}

fn put_varint(out: &mut Vec<u8>, value: u64) {
    crate::codec::multicodec::write_uvarint(out, value);
}

fn put_len_field(out: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    put_varint(out, (field << 3) | u64::from(WIRE_LEN));
    put_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn write_node(node: &PbNode) -> Vec<u8> {
    let mut out = Vec::new();
    for link in &node.links {
        let mut inner = Vec::new();
        put_len_field(&mut inner, 1, &link.hash);
        if let Some(name) = &link.name {
            put_len_field(&mut inner, 2, name.as_bytes());
        }
        if let Some(size) = link.size {
            put_varint(&mut inner, (3 << 3) | u64::from(WIRE_VARINT));
            put_varint(&mut inner, size);
        }
        put_len_field(&mut out, 2, &inner);
    }
    if let Some(data) = node.data.as_deref().filter(|d| !d.is_empty()) {
        put_len_field(&mut out, 1, data);
    }
    out
}

/// Encodes `value` as a bare record, without framing.
///
/// # Errors
///
/// Returns [`Error::SchemaViolation`] if the tree does not have the record's
/// shape. In strict mode extra fields and non-canonical hashes are rejected
/// too.
pub fn to_raw_vec(value: &Value, strict: bool) -> Result<Vec<u8>> {
    Ok(write_node(&node_from_value(value, strict)?))
}

/// Encodes `value` as a msgio-framed record.
///
/// # Errors
///
/// See [`to_raw_vec`]; also fails with [`Error::Io`] if the sink fails.
pub fn encode<W: Write + ?Sized>(w: &mut W, value: &Value, strict: bool) -> Result<()> {
    let message = to_raw_vec(value, strict)?;
    let len = u32::try_from(message.len())
        .map_err(|_| Error::schema("protobuf message exceeds the 4 GiB frame limit"))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(&message)?;
    Ok(())
}

/// A [`NodeWriter`] producing a msgio-framed record once finished.
#[derive(Debug)]
pub struct PbWriter<W> {
    out: W,
    strict: bool,
    builder: ValueBuilder,
}

impl<W: Write> PbWriter<W> {
    pub fn new(out: W, strict: bool) -> Self {
        PbWriter {
            out,
            strict,
            builder: ValueBuilder::new(),
        }
    }

    /// # Errors
    ///
    /// Fails if the tokens were incomplete or do not form a valid record.
    pub fn finish(mut self) -> Result<W> {
        let value = self.builder.finish()?;
        encode(&mut self.out, &value, self.strict)?;
        Ok(self.out)
    }
}

impl<W: Write> NodeWriter for PbWriter<W> {
    fn write_begin_node(&mut self) -> Result<()> {
        self.builder.write_begin_node()
    }

    fn write_node_key(&mut self, key: &str) -> Result<()> {
        self.builder.write_node_key(key)
    }

    fn write_begin_array(&mut self) -> Result<()> {
        self.builder.write_begin_array()
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        self.builder.write_value(value)
    }

    fn write_end_node(&mut self) -> Result<()> {
        self.builder.write_end_node()
    }

    fn write_end_array(&mut self) -> Result<()> {
        self.builder.write_end_array()
    }
}
