use super::{
    CODEC, MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_NEGATIVE, MAJOR_SIMPLE, MAJOR_TAG,
    MAJOR_TEXT, MAJOR_UNSIGNED, MAX_DEPTH, TAG_LINK, TAG_NEGATIVE_BIGNUM, TAG_POSITIVE_BIGNUM,
};
use crate::codec::ByteSource;
use crate::link::LINK_KEY;
use crate::stream::{finish_read, NodeReader, ReadFn, ScopeTracker, Token};
use crate::{Error, Result, Value};
use multiaddr::Multiaddr;
use num_bigint::{BigInt, Sign};
use std::io::{self, Read, Seek};
use tracing::trace;

/// Streams CBOR items as tokens.
///
/// Entries come out in wire order. Tag 258 is turned back into a link
/// mapping with `"@link"` first; other unknown tags are transparent.
#[derive(Debug)]
pub struct CborDecoder<R> {
    source: ByteSource<R>,
}

impl<R: Read> CborDecoder<R> {
    /// A decoder that can be read once.
    pub fn new(reader: R) -> Self {
        CborDecoder {
            source: ByteSource::forward(reader),
        }
    }

    pub fn from_source(source: ByteSource<R>) -> Self {
        CborDecoder { source }
    }
}

impl<R: Read + Seek> CborDecoder<R> {
    /// A decoder that rewinds to the current position before every read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the position cannot be queried.
    pub fn seekable(reader: R) -> Result<Self> {
        Ok(CborDecoder {
            source: ByteSource::seekable(reader)?,
        })
    }
}

impl<R: Read> NodeReader for CborDecoder<R> {
    fn read(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        let input = self.source.begin()?;
        let mut parser = Parser {
            input,
            tracker: ScopeTracker::new(),
            scratch: Vec::new(),
            depth: 0,
        };
        finish_read(parser.item(f))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Head {
    Unsigned(u64),
    Negative(u64),
    Bytes(Option<u64>),
    Text(Option<u64>),
    Array(Option<u64>),
    Map(Option<u64>),
    Tag(u64),
    Simple(u8),
    Half(u16),
    Float(f32),
    Double(f64),
    Break,
}

fn wire_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::malformed(CODEC, "unexpected end of input")
    } else {
        Error::from(err)
    }
}

fn half_to_f32(half: u16) -> f32 {
    let exp = (half >> 10) & 0x1f;
    let mant = half & 0x3ff;
    let magnitude = if exp == 0 {
        f32::from(mant) * 2f32.powi(-24)
    } else if exp != 31 {
        f32::from(mant + 1024) * 2f32.powi(i32::from(exp) - 25)
    } else if mant == 0 {
        f32::INFINITY
    } else {
        f32::NAN
    };
    if half & 0x8000 == 0 {
        magnitude
    } else {
        -magnitude
    }
}

struct Parser<'r, R> {
    input: &'r mut R,
    tracker: ScopeTracker,
    /// Reused for every byte and text string.
    scratch: Vec<u8>,
    /// Arrays, maps and tags currently open.
    depth: usize,
}

impl<R: Read> Parser<'_, R> {
    fn byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.input.read_exact(&mut buf).map_err(wire_error)?;
        Ok(buf[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.input.read_exact(&mut buf).map_err(wire_error)?;
        Ok(buf)
    }

    fn head(&mut self) -> Result<Head> {
        let initial = self.byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;

        if major == MAJOR_SIMPLE {
            return match info {
                0..=23 => Ok(Head::Simple(info)),
                24 => Ok(Head::Simple(self.byte()?)),
                25 => Ok(Head::Half(u16::from_be_bytes(self.array()?))),
                26 => Ok(Head::Float(f32::from_be_bytes(self.array()?))),
                27 => Ok(Head::Double(f64::from_be_bytes(self.array()?))),
                31 => Ok(Head::Break),
                _ => Err(Error::malformed(
                    CODEC,
                    format!("reserved additional info {}", info),
                )),
            };
        }

        let argument = match info {
            0..=23 => Some(u64::from(info)),
            24 => Some(u64::from(self.byte()?)),
            25 => Some(u64::from(u16::from_be_bytes(self.array()?))),
            26 => Some(u64::from(u32::from_be_bytes(self.array()?))),
            27 => Some(u64::from_be_bytes(self.array()?)),
            31 => None,
            _ => {
                return Err(Error::malformed(
                    CODEC,
                    format!("reserved additional info {}", info),
                ))
            }
        };

        match (major, argument) {
            (MAJOR_UNSIGNED, Some(n)) => Ok(Head::Unsigned(n)),
            (MAJOR_NEGATIVE, Some(n)) => Ok(Head::Negative(n)),
            (MAJOR_BYTES, len) => Ok(Head::Bytes(len)),
            (MAJOR_TEXT, len) => Ok(Head::Text(len)),
            (MAJOR_ARRAY, len) => Ok(Head::Array(len)),
            (MAJOR_MAP, len) => Ok(Head::Map(len)),
            (MAJOR_TAG, Some(n)) => Ok(Head::Tag(n)),
            _ => Err(Error::malformed(
                CODEC,
                format!("major type {} cannot be indefinite", major),
            )),
        }
    }

    /// Reads a string's content into `scratch`, joining indefinite chunks.
    fn string_content(&mut self, len: Option<u64>, major: u8) -> Result<()> {
        self.scratch.clear();
        match len {
            Some(len) => self.chunk(len),
            None => loop {
                match self.head()? {
                    Head::Break => return Ok(()),
                    Head::Bytes(Some(len)) if major == MAJOR_BYTES => self.chunk(len)?,
                    Head::Text(Some(len)) if major == MAJOR_TEXT => self.chunk(len)?,
                    other => {
                        return Err(Error::malformed(
                            CODEC,
                            format!("invalid chunk {:?} in indefinite string", other),
                        ))
                    }
                }
            },
        }
    }

    fn chunk(&mut self, len: u64) -> Result<()> {
        let read = (&mut *self.input)
            .take(len)
            .read_to_end(&mut self.scratch)
            .map_err(wire_error)?;
        if read as u64 == len {
            Ok(())
        } else {
            Err(Error::malformed(CODEC, "unexpected end of input"))
        }
    }

    fn bytes(&mut self, len: Option<u64>) -> Result<Vec<u8>> {
        self.string_content(len, MAJOR_BYTES)?;
        Ok(self.scratch.clone())
    }

    fn text(&mut self, len: Option<u64>) -> Result<String> {
        self.string_content(len, MAJOR_TEXT)?;
        std::str::from_utf8(&self.scratch)
            .map(str::to_string)
            .map_err(|e| Error::malformed(CODEC, e))
    }

    fn item(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        let head = self.head()?;
        self.item_with(head, f)
    }

    fn item_with(&mut self, head: Head, f: &mut ReadFn<'_>) -> Result<()> {
        if !matches!(head, Head::Array(_) | Head::Map(_) | Head::Tag(_)) {
            return self.decode_item(head, f);
        }
        if self.depth == MAX_DEPTH {
            return Err(Error::malformed(
                CODEC,
                format!("nesting deeper than {} levels", MAX_DEPTH),
            ));
        }
        self.depth += 1;
        let result = self.decode_item(head, f);
        self.depth -= 1;
        result
    }

    fn decode_item(&mut self, head: Head, f: &mut ReadFn<'_>) -> Result<()> {
        match head {
            Head::Unsigned(n) => {
                let value = i64::try_from(n).map_or(Value::Uint(n), Value::Int);
                self.tracker.value(f, value)
            }
            Head::Negative(n) => {
                let value = match i64::try_from(n) {
                    Ok(n) => Value::Int(-1 - n),
                    Err(_) => Value::BigInt(BigInt::from(-1) - BigInt::from(n)),
                };
                self.tracker.value(f, value)
            }
            Head::Bytes(len) => {
                let bytes = self.bytes(len)?;
                self.tracker.value(f, Value::Bytes(bytes))
            }
            Head::Text(len) => {
                let text = self.text(len)?;
                self.tracker.value(f, Value::Text(text))
            }
            Head::Array(len) => {
                self.tracker.open(f, Token::BeginArray)?;
                let mut i = 0usize;
                loop {
                    if let Some(len) = len {
                        if i as u64 == len {
                            break;
                        }
                    }
                    let head = self.head()?;
                    if head == Head::Break {
                        if len.is_some() {
                            return Err(Error::malformed(CODEC, "break inside a sized array"));
                        }
                        break;
                    }
                    self.tracker.index(f, i)?;
                    self.item_with(head, f)?;
                    self.tracker.leave();
                    i += 1;
                }
                self.tracker.close(f, Token::EndArray)
            }
            Head::Map(len) => {
                self.tracker.open(f, Token::BeginNode)?;
                self.entries(len, f)?;
                self.tracker.close(f, Token::EndNode)
            }
            Head::Tag(TAG_POSITIVE_BIGNUM) | Head::Tag(TAG_NEGATIVE_BIGNUM) => {
                let negative = head == Head::Tag(TAG_NEGATIVE_BIGNUM);
                let magnitude = match self.head()? {
                    Head::Bytes(len) => self.bytes(len)?,
                    other => {
                        return Err(Error::malformed(
                            CODEC,
                            format!("bignum payload must be bytes, found {:?}", other),
                        ))
                    }
                };
                let n = BigInt::from_bytes_be(Sign::Plus, &magnitude);
                let n = if negative { BigInt::from(-1) - n } else { n };
                self.tracker.value(f, Value::normalize_bigint(n))
            }
            Head::Tag(TAG_LINK) => self.link(f),
            Head::Tag(tag) => {
                trace!(tag, "ignoring unknown cbor tag");
                self.item(f)
            }
            Head::Simple(20) => self.tracker.value(f, Value::Bool(false)),
            Head::Simple(21) => self.tracker.value(f, Value::Bool(true)),
            Head::Simple(22) | Head::Simple(23) => self.tracker.value(f, Value::Null),
            Head::Simple(n) => Err(Error::malformed(
                CODEC,
                format!("unassigned simple value {}", n),
            )),
            Head::Half(bits) => self.tracker.value(f, Value::F32(half_to_f32(bits))),
            Head::Float(x) => self.tracker.value(f, Value::F32(x)),
            Head::Double(x) => self.tracker.value(f, Value::F64(x)),
            Head::Break => Err(Error::malformed(CODEC, "unexpected break")),
        }
    }

    /// Emits the entries of a map whose header has already been read.
    fn entries(&mut self, len: Option<u64>, f: &mut ReadFn<'_>) -> Result<()> {
        let mut n = 0u64;
        loop {
            if len == Some(n) {
                return Ok(());
            }
            let key = match self.head()? {
                Head::Break if len.is_none() => return Ok(()),
                Head::Text(len) => self.text(len)?,
                other => {
                    return Err(Error::malformed(
                        CODEC,
                        format!("map keys must be text, found {:?}", other),
                    ))
                }
            };
            self.tracker.key(f, &key)?;
            self.item(f)?;
            self.tracker.leave();
            n += 1;
        }
    }

    fn link_payload(&mut self, head: Head) -> Result<String> {
        match head {
            Head::Text(len) => self.text(len),
            Head::Bytes(len) => {
                let bytes = self.bytes(len)?;
                let addr = Multiaddr::try_from(bytes).map_err(|e| Error::malformed(CODEC, e))?;
                Ok(addr.to_string())
            }
            other => Err(Error::malformed(
                CODEC,
                format!("link payload must be text or bytes, found {:?}", other),
            )),
        }
    }

    fn link(&mut self, f: &mut ReadFn<'_>) -> Result<()> {
        trace!("decoding link tag");
        let (target, with_siblings) = match self.head()? {
            Head::Array(Some(2)) => {
                let head = self.head()?;
                (self.link_payload(head)?, true)
            }
            head => (self.link_payload(head)?, false),
        };

        self.tracker.open(f, Token::BeginNode)?;
        self.tracker.key(f, LINK_KEY)?;
        self.tracker.value(f, Value::Text(target))?;
        self.tracker.leave();
        if with_siblings {
            match self.head()? {
                Head::Map(len) => self.entries(len, f)?,
                other => {
                    return Err(Error::malformed(
                        CODEC,
                        format!("link metadata must be a map, found {:?}", other),
                    ))
                }
            }
        }
        self.tracker.close(f, Token::EndNode)
    }
}
