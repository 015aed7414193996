use super::{
    MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_NEGATIVE, MAJOR_TAG, MAJOR_TEXT, MAJOR_UNSIGNED,
    TAG_LINK, TAG_NEGATIVE_BIGNUM, TAG_POSITIVE_BIGNUM,
};
use crate::link::LINK_KEY;
use crate::stream::{NodeWriter, ValueBuilder};
use crate::{NodeMap, Result, Value};
use multiaddr::Multiaddr;
use num_bigint::BigInt;
use std::io::Write;
use tracing::trace;

fn write_uint_major(out: &mut Vec<u8>, major: u8, n: u64) {
    let major_bits = major << 5;
    if n <= 23 {
        out.push(major_bits | (n as u8));
    } else if n <= 0xff {
        out.push(major_bits | 24);
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(major_bits | 25);
        out.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        out.push(major_bits | 26);
        out.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        out.push(major_bits | 27);
        out.extend_from_slice(&n.to_be_bytes());
    }
}

fn write_signed(out: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        write_uint_major(out, MAJOR_UNSIGNED, n as u64);
    } else {
        write_uint_major(out, MAJOR_NEGATIVE, (-1i128 - i128::from(n)) as u64);
    }
}

fn write_bigint(out: &mut Vec<u8>, n: &BigInt) {
    if let Ok(u) = u64::try_from(n) {
        write_uint_major(out, MAJOR_UNSIGNED, u);
        return;
    }
    let negated = BigInt::from(-1) - n;
    if let Ok(u) = u64::try_from(&negated) {
        write_uint_major(out, MAJOR_NEGATIVE, u);
        return;
    }
    let (tag, magnitude) = if n.sign() == num_bigint::Sign::Minus {
        (TAG_NEGATIVE_BIGNUM, negated.magnitude().to_bytes_be())
    } else {
        (TAG_POSITIVE_BIGNUM, n.magnitude().to_bytes_be())
    };
    write_uint_major(out, MAJOR_TAG, tag);
    write_bytes(out, &magnitude);
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_uint_major(out, MAJOR_BYTES, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn write_text(out: &mut Vec<u8>, text: &str) {
    write_uint_major(out, MAJOR_TEXT, text.len() as u64);
    out.extend_from_slice(text.as_bytes());
}

fn write_value(out: &mut Vec<u8>, value: &Value, tags: bool) {
    match value {
        Value::Null => out.push(0xf6),
        Value::Bool(b) => out.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Int(i) => write_signed(out, *i),
        Value::Uint(u) => write_uint_major(out, MAJOR_UNSIGNED, *u),
        Value::BigInt(b) => write_bigint(out, b),
        Value::F32(f) => {
            out.push(0xfa);
            out.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        Value::F64(f) => {
            out.push(0xfb);
            out.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        Value::Text(s) => write_text(out, s),
        Value::Bytes(b) => write_bytes(out, b),
        Value::List(items) => {
            write_uint_major(out, MAJOR_ARRAY, items.len() as u64);
            for item in items {
                write_value(out, item, tags);
            }
        }
        Value::Map(map) => match map.get(LINK_KEY) {
            Some(Value::Text(target)) if tags => write_link(out, map, target, tags),
            _ => write_map(out, map.sorted_entries(), tags),
        },
    }
}

fn write_map(out: &mut Vec<u8>, entries: Vec<(&String, &Value)>, tags: bool) {
    write_uint_major(out, MAJOR_MAP, entries.len() as u64);
    for (key, value) in entries {
        write_text(out, key);
        write_value(out, value, tags);
    }
}

fn write_link(out: &mut Vec<u8>, map: &NodeMap, target: &str, tags: bool) {
    write_uint_major(out, MAJOR_TAG, TAG_LINK);

    let siblings: Vec<_> = map
        .sorted_entries()
        .into_iter()
        .filter(|(key, _)| key.as_str() != LINK_KEY)
        .collect();
    if !siblings.is_empty() {
        write_uint_major(out, MAJOR_ARRAY, 2);
    }

    match target.parse::<Multiaddr>() {
        Ok(addr) if addr.to_string() == target => {
            trace!(%addr, "writing link as binary multiaddr");
            write_bytes(out, &addr.to_vec());
        }
        _ => write_text(out, target),
    }

    if !siblings.is_empty() {
        write_map(out, siblings, tags);
    }
}

/// Encodes `value` into a fresh buffer.
#[must_use]
pub fn to_vec(value: &Value, tags: bool) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value, tags);
    out
}

/// Encodes `value` into `w`.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the sink fails.
pub fn encode<W: Write + ?Sized>(w: &mut W, value: &Value, tags: bool) -> Result<()> {
    w.write_all(&to_vec(value, tags))?;
    Ok(())
}

/// A [`NodeWriter`] producing canonical CBOR.
///
/// Canonical key order needs a whole mapping at hand, so tokens are
/// collected and the bytes are written by [`finish`](Self::finish).
#[derive(Debug)]
pub struct CborWriter<W> {
    out: W,
    tags: bool,
    builder: ValueBuilder,
}

impl<W: Write> CborWriter<W> {
    pub fn new(out: W, tags: bool) -> Self {
        CborWriter {
            out,
            tags,
            builder: ValueBuilder::new(),
        }
    }

    /// Writes the collected tree and returns the sink.
    ///
    /// # Errors
    ///
    /// Fails if the tokens did not form one complete value or the sink fails.
    pub fn finish(mut self) -> Result<W> {
        let value = self.builder.finish()?;
        encode(&mut self.out, &value, self.tags)?;
        Ok(self.out)
    }
}

impl<W: Write> NodeWriter for CborWriter<W> {
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
