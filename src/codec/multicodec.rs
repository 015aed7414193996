//! Multicodec header framing.
//!
//! A header is `varint(len(path) + 1) ‖ path ‖ '\n'`, the length counting
//! the trailing newline.

use crate::{Error, Result};
use std::io::{Read, Write};

/// Outer header written by [`encode`](super::encode).
pub const MDAG_HEADER_PATH: &str = "/mdagv1";
pub const JSON_HEADER_PATH: &str = "/json";
pub const CBOR_HEADER_PATH: &str = "/cbor";
pub const CBOR_TAGS_HEADER_PATH: &str = "/cbor/ipld-tagsv1";
pub const PROTOBUF_HEADER_PATH: &str = "/protobuf/msgio";

/// Longest header, newline included, that [`read_header`] accepts.
pub const MAX_HEADER_LEN: u64 = 1024;

/// Renders the header for `path`.
#[must_use]
pub fn header(path: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(path.len() + 3);
    write_uvarint(&mut out, path.len() as u64 + 1);
    out.extend_from_slice(path.as_bytes());
    out.push(b'\n');
    out
}

/// Writes the header for `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the sink fails.
pub fn write_header<W: Write + ?Sized>(w: &mut W, path: &str) -> Result<()> {
    w.write_all(&header(path))?;
    Ok(())
}

/// Reads one header and returns its path.
///
/// # Errors
///
/// Returns [`Error::MalformedWire`] if the length is absurd, the newline is
/// missing or the path is not UTF-8.
pub fn read_header<R: Read + ?Sized>(r: &mut R) -> Result<String> {
    let len = read_uvarint(r, "multicodec")?;
    if len == 0 || len > MAX_HEADER_LEN {
        return Err(Error::malformed(
            "multicodec",
            format!("header length {} out of range", len),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).map_err(|e| Error::malformed("multicodec", e))?;
    if buf.pop() != Some(b'\n') {
        return Err(Error::malformed("multicodec", "header does not end in a newline"));
    }
    String::from_utf8(buf).map_err(|e| Error::malformed("multicodec", e))
}

/// Reads one header and checks that it names `expected`.
pub fn consume_header<R: Read + ?Sized>(r: &mut R, expected: &str) -> Result<()> {
    let path = read_header(r)?;
    if path == expected {
        Ok(())
    } else {
        Err(Error::malformed(
            "multicodec",
            format!("expected header {:?}, found {:?}", expected, path),
        ))
    }
}

pub(crate) fn write_uvarint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub(crate) fn read_uvarint<R: Read + ?Sized>(r: &mut R, codec: &'static str) -> Result<u64> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte).map_err(|e| Error::malformed(codec, e))?;
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Error::malformed(codec, "varint overflows 64 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_bytes() {
        assert_eq!(header("/json"), b"\x06/json\n");
    }

    #[test]
    fn test_read_header() {
        let mut bytes = header(MDAG_HEADER_PATH);
        bytes.extend(header(CBOR_TAGS_HEADER_PATH));
        let mut r = Cursor::new(bytes);
        consume_header(&mut r, MDAG_HEADER_PATH).unwrap();
        assert_eq!(read_header(&mut r).unwrap(), CBOR_TAGS_HEADER_PATH);
    }

    #[test]
    fn test_rejects_garbage() {
        let mut r = Cursor::new(b"\x03ab\x00".to_vec());
        assert!(matches!(read_header(&mut r), Err(Error::MalformedWire { .. })));
        let mut r = Cursor::new(b"\x06/js".to_vec());
        assert!(read_header(&mut r).is_err());
    }

    #[test]
    fn test_uvarint() {
        let mut out = Vec::new();
        write_uvarint(&mut out, 300);
        assert_eq!(out, vec![0xac, 0x02]);
        assert_eq!(read_uvarint(&mut Cursor::new(out), "test").unwrap(), 300);
    }
}
