//! Wire codecs and the multicodec dispatch in front of them.
//!
//! An encoded node is framed by two multicodec headers: the outer
//! `/mdagv1`, then one naming the codec of the body.
//!
//! ```text
//! \x08/mdagv1\n \x12/cbor/ipld-tagsv1\n <canonical cbor>
//! ```
//!
//! [`decode`] reads both headers and hands back a reader for the body;
//! [`encode`] writes them in front of the body chosen by [`EncodeOptions`].
//!
//! ## Examples
//!
//! ```rust
//! use ipld_stream::{codec, ipld, EncodeOptions, Value};
//!
//! let node = ipld!({"foo": "bar", "baz": {"@link": "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo", "size": 42}});
//! let bytes = codec::encode_bytes(&EncodeOptions::new(), &node).unwrap();
//!
//! let mut reader = codec::decode_bytes(&bytes).unwrap();
//! assert_eq!(Value::from_reader(&mut reader).unwrap(), node);
//! ```

pub mod cbor;
pub mod json;
pub mod multicodec;
pub mod pb;
pub mod source;

pub use source::ByteSource;

use crate::options::{Codec, EncodeOptions};
use crate::stream::NodeReader;
use crate::{Error, Result, Value};
use multicodec::{consume_header, read_header, write_header, MDAG_HEADER_PATH};
use std::io::{Cursor, Read, Seek, Write};
use tracing::debug;

/// A boxed reader for a decoded body.
pub type DynReader = Box<dyn NodeReader + Send>;

/// Reads the outer and inner headers and returns a reader for the body.
///
/// The reader is seekable: it may be read any number of times.
///
/// # Errors
///
/// [`Error::MalformedWire`] if the headers are missing or damaged,
/// [`Error::UnknownCodec`] if the inner header names no known codec.
pub fn decode<R>(mut source: R) -> Result<DynReader>
where
    R: Read + Seek + Send + 'static,
{
    consume_header(&mut source, MDAG_HEADER_PATH)?;
    let path = read_header(&mut source)?;
    let codec = Codec::from_header_path(&path).ok_or(Error::UnknownCodec(path))?;
    debug!(?codec, "decoding body");
    Ok(match codec {
        Codec::Protobuf => Box::new(pb::PbDecoder::seekable(source)?),
        Codec::Cbor | Codec::CborNoTags => Box::new(cbor::CborDecoder::seekable(source)?),
        Codec::Json => Box::new(json::JsonDecoder::seekable(source)?),
    })
}

/// [`decode`] over an in-memory buffer.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_bytes(bytes: &[u8]) -> Result<DynReader> {
    decode(Cursor::new(bytes.to_vec()))
}

/// Reads a bare protobuf record, with neither headers nor msgio framing.
///
/// # Errors
///
/// Never fails itself; a malformed record fails the first read.
pub fn decode_legacy_protobuf_bytes(bytes: &[u8]) -> Result<DynReader> {
    let source = ByteSource::seekable(Cursor::new(bytes.to_vec()))?;
    Ok(Box::new(pb::PbDecoder::from_source(source, false)))
}

/// Writes `value` framed by both headers.
///
/// # Errors
///
/// [`Error::SchemaViolation`] if the protobuf encoder rejects the node,
/// [`Error::Io`] if the sink fails.
pub fn encode<W: Write + ?Sized>(opts: &EncodeOptions, w: &mut W, value: &Value) -> Result<()> {
    write_header(w, MDAG_HEADER_PATH)?;
    encode_raw(opts, w, value)
}

/// Writes `value` behind its inner header only.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_raw<W: Write + ?Sized>(
    opts: &EncodeOptions,
    w: &mut W,
    value: &Value,
) -> Result<()> {
    debug!(codec = ?opts.codec, strict = opts.strict, "encoding node");
    // Build the body first so a rejected node leaves no header behind.
    let body = match opts.codec {
        Codec::Protobuf => {
            let mut out = Vec::new();
            pb::encode(&mut out, value, opts.strict)?;
            out
        }
        Codec::Cbor => cbor::to_vec(value, true),
        Codec::CborNoTags => cbor::to_vec(value, false),
        Codec::Json => json::to_vec(value)?,
    };
    write_header(w, opts.codec.header_path())?;
    w.write_all(&body)?;
    Ok(())
}

/// [`encode`] into a fresh buffer.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_bytes(opts: &EncodeOptions, value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode(opts, &mut out, value)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipld;
    use crate::stream::record_tokens;

    const H: &str = "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo";

    #[test]
    fn test_every_codec_round_trips() {
        let node = ipld!({"links": [{"@link": H, "name": "a", "size": 3}]});
        for codec in [Codec::Protobuf, Codec::Cbor, Codec::CborNoTags, Codec::Json] {
            let opts = EncodeOptions::new().with_codec(codec);
            let bytes = encode_bytes(&opts, &node).unwrap();
            let decoded = Value::from_reader(&mut decode_bytes(&bytes).unwrap()).unwrap();
            let links = decoded.get("links").unwrap();
            assert_eq!(links, node.get("links").unwrap(), "{:?}", codec);
        }
    }

    #[test]
    fn test_decoded_reader_is_rereadable() {
        let bytes = encode_bytes(&EncodeOptions::new(), &ipld!({"a": 1})).unwrap();
        let mut reader = decode_bytes(&bytes).unwrap();
        let first = record_tokens(&mut reader).unwrap();
        let second = record_tokens(&mut reader).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_codec() {
        let mut bytes = multicodec::header(MDAG_HEADER_PATH);
        bytes.extend(multicodec::header("/yaml"));
        assert!(matches!(decode_bytes(&bytes), Err(Error::UnknownCodec(p)) if p == "/yaml"));
    }

    #[test]
    fn test_missing_outer_header() {
        let bytes = multicodec::header(Codec::Json.header_path());
        assert!(matches!(decode_bytes(&bytes), Err(Error::MalformedWire { .. })));
    }

    #[test]
    fn test_rejected_node_writes_nothing() {
        let mut out = Vec::new();
        let result = encode_raw(&EncodeOptions::protobuf(), &mut out, &ipld!({"extra": 1}));
        assert!(matches!(result, Err(Error::SchemaViolation(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_legacy_protobuf_bytes() {
        let raw = pb::to_raw_vec(&ipld!({"links": [{"@link": H}]}), true).unwrap();
        let node = Value::from_reader(&mut decode_legacy_protobuf_bytes(&raw).unwrap()).unwrap();
        assert_eq!(node.get("links").and_then(Value::as_list).map(<[Value]>::len), Some(1));
    }
}
