//! # ipld-stream
//!
//! A tree model for IPLD nodes, a depth-first token stream shared by every
//! reader and writer, and canonical codecs for CBOR, JSON and the merkledag
//! protobuf format.
//!
//! ## The node model
//!
//! A [`Value`] is a scalar, a list or a mapping. A mapping with an `"@link"`
//! text entry is a link: its target is a base-58 multihash or a multiaddr
//! string, and its other entries (`name`, `size`, ...) travel with it.
//!
//! ```rust
//! use ipld_stream::{extract_links, ipld};
//!
//! let node = ipld!({
//!     "foo": "bar",
//!     "baz": {"@link": "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo", "size": 42}
//! });
//! let links = extract_links(&node);
//! assert_eq!(links["baz"].size(), Some(42));
//! ```
//!
//! ## Encoding and decoding
//!
//! Encoded nodes carry multicodec headers naming their codec, so
//! [`from_slice`] needs no hint about which one was used.
//!
//! ```rust
//! use ipld_stream::{from_slice, ipld, to_vec, Codec, EncodeOptions, Value};
//!
//! let node = ipld!({"name": "readme", "tags": ["doc"]});
//! for codec in [Codec::Cbor, Codec::Json] {
//!     let bytes = to_vec(&node, &EncodeOptions::new().with_codec(codec)).unwrap();
//!     let back: Value = from_slice(&bytes).unwrap();
//!     assert_eq!(back, node);
//! }
//! ```
//!
//! ## Streaming
//!
//! Every decoder is a [`NodeReader`](stream::NodeReader) that pushes tokens
//! into a callback, which may skip a subtree or stop the read. The
//! [`stream::iterate`] bridge turns that into a pull-style iterator, and the
//! [`bind`] module fills typed records straight from the stream without
//! materializing the tree.
//!
//! ```rust
//! use ipld_stream::bind::{read_links, BaseLink};
//! use ipld_stream::{codec, ipld, EncodeOptions};
//!
//! let node = ipld!({"a": {"@link": "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo"}});
//! let bytes = codec::encode_bytes(&EncodeOptions::new(), &node).unwrap();
//! let links: Vec<BaseLink> = read_links(&mut codec::decode_bytes(&bytes).unwrap()).unwrap();
//! assert_eq!(links[0].name, "a");
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber.
//!
//! See [`format`] for the byte layouts.

pub mod bind;
pub mod codec;
pub mod de;
pub mod directives;
pub mod error;
pub mod format;
pub mod link;
pub mod macros;
pub mod map;
pub mod options;
pub mod path;
pub mod ser;
pub mod stream;
pub mod value;
pub mod walk;

pub use bind::{bind_value, read_links, unmarshal, Bind, Schema};
pub use de::{from_value, ValueDeserializer};
pub use error::{Error, Result};
pub use link::{Link, LinkRef};
pub use map::NodeMap;
pub use options::{Codec, EncodeOptions};
pub use path::{Path, PathSegment};
pub use ser::{to_value, ValueSerializer};
pub use value::{Shape, Value};
pub use walk::{extract_links, get_path, get_str_path, walk, walk_from, LinkIndex, Visit};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;

/// Serializes `value` and encodes it with both multicodec headers.
///
/// ```rust
/// use ipld_stream::{to_vec, EncodeOptions};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Entry { name: String, size: u64 }
///
/// let bytes = to_vec(&Entry { name: "a".into(), size: 3 }, &EncodeOptions::json()).unwrap();
/// assert!(bytes.ends_with(br#"{"name":"a","size":3}"#));
/// ```
///
/// # Errors
///
/// Fails if `value` cannot be represented as a [`Value`] or the codec
/// rejects it.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_vec<T>(value: &T, options: &EncodeOptions) -> Result<Vec<u8>>
where
    T: ?Sized + Serialize,
{
    codec::encode_bytes(options, &to_value(value)?)
}

/// [`to_vec`] into a writer.
///
/// # Errors
///
/// See [`to_vec`]; also fails if the writer does.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<W, T>(mut writer: W, value: &T, options: &EncodeOptions) -> Result<()>
where
    W: io::Write,
    T: ?Sized + Serialize,
{
    codec::encode(options, &mut writer, &to_value(value)?)
}

/// Decodes a framed node and deserializes it into `T`.
///
/// # Errors
///
/// Fails if the bytes do not decode or the tree does not fit `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_slice<T>(bytes: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    let mut reader = codec::decode_bytes(bytes)?;
    from_value(Value::from_reader(&mut reader)?)
}

/// [`from_slice`] over an I/O stream, read to its end first.
///
/// # Errors
///
/// See [`from_slice`]; also fails if reading does.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader<R, T>(mut reader: R) -> Result<T>
where
    R: io::Read,
    T: DeserializeOwned,
{
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    from_slice(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Dir {
        name: String,
        entries: Vec<Entry>,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Entry {
        name: String,
        size: u64,
        #[serde(with = "bytes")]
        data: Vec<u8>,
    }

    mod bytes {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
            s.serialize_bytes(v)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
            let value = crate::Value::deserialize(d)?;
            match value {
                crate::Value::Bytes(b) => Ok(b),
                _ => Err(serde::de::Error::custom("expected bytes")),
            }
        }
    }

    fn dir() -> Dir {
        Dir {
            name: "docs".to_string(),
            entries: vec![
                Entry {
                    name: "a".to_string(),
                    size: 3,
                    data: vec![1, 2, 3],
                },
                Entry {
                    name: "b".to_string(),
                    size: u64::MAX,
                    data: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_typed_round_trip_through_cbor() {
        for codec in [Codec::Cbor, Codec::CborNoTags] {
            let options = EncodeOptions::new().with_codec(codec);
            let bytes = to_vec(&dir(), &options).unwrap();
            let back: Dir = from_slice(&bytes).unwrap();
            assert_eq!(back, dir(), "{:?}", codec);
        }
    }

    #[test]
    fn test_json_bytes_come_back_as_text() {
        let bytes = to_vec(&dir(), &EncodeOptions::json()).unwrap();
        let back: Value = from_slice(&bytes).unwrap();
        let data = get_str_path(&back, "entries/0/data").unwrap();
        assert_eq!(data, &Value::from("AQID"));
    }

    #[test]
    fn test_writer_and_reader() {
        let mut out = Vec::new();
        to_writer(&mut out, &dir(), &EncodeOptions::new()).unwrap();
        let back: Dir = from_reader(io::Cursor::new(out)).unwrap();
        assert_eq!(back, dir());
    }

    #[test]
    fn test_truncated_input() {
        let bytes = to_vec(&dir(), &EncodeOptions::new()).unwrap();
        let result: Result<Dir> = from_slice(&bytes[..bytes.len() - 4]);
        assert!(result.is_err());
    }
}
