//! Wire formats
//!
//! This module holds no code. It documents the byte layouts the codecs in
//! [`crate::codec`] read and write.
//!
//! # Framing
//!
//! A multicodec header is the length of the path plus one as an unsigned
//! LEB128 varint, the path, then a newline:
//!
//! ```text
//! varint(len(path) + 1) ‖ path ‖ '\n'
//! ```
//!
//! An encoded node carries two headers. The outer one is always `/mdagv1`;
//! the inner one names the codec of the body:
//!
//! | Inner path | [`Codec`](crate::Codec) | Body |
//! |---|---|---|
//! | `/protobuf/msgio` | `Protobuf` | one msgio frame holding a `PBNode` |
//! | `/cbor/ipld-tagsv1` | `Cbor` | canonical CBOR, links as tag 258 |
//! | `/cbor` | `CborNoTags` | canonical CBOR, links as plain maps |
//! | `/json` | `Json` | compact JSON |
//!
//! # Canonical CBOR
//!
//! - Integers and lengths use the shortest head that holds them.
//! - Mapping keys are text, sorted by their UTF-8 bytes.
//! - `F32` is written as `0xfa` and `F64` as `0xfb`; neither is narrowed.
//! - Integers beyond the 64-bit heads use tag 2 (positive) or tag 3
//!   (negative) over big-endian magnitude bytes.
//! - Indefinite-length strings, arrays and maps are accepted when decoding
//!   and never written.
//!
//! Logically equal trees therefore encode to the same bytes, whatever the
//! insertion order of their mappings.
//!
//! ## Links
//!
//! With tags enabled, a mapping whose `"@link"` entry is text is written as
//! tag 258. The payload is the binary multiaddr when the text parses as one
//! and renders back to the same string, and the text itself otherwise. If
//! the link has other entries the tagged item is a two-element array:
//!
//! ```text
//! 258(payload)                      ; {"@link": target}
//! 258([payload, {"size": 42, ...}]) ; {"@link": target, "size": 42, ...}
//! ```
//!
//! Decoding turns the tag back into a mapping with `"@link"` as text. The
//! legacy `"mlink"` key is never tagged.
//!
//! # JSON
//!
//! Keys come out in bytewise order with no whitespace. Bytes are written as
//! standard base64 strings and read back as text. Integers outside the
//! 64-bit range are written with their exact decimal digits.
//!
//! # Merkledag protobuf
//!
//! ```text
//! message PBLink {
//!   optional bytes  Hash  = 1;
//!   optional string Name  = 2;
//!   optional uint64 Tsize = 3;
//! }
//!
//! message PBNode {
//!   repeated PBLink Links = 2;
//!   optional bytes  Data  = 1;
//! }
//! ```
//!
//! The message is prefixed by its length as a 4-byte big-endian integer.
//! Links are written before data. A node decodes to:
//!
//! ```text
//! {"data": <bytes>, "links": [{"@link": <base58 hash>, "name": <text>, "size": <uint>}]}
//! ```
//!
//! Older trees kept links as `"named-links"` (a mapping from name to link)
//! plus `"ordered-links"` (names or whole links in order). That shape is
//! still accepted by the encoder and by
//! [`fold_named_links`](crate::codec::pb::fold_named_links).
