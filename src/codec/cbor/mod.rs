//! Canonical CBOR.
//!
//! Mapping keys are written in bytewise order, integers and lengths in their
//! shortest form, and floats keep their width (`0xfa` for `F32`, `0xfb` for
//! `F64`). With tags enabled, a mapping whose `"@link"` is text becomes tag
//! 258: its payload is the binary multiaddr when the text parses as one and
//! renders back unchanged, the text itself otherwise, and is paired with the
//! remaining entries as `[payload, {siblings}]` when there are any.

mod decode;
mod encode;

pub use decode::CborDecoder;
pub use encode::{encode, to_vec, CborWriter};

pub const MAJOR_UNSIGNED: u8 = 0;
pub const MAJOR_NEGATIVE: u8 = 1;
pub const MAJOR_BYTES: u8 = 2;
pub const MAJOR_TEXT: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_MAP: u8 = 5;
pub const MAJOR_TAG: u8 = 6;
pub const MAJOR_SIMPLE: u8 = 7;

pub const TAG_POSITIVE_BIGNUM: u64 = 2;
pub const TAG_NEGATIVE_BIGNUM: u64 = 3;
pub const TAG_LINK: u64 = 258;

/// Deepest nesting of arrays, maps and tags the decoder accepts.
pub const MAX_DEPTH: usize = 128;

const CODEC: &str = "cbor";
