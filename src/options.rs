//! Encoder configuration.
//!
//! - [`Codec`]: which wire format an encode entry point produces
//! - [`EncodeOptions`]: the codec plus the strictness of schema checks
//!
//! Options are plain values handed to [`codec::encode`](crate::codec::encode);
//! there is no process-wide default.
//!
//! ## Examples
//!
//! ```rust
//! use ipld_stream::{codec, ipld, Codec, EncodeOptions};
//!
//! let node = ipld!({"name": "x"});
//!
//! let bytes = codec::encode_bytes(&EncodeOptions::new(), &node).unwrap();
//! let json = codec::encode_bytes(&EncodeOptions::json(), &node).unwrap();
//!
//! let opts = EncodeOptions::new().with_codec(Codec::CborNoTags).with_strict(false);
//! assert!(!opts.strict);
//! ```

use crate::codec::multicodec::{
    CBOR_HEADER_PATH, CBOR_TAGS_HEADER_PATH, JSON_HEADER_PATH, PROTOBUF_HEADER_PATH,
};
use serde::{Deserialize, Serialize};

/// Wire format produced by the encoder.
///
/// # Examples
///
/// ```rust
/// use ipld_stream::Codec;
///
/// assert_eq!(Codec::Cbor.header_path(), "/cbor/ipld-tagsv1");
/// assert_eq!(Codec::from_header_path("/json"), Some(Codec::Json));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Codec {
    /// The legacy merkledag protobuf record.
    Protobuf,
    /// Canonical CBOR with links as tag 258.
    #[default]
    Cbor,
    /// Canonical CBOR with links as plain mappings.
    CborNoTags,
    Json,
}

impl Codec {
    /// The inner multicodec header path announcing this format.
    #[must_use]
    pub const fn header_path(&self) -> &'static str {
        match self {
            Codec::Protobuf => PROTOBUF_HEADER_PATH,
            Codec::Cbor => CBOR_TAGS_HEADER_PATH,
            Codec::CborNoTags => CBOR_HEADER_PATH,
            Codec::Json => JSON_HEADER_PATH,
        }
    }

    /// The codec registered for a header path, if any.
    #[must_use]
    pub fn from_header_path(path: &str) -> Option<Codec> {
        match path {
            PROTOBUF_HEADER_PATH => Some(Codec::Protobuf),
            CBOR_TAGS_HEADER_PATH => Some(Codec::Cbor),
            CBOR_HEADER_PATH => Some(Codec::CborNoTags),
            JSON_HEADER_PATH => Some(Codec::Json),
            _ => None,
        }
    }
}

/// Options for the encode entry points.
///
/// `strict` only affects [`Codec::Protobuf`]: extra fields and
/// non-canonical link hashes are rejected instead of dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    pub codec: Codec,
    pub strict: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            codec: Codec::default(),
            strict: true,
        }
    }
}

impl EncodeOptions {
    /// Tagged canonical CBOR, strict.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ipld_stream::{Codec, EncodeOptions};
    ///
    /// let opts = EncodeOptions::new();
    /// assert_eq!(opts.codec, Codec::Cbor);
    /// assert!(opts.strict);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn json() -> Self {
        Self::new().with_codec(Codec::Json)
    }

    #[must_use]
    pub fn protobuf() -> Self {
        Self::new().with_codec(Codec::Protobuf)
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets whether schema checks reject a node or let it through.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
