//! Error types shared by the node model, the token stream and every codec.
//!
//! - **Wire errors**: [`Error::MalformedWire`] when bytes do not parse as the
//!   codec announced by their header, [`Error::UnknownCodec`] when no decoder
//!   is registered for a header path
//! - **Schema errors**: [`Error::SchemaViolation`] for strict encoders and for
//!   link hashes that fail their round-trip check
//! - **Binding errors**: [`Error::TypeMismatch`] for structural tokens that do
//!   not fit the record being bound
//! - **Lookup errors**: [`Error::NotFound`] for `walk_from` on a missing path
//! - **Source errors**: [`Error::AlreadyConsumed`] when a forward-only decoder
//!   is read twice, and [`Error::Io`] for failures of the byte source or sink
//!
//! Early termination requested through the token protocol travels as
//! [`Error::Aborted`] inside a traversal and is turned back into `Ok(())` by
//! every public entry point, so callers never observe it.
//!
//! ## Examples
//!
//! ```rust
//! use ipld_stream::{codec, Error};
//!
//! let result = codec::decode_bytes(b"not a multicodec stream");
//! assert!(matches!(result, Err(Error::MalformedWire { .. })));
//! ```

use std::fmt;
use thiserror::Error;

/// Represents every failure the crate can report.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The byte source or sink failed
    #[error("byte source failed: {0}")]
    Io(String),

    /// Bytes do not parse as the claimed codec
    #[error("Malformed {codec} input: {msg}")]
    MalformedWire { codec: &'static str, msg: String },

    /// No decoder is registered for a header path
    #[error("No codec registered for header path {0:?}")]
    UnknownCodec(String),

    /// Strict-mode or schema check failed
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// A structural token did not fit the statically required type
    #[error("Type mismatch at {path:?}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// Path lookup found nothing
    #[error("No value at path {0:?}")]
    NotFound(String),

    /// A single-use decoder was read a second time
    #[error("Decoder already consumed; seek the source back before reading again")]
    AlreadyConsumed,

    /// Consumer requested an early stop; never surfaced by public entry points
    #[error("Traversal aborted by consumer")]
    Aborted,

    /// Raised through the serde bridge or by a walk callback
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Creates a malformed-input error for the named codec.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ipld_stream::Error;
    ///
    /// let err = Error::malformed("cbor", "truncated map");
    /// assert!(err.to_string().contains("cbor"));
    /// ```
    pub fn malformed<T: fmt::Display>(codec: &'static str, msg: T) -> Self {
        Error::MalformedWire {
            codec,
            msg: msg.to_string(),
        }
    }

    /// Creates a schema violation error.
    pub fn schema<T: fmt::Display>(msg: T) -> Self {
        Error::SchemaViolation(msg.to_string())
    }

    /// Creates a type mismatch error for a value found at `path`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ipld_stream::Error;
    ///
    /// let err = Error::type_mismatch("links/0", "node", "text");
    /// assert!(err.to_string().contains("expected node"));
    /// ```
    pub fn type_mismatch(path: &str, expected: &str, found: &str) -> Self {
        Error::TypeMismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates a not-found error for the given flattened path.
    pub fn not_found(path: &str) -> Self {
        Error::NotFound(path.to_string())
    }

    /// Wraps an arbitrary message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Creates an I/O error for byte source or sink failures.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }

    /// Returns `true` for the internal early-stop signal.
    #[must_use]
    #[inline]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maps an [`Error::Aborted`] outcome to success.
pub(crate) fn swallow_abort(result: Result<()>) -> Result<()> {
    match result {
        Err(Error::Aborted) => Ok(()),
        other => other,
    }
}
