//! Dynamic value representation for IPLD trees.
//!
//! [`Value`] is the universal sum type carried by a tree: mappings,
//! sequences, and scalars. Integers keep their width and signedness
//! ([`Value::Int`], [`Value::Uint`], [`Value::BigInt`]) and floats keep their
//! precision ([`Value::F32`], [`Value::F64`]) so that codecs which preserve
//! those distinctions, such as CBOR, can round-trip them.
//!
//! ## Equality
//!
//! Equality is logical rather than representational:
//!
//! - integers compare by mathematical value, so `Int(5) == Uint(5)`
//! - floats compare by value across widths
//! - mappings compare as unordered sets of entries
//!
//! ```rust
//! use ipld_stream::Value;
//! use num_bigint::BigInt;
//!
//! assert_eq!(Value::Int(7), Value::Uint(7));
//! assert_eq!(Value::BigInt(BigInt::from(7)), Value::Int(7));
//! assert_ne!(Value::Int(7), Value::F64(7.0));
//! ```
//!
//! ## Links
//!
//! A mapping that binds the link sentinel key to a string is a link. Use
//! [`Value::shape`] to classify a value once instead of probing for the key:
//!
//! ```rust
//! use ipld_stream::{ipld, Shape};
//!
//! let v = ipld!({"@link": "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo", "size": 3});
//! match v.shape() {
//!     Shape::Link(link) => assert_eq!(link.meta().count(), 1),
//!     _ => panic!("expected a link"),
//! }
//! ```

use crate::link::LinkRef;
use crate::NodeMap;
use num_bigint::BigInt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A dynamically-typed IPLD value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    BigInt(BigInt),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(NodeMap),
}

/// Classification of a value decided in one place.
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    /// A mapping carrying the link sentinel bound to a string.
    Link(LinkRef<'a>),
    /// Any other mapping.
    Node(&'a NodeMap),
    List(&'a [Value]),
    Scalar(&'a Value),
}

impl Value {
    #[must_use]
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    #[inline]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Returns `true` for any of the integer variants.
    #[must_use]
    #[inline]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::BigInt(_))
    }

    #[must_use]
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Value::F32(_) | Value::F64(_))
    }

    #[must_use]
    #[inline]
    pub const fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    #[must_use]
    #[inline]
    pub const fn is_bytes(&self) -> bool {
        matches!(self, Value::Bytes(_))
    }

    #[must_use]
    #[inline]
    pub const fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    #[must_use]
    #[inline]
    pub const fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Returns `true` for every variant that is neither a mapping nor a list.
    #[must_use]
    #[inline]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Value::Map(_) | Value::List(_))
    }

    /// Returns `true` if this value is a mapping satisfying the link predicate.
    #[must_use]
    pub fn is_link(&self) -> bool {
        matches!(self.shape(), Shape::Link(_))
    }

    /// Classifies the value as a link, a node, a list or a scalar.
    #[must_use]
    pub fn shape(&self) -> Shape<'_> {
        match self {
            Value::Map(map) => match LinkRef::from_map(map) {
                Some(link) => Shape::Link(link),
                None => Shape::Node(map),
            },
            Value::List(list) => Shape::List(list),
            other => Shape::Scalar(other),
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::BigInt(_) => "bigint",
            Value::F32(_) => "float32",
            Value::F64(_) => "float64",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the value as `i64` when any integer variant holds it exactly.
    ///
    /// ```rust
    /// use ipld_stream::Value;
    ///
    /// assert_eq!(Value::Uint(42).as_i64(), Some(42));
    /// assert_eq!(Value::Uint(u64::MAX).as_i64(), None);
    /// ```
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Uint(u) => i64::try_from(*u).ok(),
            Value::BigInt(b) => i64::try_from(b).ok(),
            _ => None,
        }
    }

    /// Returns the value as `u64` when any integer variant holds it exactly.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::Uint(u) => Some(*u),
            Value::BigInt(b) => u64::try_from(b).ok(),
            _ => None,
        }
    }

    /// Returns the value as `f64` when the conversion loses nothing.
    ///
    /// Integers qualify when they are exactly representable as a double.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(f) => Some(f64::from(*f)),
            Value::F64(f) => Some(*f),
            Value::Int(i) => {
                let f = *i as f64;
                (f as i64 == *i && f != 9_223_372_036_854_775_808.0).then_some(f)
            }
            Value::Uint(u) => {
                let f = *u as f64;
                (f as u64 == *u && f != 18_446_744_073_709_551_616.0).then_some(f)
            }
            Value::BigInt(b) => {
                if let Ok(i) = i64::try_from(b) {
                    Value::Int(i).as_f64()
                } else if let Ok(u) = u64::try_from(b) {
                    Value::Uint(u).as_f64()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Returns the value as a big integer for any integer variant.
    #[must_use]
    pub fn to_bigint(&self) -> Option<BigInt> {
        match self {
            Value::Int(i) => Some(BigInt::from(*i)),
            Value::Uint(u) => Some(BigInt::from(*u)),
            Value::BigInt(b) => Some(b.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut NodeMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a key when this value is a mapping.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Collapses a big integer that fits a fixed-width variant.
    #[must_use]
    pub fn normalize_bigint(value: BigInt) -> Value {
        if let Ok(i) = i64::try_from(&value) {
            Value::Int(i)
        } else if let Ok(u) = u64::try_from(&value) {
            Value::Uint(u)
        } else {
            Value::BigInt(value)
        }
    }
}

fn integers_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Uint(x), Value::Uint(y)) => x == y,
        (Value::Int(x), Value::Uint(y)) | (Value::Uint(y), Value::Int(x)) => {
            u64::try_from(*x).map_or(false, |x| x == *y)
        }
        _ => match (a.to_bigint(), b.to_bigint()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// Floats of the same width compare by bit pattern, so a NaN equals itself
/// and `0.0` differs from `-0.0`, matching their canonical encodings. Across
/// widths the `F32` is widened first.
fn floats_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::F32(x), Value::F32(y)) => x.to_bits() == y.to_bits(),
        (Value::F64(x), Value::F64(y)) => x.to_bits() == y.to_bits(),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.to_bits() == y.to_bits(),
            _ => false,
        },
    }
}

/// Integers compare by value whatever their variant, floats by bit pattern.
/// Integers never equal floats.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (a, b) if a.is_integer() && b.is_integer() => integers_equal(a, b),
            (a, b) if a.is_float() && b.is_float() => floats_equal(a, b),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Uint(u) => serializer.serialize_u64(*u),
            Value::BigInt(b) => {
                if let Ok(i) = i128::try_from(b) {
                    serializer.serialize_i128(i)
                } else if let Ok(u) = u128::try_from(b) {
                    serializer.serialize_u128(u)
                } else {
                    serializer.collect_str(b)
                }
            }
            Value::F32(f) => serializer.serialize_f32(*f),
            Value::F64(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::List(list) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for element in list {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                use serde::ser::SerializeMap;
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("any IPLD value")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Value, E> {
                Ok(Value::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Value, E> {
                Ok(Value::Int(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Value, E> {
                Ok(Value::Uint(value))
            }

            fn visit_i128<E>(self, value: i128) -> Result<Value, E> {
                Ok(Value::normalize_bigint(BigInt::from(value)))
            }

            fn visit_u128<E>(self, value: u128) -> Result<Value, E> {
                Ok(Value::normalize_bigint(BigInt::from(value)))
            }

            fn visit_f32<E>(self, value: f32) -> Result<Value, E> {
                Ok(Value::F32(value))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Value, E> {
                Ok(Value::F64(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Value, E> {
                Ok(Value::Text(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> Result<Value, E> {
                Ok(Value::Text(value))
            }

            fn visit_bytes<E>(self, value: &[u8]) -> Result<Value, E> {
                Ok(Value::Bytes(value.to_vec()))
            }

            fn visit_byte_buf<E>(self, value: Vec<u8>) -> Result<Value, E> {
                Ok(Value::Bytes(value))
            }

            fn visit_unit<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_none<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut vec = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Value::List(vec))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut values = NodeMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    values.insert(key, value);
                }
                Ok(Value::Map(values))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

impl TryFrom<Value> for i64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value
            .as_i64()
            .ok_or_else(|| crate::Error::type_mismatch("", "i64", value.kind()))
    }
}

impl TryFrom<Value> for u64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value
            .as_u64()
            .ok_or_else(|| crate::Error::type_mismatch("", "u64", value.kind()))
    }
}

impl TryFrom<Value> for f64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| crate::Error::type_mismatch("", "f64", value.kind()))
    }
}

impl TryFrom<Value> for bool {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| crate::Error::type_mismatch("", "bool", value.kind()))
    }
}

impl TryFrom<Value> for String {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(crate::Error::type_mismatch("", "text", other.kind())),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(crate::Error::type_mismatch("", "bytes", other.kind())),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::Int(i64::from(value))
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::Uint(u64::from(value))
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64);
from_unsigned!(u8, u16, u32, u64);

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Uint(value as u64)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::BigInt(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<NodeMap> for Value {
    fn from(value: NodeMap) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_equality_crosses_variants() {
        assert_eq!(Value::Int(42), Value::Uint(42));
        assert_eq!(Value::Uint(42), Value::BigInt(BigInt::from(42)));
        assert_ne!(Value::Int(-1), Value::Uint(u64::MAX));
        assert_ne!(Value::Int(1), Value::Bool(true));
    }

    #[test]
    fn test_float_equality_crosses_widths() {
        assert_eq!(Value::F32(1.5), Value::F64(1.5));
        assert_ne!(Value::F32(0.1), Value::F64(0.1));
    }

    #[test]
    fn test_float_equality_uses_bits() {
        assert_eq!(Value::F32(f32::NAN), Value::F32(f32::NAN));
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_eq!(Value::F32(f32::NAN), Value::F64(f64::from(f32::NAN)));
        assert_ne!(Value::F64(0.0), Value::F64(-0.0));
        assert_ne!(Value::F64(f64::NAN), Value::Null);
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let a: NodeMap = vec![
            ("a".to_string(), Value::from(1)),
            ("b".to_string(), Value::from(2)),
        ]
        .into_iter()
        .collect();
        let b: NodeMap = vec![
            ("b".to_string(), Value::from(2)),
            ("a".to_string(), Value::from(1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(Value::Map(a), Value::Map(b));
    }

    #[test]
    fn test_lossless_conversions() {
        assert_eq!(Value::Uint(u64::MAX).as_i64(), None);
        assert_eq!(Value::Int(-3).as_u64(), None);
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Int(i64::MAX).as_f64(), None);
        assert_eq!(Value::BigInt(BigInt::from(u64::MAX) * 4).as_u64(), None);
        assert_eq!(Value::Text("3".into()).as_i64(), None);
    }

    #[test]
    fn test_normalize_bigint() {
        assert!(matches!(
            Value::normalize_bigint(BigInt::from(-5)),
            Value::Int(-5)
        ));
        assert!(matches!(
            Value::normalize_bigint(BigInt::from(u64::MAX)),
            Value::Uint(u64::MAX)
        ));
        assert!(matches!(
            Value::normalize_bigint(BigInt::from(u64::MAX) + 1),
            Value::BigInt(_)
        ));
    }

    #[test]
    fn test_tryfrom() {
        assert_eq!(i64::try_from(Value::Uint(9)).unwrap(), 9);
        assert!(u64::try_from(Value::Int(-9)).is_err());
        assert_eq!(String::try_from(Value::from("x")).unwrap(), "x");
        assert!(Vec::<u8>::try_from(Value::from("x")).is_err());
    }

    #[test]
    fn test_shape() {
        let mut map = NodeMap::new();
        map.insert("@link".to_string(), Value::from("Qm"));
        assert!(Value::Map(map.clone()).is_link());

        map.insert("@link".to_string(), Value::from(5));
        assert!(matches!(Value::Map(map).shape(), Shape::Node(_)));
        assert!(matches!(Value::from(1).shape(), Shape::Scalar(_)));
        assert!(matches!(Value::List(vec![]).shape(), Shape::List(_)));
    }
}
