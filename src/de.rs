//! Deserialization of Rust values out of a [`Value`] tree.
//!
//! ```rust
//! use ipld_stream::{from_value, ipld};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, Debug, PartialEq)]
//! struct Entry {
//!     name: String,
//!     size: Option<u32>,
//! }
//!
//! let entry: Entry = from_value(ipld!({"name": "a", "size": 3})).unwrap();
//! assert_eq!(entry, Entry { name: "a".to_string(), size: Some(3) });
//! ```

use crate::{Error, NodeMap, Result, Value};
use serde::de::value::{MapDeserializer, SeqDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, IntoDeserializer};
use serde::forward_to_deserialize_any;

/// Converts a [`Value`] into any `DeserializeOwned` type.
///
/// # Errors
///
/// Fails when the tree does not have the shape `T` expects.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(ValueDeserializer::new(value))
}

/// A deserializer reading from an owned [`Value`].
#[derive(Debug)]
pub struct ValueDeserializer {
    value: Value,
}

impl ValueDeserializer {
    pub fn new(value: Value) -> Self {
        ValueDeserializer { value }
    }
}

impl<'de> IntoDeserializer<'de, Error> for Value {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> ValueDeserializer {
        ValueDeserializer::new(self)
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i64(i),
            Value::Uint(u) => visitor.visit_u64(u),
            Value::BigInt(b) => {
                if let Ok(i) = i128::try_from(&b) {
                    visitor.visit_i128(i)
                } else if let Ok(u) = u128::try_from(&b) {
                    visitor.visit_u128(u)
                } else {
                    visitor.visit_string(b.to_string())
                }
            }
            Value::F32(f) => visitor.visit_f32(f),
            Value::F64(f) => visitor.visit_f64(f),
            Value::Text(s) => visitor.visit_string(s),
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::List(list) => visit_list(list, visitor),
            Value::Map(map) => visit_map(map, visitor),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::Text(variant) => visitor.visit_enum(Tagged {
                variant,
                payload: None,
            }),
            Value::Map(map) if map.len() == 1 => {
                let (variant, payload) = map
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::custom("empty enum mapping"))?;
                visitor.visit_enum(Tagged {
                    variant,
                    payload: Some(payload),
                })
            }
            other => Err(Error::custom(format!(
                "expected an enum as text or a single-entry mapping, found {}",
                other.kind()
            ))),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

fn visit_list<'de, V: de::Visitor<'de>>(list: Vec<Value>, visitor: V) -> Result<V::Value> {
    let mut seq: SeqDeserializer<_, Error> = SeqDeserializer::new(list.into_iter());
    let out = visitor.visit_seq(&mut seq)?;
    seq.end()?;
    Ok(out)
}

fn visit_map<'de, V: de::Visitor<'de>>(map: NodeMap, visitor: V) -> Result<V::Value> {
    let mut entries: MapDeserializer<_, Error> = MapDeserializer::new(map.into_iter());
    let out = visitor.visit_map(&mut entries)?;
    entries.end()?;
    Ok(out)
}

/// An externally tagged variant: its name and, unless it is a unit
/// variant, its payload.
struct Tagged {
    variant: String,
    payload: Option<Value>,
}

impl<'de> de::EnumAccess<'de> for Tagged {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self)>
    where
        V: de::DeserializeSeed<'de>,
    {
        let name: StringDeserializer<Error> = self.variant.clone().into_deserializer();
        let variant = seed.deserialize(name)?;
        Ok((variant, self))
    }
}

impl<'de> de::VariantAccess<'de> for Tagged {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.payload {
            None | Some(Value::Null) => Ok(()),
            Some(other) => Err(Error::custom(format!("unit variant carries a {}", other.kind()))),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: de::DeserializeSeed<'de>,
    {
        let payload = self.payload.unwrap_or(Value::Null);
        seed.deserialize(ValueDeserializer::new(payload))
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.payload {
            Some(Value::List(list)) => visit_list(list, visitor),
            _ => Err(Error::custom(format!("tuple variant {} needs a list", self.variant))),
        }
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.payload {
            Some(Value::Map(map)) => visit_map(map, visitor),
            _ => Err(Error::custom(format!("struct variant {} needs a mapping", self.variant))),
        }
    }
}
