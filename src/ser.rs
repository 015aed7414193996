//! Serialization of Rust values into a [`Value`] tree.
//!
//! Byte slices become [`Value::Bytes`], `u64` stays unsigned and 128-bit
//! integers become [`Value::BigInt`] only when they do not fit in 64 bits.
//! Enum variants carrying data are externally tagged: `{"Variant": data}`.
//!
//! ```rust
//! use ipld_stream::{to_value, Value};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Entry<'a> {
//!     name: &'a str,
//!     #[serde(with = "serde_bytes_like")]
//!     data: &'a [u8],
//! }
//!
//! mod serde_bytes_like {
//!     pub fn serialize<S: serde::Serializer>(b: &[u8], s: S) -> Result<S::Ok, S::Error> {
//!         s.serialize_bytes(b)
//!     }
//! }
//!
//! let value = to_value(&Entry { name: "a", data: b"xy" }).unwrap();
//! assert_eq!(value.get("data"), Some(&Value::Bytes(b"xy".to_vec())));
//! ```

use crate::{Error, NodeMap, Result, Value};
use num_bigint::BigInt;
use serde::{ser, Serialize};

/// Converts any `Serialize` value into a [`Value`].
///
/// # Errors
///
/// Fails if a map key does not serialize to text or an integer, or if the
/// value's own `Serialize` impl reports an error.
pub fn to_value<T>(value: &T) -> Result<Value>
where
    T: ?Sized + Serialize,
{
    value.serialize(ValueSerializer)
}

/// A serializer whose output is a [`Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueSerializer;

pub struct ListCollector {
    items: Vec<Value>,
    variant: Option<&'static str>,
}

pub struct NodeCollector {
    map: NodeMap,
    pending_key: Option<String>,
    variant: Option<&'static str>,
}

fn tagged(variant: Option<&'static str>, value: Value) -> Value {
    match variant {
        Some(name) => {
            let mut map = NodeMap::with_capacity(1);
            map.insert(name.to_string(), value);
            Value::Map(map)
        }
        None => value,
    }
}

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = ListCollector;
    type SerializeTuple = ListCollector;
    type SerializeTupleStruct = ListCollector;
    type SerializeTupleVariant = ListCollector;
    type SerializeMap = NodeCollector;
    type SerializeStruct = NodeCollector;
    type SerializeStructVariant = NodeCollector;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::Int(i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::Int(i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::Int(i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::Int(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        Ok(Value::normalize_bigint(BigInt::from(v)))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::Uint(u64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::Uint(u64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::Uint(u64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(Value::Uint(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        Ok(Value::normalize_bigint(BigInt::from(v)))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::F32(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::F64(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::Text(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::Text(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::Text(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        Ok(tagged(Some(variant), to_value(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ListCollector> {
        Ok(ListCollector::new(len.unwrap_or(0), None))
    }

    fn serialize_tuple(self, len: usize) -> Result<ListCollector> {
        Ok(ListCollector::new(len, None))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<ListCollector> {
        Ok(ListCollector::new(len, None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<ListCollector> {
        Ok(ListCollector::new(len, Some(variant)))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<NodeCollector> {
        Ok(NodeCollector::new(len.unwrap_or(0), None))
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<NodeCollector> {
        Ok(NodeCollector::new(len, None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<NodeCollector> {
        Ok(NodeCollector::new(len, Some(variant)))
    }
}

impl ListCollector {
    fn new(capacity: usize, variant: Option<&'static str>) -> Self {
        ListCollector {
            items: Vec::with_capacity(capacity),
            variant,
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn finish(self) -> Value {
        tagged(self.variant, Value::List(self.items))
    }
}

impl NodeCollector {
    fn new(capacity: usize, variant: Option<&'static str>) -> Self {
        NodeCollector {
            map: NodeMap::with_capacity(capacity),
            pending_key: None,
            variant,
        }
    }

    fn finish(self) -> Value {
        tagged(self.variant, Value::Map(self.map))
    }
}

impl ser::SerializeSeq for ListCollector {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for ListCollector {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for ListCollector {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for ListCollector {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeMap for NodeCollector {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = match to_value(key)? {
            Value::Text(s) => s,
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => u.to_string(),
            other => {
                return Err(Error::custom(format!(
                    "mapping keys must be text, not {}",
                    other.kind()
                )))
            }
        };
        self.pending_key = Some(key);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| Error::custom("map value arrived before its key"))?;
        self.map.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for NodeCollector {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(key.to_string(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for NodeCollector {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(key.to_string(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipld;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Point {
        x: i32,
        y: u64,
    }

    #[derive(Serialize)]
    enum Shape {
        Empty,
        Circle(f64),
        Line(u8, u8),
        Rect { w: u8 },
    }

    #[test]
    fn test_struct() {
        let value = to_value(&Point { x: -1, y: u64::MAX }).unwrap();
        assert!(matches!(value.get("x"), Some(Value::Int(-1))));
        assert!(matches!(value.get("y"), Some(Value::Uint(u64::MAX))));
    }

    #[test]
    fn test_wide_integers() {
        assert!(matches!(to_value(&5i128).unwrap(), Value::Int(5)));
        assert!(matches!(to_value(&u128::MAX).unwrap(), Value::BigInt(_)));
    }

    #[test]
    fn test_enum_variants() {
        assert_eq!(to_value(&Shape::Empty).unwrap(), Value::from("Empty"));
        assert_eq!(to_value(&Shape::Circle(1.5)).unwrap(), ipld!({"Circle": 1.5}));
        assert_eq!(to_value(&Shape::Line(1, 2)).unwrap(), ipld!({"Line": [1, 2]}));
        assert_eq!(to_value(&Shape::Rect { w: 3 }).unwrap(), ipld!({"Rect": {"w": 3}}));
    }

    #[test]
    fn test_integer_keys() {
        let mut map = BTreeMap::new();
        map.insert(7u32, "seven");
        assert_eq!(to_value(&map).unwrap(), ipld!({"7": "seven"}));
    }

    #[test]
    fn test_non_text_key_is_rejected() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);
        assert!(to_value(&map).is_err());
    }
}
