//! Values accepted by the cache.
//!
//! [`CacheValue`] is a closed set of shapes. Encoding to the durable tier's
//! byte form is a single `match`:
//!
//! | variant      | durable bytes                         |
//! |--------------|---------------------------------------|
//! | `Bytes`      | unchanged                             |
//! | `Text`       | UTF-8, unchanged                      |
//! | `Int`/`UInt` | decimal text (`"42"`, `"-7"`)         |
//! | `Float`      | shortest round-trip decimal (`"0.1"`) |
//! | `Bool`       | `"1"` / `"0"`                         |
//! | `Structured` | JSON via `serde_json`                 |
//!
//! # Example
//!
//! ```
//! use tiered_cache::CacheValue;
//!
//! assert_eq!(CacheValue::from(42).encode().unwrap(), b"42");
//! assert_eq!(CacheValue::from(true).encode().unwrap(), b"1");
//! assert_eq!(CacheValue::from("hi").encode().unwrap(), b"hi");
//! ```

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Bytes(Vec<u8>),
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Structured(Value),
}

impl CacheValue {
    /// Serialize any `Serialize` type into the `Structured` variant.
    ///
    /// Fails for shapes JSON cannot express, e.g. maps with non-string keys.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(CacheValue::Structured)
    }

    /// Encode to the byte form stored in the durable tier.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        Ok(match self {
            CacheValue::Bytes(b) => b.clone(),
            CacheValue::Text(s) => s.as_bytes().to_vec(),
            CacheValue::Int(n) => n.to_string().into_bytes(),
            CacheValue::UInt(n) => n.to_string().into_bytes(),
            CacheValue::Float(f) => f.to_string().into_bytes(),
            CacheValue::Bool(true) => b"1".to_vec(),
            CacheValue::Bool(false) => b"0".to_vec(),
            CacheValue::Structured(v) => serde_json::to_vec(v)?,
        })
    }

    /// Variant name, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CacheValue::Bytes(_) => "bytes",
            CacheValue::Text(_) => "text",
            CacheValue::Int(_) => "int",
            CacheValue::UInt(_) => "uint",
            CacheValue::Float(_) => "float",
            CacheValue::Bool(_) => "bool",
            CacheValue::Structured(_) => "structured",
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CacheValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CacheValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_bytes(&self) -> bool {
        matches!(self, CacheValue::Bytes(_))
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(v: Vec<u8>) -> Self {
        CacheValue::Bytes(v)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(v: &[u8]) -> Self {
        CacheValue::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for CacheValue {
    fn from(v: &[u8; N]) -> Self {
        CacheValue::Bytes(v.to_vec())
    }
}

impl From<String> for CacheValue {
    fn from(v: String) -> Self {
        CacheValue::Text(v)
    }
}

impl From<&str> for CacheValue {
    fn from(v: &str) -> Self {
        CacheValue::Text(v.to_string())
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for CacheValue {
            fn from(v: $t) -> Self {
                CacheValue::Int(i64::from(v))
            }
        }
    )*};
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for CacheValue {
            fn from(v: $t) -> Self {
                CacheValue::UInt(u64::from(v))
            }
        }
    )*};
}

from_signed!(i8, i16, i32, i64);
from_unsigned!(u8, u16, u32, u64);

// usize/isize are at most 64 bits on every supported target
impl From<usize> for CacheValue {
    fn from(v: usize) -> Self {
        CacheValue::UInt(v as u64)
    }
}

impl From<isize> for CacheValue {
    fn from(v: isize) -> Self {
        CacheValue::Int(v as i64)
    }
}

impl From<f64> for CacheValue {
    fn from(v: f64) -> Self {
        CacheValue::Float(v)
    }
}

impl From<f32> for CacheValue {
    fn from(v: f32) -> Self {
        CacheValue::Float(f64::from(v))
    }
}

impl From<bool> for CacheValue {
    fn from(v: bool) -> Self {
        CacheValue::Bool(v)
    }
}

impl From<Value> for CacheValue {
    fn from(v: Value) -> Self {
        CacheValue::Structured(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_bytes_and_text_pass_through() {
        assert_eq!(CacheValue::from(vec![0u8, 159, 146, 150]).encode().unwrap(), vec![0, 159, 146, 150]);
        assert_eq!(CacheValue::from("héllo").encode().unwrap(), "héllo".as_bytes());
        assert_eq!(CacheValue::from(b"raw").encode().unwrap(), b"raw");
    }

    #[test]
    fn test_numbers_encode_as_decimal_text() {
        assert_eq!(CacheValue::from(-7i32).encode().unwrap(), b"-7");
        assert_eq!(CacheValue::from(u64::MAX).encode().unwrap(), u64::MAX.to_string().as_bytes());
        assert_eq!(CacheValue::from(0.1f64).encode().unwrap(), b"0.1");
        assert_eq!(CacheValue::from(2.0f64).encode().unwrap(), b"2");
        assert_eq!(CacheValue::from(1.5f32).encode().unwrap(), b"1.5");
    }

    #[test]
    fn test_machine_sized_and_byte_ints() {
        let items = vec!["a", "b", "c"];
        assert_eq!(CacheValue::from(items.len()), CacheValue::UInt(3));
        assert_eq!(CacheValue::from(-4isize), CacheValue::Int(-4));
        assert_eq!(CacheValue::from(5u8), CacheValue::UInt(5));
        assert_eq!(CacheValue::from(255u8).encode().unwrap(), b"255");
        assert_eq!(CacheValue::from(usize::MAX).encode().unwrap(), usize::MAX.to_string().as_bytes());
    }

    #[test]
    fn test_bools_encode_as_one_and_zero() {
        assert_eq!(CacheValue::from(true).encode().unwrap(), b"1");
        assert_eq!(CacheValue::from(false).encode().unwrap(), b"0");
    }

    #[test]
    fn test_structured_encodes_as_json() {
        let v = CacheValue::from(json!({"name": "alice", "roles": ["admin"]}));
        let bytes = v.encode().unwrap();
        let back: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, json!({"name": "alice", "roles": ["admin"]}));
    }

    #[test]
    fn test_structured_rejects_non_string_map_keys() {
        let mut map: BTreeMap<(u8, u8), u8> = BTreeMap::new();
        map.insert((1, 2), 3);
        assert!(CacheValue::structured(&map).is_err());
    }

    #[test]
    fn test_kind_and_accessors() {
        let bytes = CacheValue::from(vec![1u8]);
        assert_eq!(bytes.kind(), "bytes");
        assert!(bytes.is_bytes());
        assert_eq!(bytes.as_bytes(), Some(&[1u8][..]));

        let text = CacheValue::from("t");
        assert_eq!(text.kind(), "text");
        assert_eq!(text.as_str(), Some("t"));
        assert_eq!(text.as_bytes(), None);

        assert_eq!(CacheValue::from(5i64).as_i64(), Some(5));
        assert_eq!(CacheValue::from(5u32).kind(), "uint");
    }
}
