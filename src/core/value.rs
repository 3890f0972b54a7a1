// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Decoded value type system.
//!
//! Provides a unified value representation for data decoded by preon
//! codecs. All variants are serde-serializable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Type alias for a decoded composite as field name -> value mapping.
pub type DecodedRecord = HashMap<String, Value>;

/// Unified value type for decoded binary data.
///
/// Signed integers of any declared bit width decode to `Int`, unsigned
/// ones to `UInt`. Enumerators carry the enumerator name; the codec that
/// produced them knows the wire discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean (1 bit on the wire)
    Bool(bool),

    /// Signed integer, up to 64 bits wide
    Int(i64),

    /// Unsigned integer, up to 64 bits wide
    UInt(u64),

    /// 32-bit IEEE-754 float
    Float32(f32),

    /// 64-bit IEEE-754 float
    Float64(f64),

    /// Text
    String(String),

    /// Raw binary data
    Bytes(Vec<u8>),

    /// Enumerator name
    Enum(String),

    /// Sequence of values
    List(Vec<Value>),

    /// Nested composite
    Struct(DecodedRecord),

    /// Absent value (skipped field with no declared default)
    Null,
}

impl Value {
    /// Check if this value is an integer type (signed or unsigned).
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Int(_) | Value::UInt(_))
    }

    /// Check if this value is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float32(_) | Value::Float64(_))
    }

    /// Check if this value is a container type (list or struct).
    pub fn is_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Struct(_))
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to convert this value to i64 (integer types only).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => {
                if *v <= i64::MAX as u64 {
                    Some(*v as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Try to convert this value to u64 (non-negative integers only).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => {
                if *v >= 0 {
                    Some(*v as u64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Try to get the inner boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the inner string, or the enumerator name.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the inner bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get the inner struct.
    pub fn as_struct(&self) -> Option<&DecodedRecord> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get a mutable reference to the inner struct.
    pub fn as_struct_mut(&mut self) -> Option<&mut DecodedRecord> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the inner list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the type name of this value as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Enum(v) => write!(f, "{v}"),
            Value::List(v) => write!(f, "[{} elements]", v.len()),
            Value::Struct(v) => write!(f, "{{{} fields}}", v.len()),
            Value::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_checking() {
        assert!(Value::Int(42).is_integer());
        assert!(Value::UInt(42).is_integer());
        assert!(Value::Float64(2.5).is_float());
        assert!(!Value::Float64(2.5).is_integer());
        assert!(Value::List(vec![]).is_container());
        assert!(Value::Struct(HashMap::new()).is_container());
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::Int(-7).as_i64(), Some(-7));
        assert_eq!(Value::UInt(42).as_i64(), Some(42));
        assert_eq!(Value::UInt(u64::MAX).as_i64(), None);
        assert_eq!(Value::Float64(2.5).as_i64(), None);
    }

    #[test]
    fn test_as_u64() {
        assert_eq!(Value::UInt(42).as_u64(), Some(42));
        assert_eq!(Value::Int(42).as_u64(), Some(42));
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Bool(true).as_u64(), None);
    }

    #[test]
    fn test_as_str() {
        assert_eq!(Value::String("hello".to_string()).as_str(), Some("hello"));
        assert_eq!(Value::Enum("RED".to_string()).as_str(), Some("RED"));
        assert_eq!(Value::Int(1).as_str(), None);
    }

    #[test]
    fn test_as_bytes() {
        let data = vec![1, 2, 3];
        assert_eq!(Value::Bytes(data.clone()).as_bytes(), Some(data.as_slice()));
        assert_eq!(Value::Int(1).as_bytes(), None);
    }

    #[test]
    fn test_as_struct_mut() {
        let mut map = HashMap::new();
        map.insert("field".to_string(), Value::Int(42));
        let mut val = Value::Struct(map);

        let inner = val.as_struct_mut().unwrap();
        inner.insert("new".to_string(), Value::Bool(true));
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_as_list() {
        let items = vec![Value::Int(1), Value::Int(2)];
        assert_eq!(
            Value::List(items.clone()).as_list(),
            Some(items.as_slice())
        );
        assert_eq!(Value::Int(1).as_list(), None);
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::UInt(0).type_name(), "uint");
        assert_eq!(Value::Enum("A".to_string()).type_name(), "enum");
        assert_eq!(Value::Null.type_name(), "null");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::Int(-3)), "-3");
        assert_eq!(format!("{}", Value::String("x".to_string())), "\"x\"");
        assert_eq!(format!("{}", Value::Bytes(vec![1, 2, 3])), "<3 bytes>");
        assert_eq!(format!("{}", Value::List(vec![])), "[0 elements]");
        assert_eq!(format!("{}", Value::Null), "null");
    }

    #[test]
    fn test_serialization() {
        let value = Value::Struct(HashMap::from([(
            "n".to_string(),
            Value::List(vec![Value::UInt(1), Value::Bool(false)]),
        )]));
        let json = serde_json::to_string(&value).unwrap();
        let decoded: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, value);
    }
}
