//! Runtime field values.
//!
//! [`Value`] is the closed set of things a composite slot can hold. Plain
//! primitives resolve through the registry by kind; [`Value::Custom`] carries
//! an opaque value that resolves by its registered type name and may encode
//! itself directly.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::encode::{BinaryEncode, Encodable, TextEncode};
use crate::composite::CompositeFields;

/// Wire format of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i16)]
pub enum Format {
    /// Text format (0)
    #[default]
    Text = 0,
    /// Binary format (1)
    Binary = 1,
}

impl Format {
    /// Protocol format code.
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl TryFrom<i16> for Format {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Format::Text),
            1 => Ok(Format::Binary),
            _ => Err(value),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Text => write!(f, "text"),
            Format::Binary => write!(f, "binary"),
        }
    }
}

/// An opaque value resolved through the registry by its type name.
///
/// Implementors may also expose their own text/binary encoders through
/// [`Encodable`]; those are used before the registry prototype.
pub trait CustomValue: Encodable {
    /// Name of the registry entry describing this value's type.
    fn type_name(&self) -> &str;
}

/// A single composite field value.
#[derive(Debug, Clone, Serialize)]
pub enum Value {
    /// Untyped SQL NULL.
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Text(String),
    Bytea(Vec<u8>),
    Oid(u32),
    /// Command identifier.
    Cid(u32),
    /// Nested anonymous composite.
    Record(CompositeFields),
    Custom(#[serde(serialize_with = "serialize_custom")] Arc<dyn CustomValue>),
}

fn serialize_custom<S: Serializer>(value: &Arc<dyn CustomValue>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&format_args!("{value:?}"))
}

impl Value {
    /// Wrap a custom value.
    pub fn custom(value: impl CustomValue + 'static) -> Self {
        Value::Custom(Arc::new(value))
    }

    /// Returns true if this is an untyped NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the registry entry this value resolves to. `None` for NULL,
    /// which carries no type on its own.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Value::Null => None,
            Value::Custom(custom) => Some(custom.type_name()),
            other => Some(other.kind_name()),
        }
    }

    /// Short kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int2(_) => "int2",
            Value::Int4(_) => "int4",
            Value::Int8(_) => "int8",
            Value::Float4(_) => "float4",
            Value::Float8(_) => "float8",
            Value::Text(_) => "text",
            Value::Bytea(_) => "bytea",
            Value::Oid(_) => "oid",
            Value::Cid(_) => "cid",
            Value::Record(_) => "record",
            Value::Custom(_) => "custom",
        }
    }

    /// The value's own text encoder, bypassing the registry prototype.
    pub fn direct_text(&self) -> Option<&dyn TextEncode> {
        match self {
            Value::Record(fields) => fields.as_text(),
            Value::Custom(custom) => custom.as_text(),
            _ => None,
        }
    }

    /// The value's own binary encoder, bypassing the registry prototype.
    pub fn direct_binary(&self) -> Option<&dyn BinaryEncode> {
        match self {
            Value::Record(fields) => fields.as_binary(),
            Value::Custom(custom) => custom.as_binary(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(*v),
            Value::Int4(v) => Some(i64::from(*v)),
            Value::Int2(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float8(v) => Some(*v),
            Value::Float4(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytea(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&CompositeFields> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int2(a), Value::Int2(b)) => a == b,
            (Value::Int4(a), Value::Int4(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Float4(a), Value::Float4(b)) => a == b,
            (Value::Float8(a), Value::Float8(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytea(a), Value::Bytea(b)) => a == b,
            (Value::Oid(a), Value::Oid(b)) => a == b,
            (Value::Cid(a), Value::Cid(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Custom(a), Value::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i16 => Int2,
    i32 => Int4,
    i64 => Int8,
    f32 => Float4,
    f64 => Float8,
    String => Text,
    &str => Text,
    Vec<u8> => Bytea,
    &[u8] => Bytea,
    CompositeFields => Record,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name() {
        assert_eq!(Value::Null.type_name(), None);
        assert_eq!(Value::from(1i32).type_name(), Some("int4"));
        assert_eq!(Value::from("a").type_name(), Some("text"));
        assert_eq!(Value::Cid(3).type_name(), Some("cid"));
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Int8(7));
    }

    #[test]
    fn test_widening_accessors() {
        assert_eq!(Value::Int2(-4).as_i64(), Some(-4));
        assert_eq!(Value::Float4(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Text("x".into()).as_i64(), None);
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(Format::try_from(1), Ok(Format::Binary));
        assert_eq!(Format::try_from(7), Err(7));
        assert_eq!(Format::Text.as_i16(), 0);
        assert_eq!(Format::Binary.to_string(), "binary");
    }

    #[test]
    fn test_serialize_dump() {
        let dump = serde_json::to_string(&Value::Int4(300)).unwrap();
        assert_eq!(dump, r#"{"Int4":300}"#);
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), r#""Null""#);
    }
}
