//! Decode destinations.
//!
//! A composite scanner writes each field into a caller-supplied slot. Text
//! fields carry no OID on the wire, so the slot names the type it expects.

use super::oids::{Oid, oid};
use super::registry::TypeRegistry;
use super::value::Value;
use crate::composite::CompositeFields;
use crate::error::{CodecError, CodecResult};

/// A slot that receives one decoded field.
pub trait FieldDest {
    /// Type this slot expects. Drives text decoding; `None` decodes as text.
    fn expected_oid(&self, registry: &TypeRegistry) -> Option<Oid>;

    /// Store a decoded value, `None` being SQL NULL.
    fn assign(&mut self, value: Option<Value>) -> CodecResult<()>;

    /// Decode a non-null text field in place, bypassing the registry.
    fn decode_text_direct(
        &mut self,
        _registry: &TypeRegistry,
        _src: &str,
    ) -> Option<CodecResult<()>> {
        None
    }

    /// Decode a non-null binary field in place, bypassing the registry.
    fn decode_binary_direct(
        &mut self,
        _registry: &TypeRegistry,
        _oid: Oid,
        _src: &[u8],
    ) -> Option<CodecResult<()>> {
        None
    }
}

/// Conversion from a decoded [`Value`] into a concrete Rust type.
pub trait FromValue: Sized {
    /// OID requested when decoding text into this type.
    const OID: Oid;
    /// Type name used in assignment errors.
    const NAME: &'static str;

    fn from_value(value: Value) -> CodecResult<Self>;
}

fn mismatch<T: FromValue>(value: &Value) -> CodecError {
    CodecError::Assign {
        from: value.kind_name(),
        to: T::NAME,
    }
}

macro_rules! impl_from_value {
    ($ty:ty, $oid:expr, $name:literal, |$v:ident| $convert:expr) => {
        impl FromValue for $ty {
            const OID: Oid = $oid;
            const NAME: &'static str = $name;

            fn from_value(value: Value) -> CodecResult<Self> {
                let $v = &value;
                let converted: Option<$ty> = $convert;
                converted.ok_or_else(|| mismatch::<$ty>(&value))
            }
        }

        impl FieldDest for $ty {
            fn expected_oid(&self, _registry: &TypeRegistry) -> Option<Oid> {
                Some(<$ty as FromValue>::OID)
            }

            fn assign(&mut self, value: Option<Value>) -> CodecResult<()> {
                let value = value.ok_or(CodecError::Assign {
                    from: "null",
                    to: <$ty as FromValue>::NAME,
                })?;
                *self = <$ty>::from_value(value)?;
                Ok(())
            }
        }
    };
}

impl_from_value!(bool, oid::BOOL, "bool", |v| v.as_bool());
impl_from_value!(i16, oid::INT2, "i16", |v| match v {
    Value::Int2(n) => Some(*n),
    _ => None,
});
impl_from_value!(i32, oid::INT4, "i32", |v| match v {
    Value::Int2(n) => Some(i32::from(*n)),
    Value::Int4(n) => Some(*n),
    _ => None,
});
impl_from_value!(i64, oid::INT8, "i64", |v| v.as_i64());
impl_from_value!(f32, oid::FLOAT4, "f32", |v| match v {
    Value::Float4(n) => Some(*n),
    _ => None,
});
impl_from_value!(f64, oid::FLOAT8, "f64", |v| v.as_f64());
impl_from_value!(String, oid::TEXT, "String", |v| v.as_str().map(str::to_owned));
impl_from_value!(Vec<u8>, oid::BYTEA, "Vec<u8>", |v| v.as_bytes().map(<[u8]>::to_vec));
impl_from_value!(u32, oid::OID, "u32", |v| match v {
    Value::Oid(n) | Value::Cid(n) => Some(*n),
    _ => None,
});
impl_from_value!(CompositeFields, oid::RECORD, "CompositeFields", |v| v.as_record().cloned());

impl<T: FromValue> FieldDest for Option<T> {
    fn expected_oid(&self, _registry: &TypeRegistry) -> Option<Oid> {
        Some(T::OID)
    }

    fn assign(&mut self, value: Option<Value>) -> CodecResult<()> {
        *self = value.map(T::from_value).transpose()?;
        Ok(())
    }
}

/// A `Value` slot expects the type of its current contents; a NULL slot
/// accepts anything. Nested records decode into their existing fields.
impl FieldDest for Value {
    fn expected_oid(&self, registry: &TypeRegistry) -> Option<Oid> {
        registry.resolve(self).map(|d| d.oid())
    }

    fn assign(&mut self, value: Option<Value>) -> CodecResult<()> {
        *self = value.unwrap_or(Value::Null);
        Ok(())
    }

    fn decode_text_direct(
        &mut self,
        registry: &TypeRegistry,
        src: &str,
    ) -> Option<CodecResult<()>> {
        match self {
            Value::Record(fields) if !fields.is_empty() => {
                Some(fields.decode_text(registry, Some(src.as_bytes())))
            }
            _ => None,
        }
    }

    fn decode_binary_direct(
        &mut self,
        registry: &TypeRegistry,
        _oid: Oid,
        src: &[u8],
    ) -> Option<CodecResult<()>> {
        match self {
            Value::Record(fields) if !fields.is_empty() => {
                Some(fields.decode_binary(registry, Some(src)))
            }
            _ => None,
        }
    }
}
