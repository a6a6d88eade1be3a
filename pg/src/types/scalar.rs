//! Built-in scalar codecs.
//!
//! Binary forms delegate to `postgres_protocol::types`. Text forms follow the
//! PostgreSQL output functions: `t`/`f` for bool, shortest round-trip floats,
//! hex bytea.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};
use postgres_protocol::types;

use super::encode::{BinaryEncode, Encodable, IsNull, TextEncode};
use super::oids::{Oid, oid};
use super::registry::{TypeCodec, TypeRegistry};
use super::value::Value;
use crate::error::{CodecError, CodecResult};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// A built-in scalar type.
///
/// The text variant serves every text-family OID (`text`, `varchar`,
/// `bpchar`, `name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Text,
    Bytea,
    Oid,
    Cid,
}

impl ScalarType {
    /// Canonical registry name.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int2 => "int2",
            ScalarType::Int4 => "int4",
            ScalarType::Int8 => "int8",
            ScalarType::Float4 => "float4",
            ScalarType::Float8 => "float8",
            ScalarType::Text => "text",
            ScalarType::Bytea => "bytea",
            ScalarType::Oid => "oid",
            ScalarType::Cid => "cid",
        }
    }

    /// Canonical OID.
    pub fn oid(self) -> Oid {
        match self {
            ScalarType::Bool => oid::BOOL,
            ScalarType::Int2 => oid::INT2,
            ScalarType::Int4 => oid::INT4,
            ScalarType::Int8 => oid::INT8,
            ScalarType::Float4 => oid::FLOAT4,
            ScalarType::Float8 => oid::FLOAT8,
            ScalarType::Text => oid::TEXT,
            ScalarType::Bytea => oid::BYTEA,
            ScalarType::Oid => oid::OID,
            ScalarType::Cid => oid::CID,
        }
    }

    /// Convert `value` to this type's canonical variant. Only lossless
    /// widenings are accepted.
    fn coerce(self, value: &Value) -> CodecResult<Value> {
        let coerced = match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (ScalarType::Bool, Value::Bool(v)) => Some(Value::Bool(*v)),
            (ScalarType::Int2, Value::Int2(v)) => Some(Value::Int2(*v)),
            (ScalarType::Int4, Value::Int2(v)) => Some(Value::Int4(i32::from(*v))),
            (ScalarType::Int4, Value::Int4(v)) => Some(Value::Int4(*v)),
            (ScalarType::Int8, v) => v.as_i64().map(Value::Int8),
            (ScalarType::Float4, Value::Float4(v)) => Some(Value::Float4(*v)),
            (ScalarType::Float8, v) => v.as_f64().map(Value::Float8),
            (ScalarType::Text, Value::Text(v)) => Some(Value::Text(v.clone())),
            (ScalarType::Bytea, Value::Bytea(v)) => Some(Value::Bytea(v.clone())),
            (ScalarType::Oid, Value::Oid(v)) => Some(Value::Oid(*v)),
            (ScalarType::Cid, Value::Cid(v)) => Some(Value::Cid(*v)),
            _ => None,
        };
        coerced.ok_or(CodecError::Assign {
            from: value.kind_name(),
            to: self.name(),
        })
    }
}

impl TypeCodec for ScalarType {
    fn set(&self, value: &Value) -> CodecResult<Box<dyn Encodable>> {
        Ok(Box::new(Scalar(self.coerce(value)?)))
    }

    fn decode_text(&self, _registry: &TypeRegistry, src: &str) -> CodecResult<Value> {
        let name = self.name();
        let value = match self {
            ScalarType::Bool => Value::Bool(parse_bool(src)?),
            ScalarType::Int2 => Value::Int2(parse_text(name, src)?),
            ScalarType::Int4 => Value::Int4(parse_text(name, src)?),
            ScalarType::Int8 => Value::Int8(parse_text(name, src)?),
            ScalarType::Float4 => Value::Float4(parse_text(name, src)?),
            ScalarType::Float8 => Value::Float8(parse_text(name, src)?),
            ScalarType::Text => Value::Text(src.to_owned()),
            ScalarType::Bytea => Value::Bytea(parse_bytea(src)?),
            ScalarType::Oid => Value::Oid(parse_text(name, src)?),
            ScalarType::Cid => Value::Cid(parse_text(name, src)?),
        };
        Ok(value)
    }

    fn decode_binary(&self, _registry: &TypeRegistry, src: &[u8]) -> CodecResult<Value> {
        let name = self.name();
        let invalid = |e: Box<dyn std::error::Error + Sync + Send>| CodecError::invalid(name, e);
        let value = match self {
            ScalarType::Bool => Value::Bool(types::bool_from_sql(src).map_err(invalid)?),
            ScalarType::Int2 => Value::Int2(types::int2_from_sql(src).map_err(invalid)?),
            ScalarType::Int4 => Value::Int4(types::int4_from_sql(src).map_err(invalid)?),
            ScalarType::Int8 => Value::Int8(types::int8_from_sql(src).map_err(invalid)?),
            ScalarType::Float4 => Value::Float4(types::float4_from_sql(src).map_err(invalid)?),
            ScalarType::Float8 => Value::Float8(types::float8_from_sql(src).map_err(invalid)?),
            ScalarType::Text => Value::Text(types::text_from_sql(src).map_err(invalid)?.to_owned()),
            ScalarType::Bytea => Value::Bytea(types::bytea_from_sql(src).to_vec()),
            ScalarType::Oid => Value::Oid(types::oid_from_sql(src).map_err(invalid)?),
            ScalarType::Cid => Value::Cid(types::oid_from_sql(src).map_err(invalid)?),
        };
        Ok(value)
    }
}

/// A value bound to a built-in scalar codec.
#[derive(Debug)]
struct Scalar(Value);

impl Encodable for Scalar {
    fn as_text(&self) -> Option<&dyn TextEncode> {
        Some(self)
    }

    fn as_binary(&self) -> Option<&dyn BinaryEncode> {
        Some(self)
    }
}

impl TextEncode for Scalar {
    fn encode_text(&self, _registry: &TypeRegistry, buf: &mut BytesMut) -> CodecResult<IsNull> {
        match &self.0 {
            Value::Null => return Ok(IsNull::Yes),
            Value::Bool(v) => buf.put_u8(if *v { b't' } else { b'f' }),
            Value::Int2(v) => write_int(buf, *v),
            Value::Int4(v) => write_int(buf, *v),
            Value::Int8(v) => write_int(buf, *v),
            Value::Float4(v) => {
                match special_float(v.is_nan(), v.is_infinite(), v.is_sign_negative()) {
                    Some(s) => buf.extend_from_slice(s.as_bytes()),
                    None => write_float(buf, *v),
                }
            }
            Value::Float8(v) => {
                match special_float(v.is_nan(), v.is_infinite(), v.is_sign_negative()) {
                    Some(s) => buf.extend_from_slice(s.as_bytes()),
                    None => write_float(buf, *v),
                }
            }
            Value::Text(v) => buf.extend_from_slice(v.as_bytes()),
            Value::Bytea(v) => write_bytea_hex(buf, v),
            Value::Oid(v) | Value::Cid(v) => write_int(buf, *v),
            other => {
                return Err(CodecError::UnsupportedEncoding {
                    value: format!("{other:?}"),
                    format: super::Format::Text,
                });
            }
        }
        Ok(IsNull::No)
    }
}

impl BinaryEncode for Scalar {
    fn encode_binary(&self, _registry: &TypeRegistry, buf: &mut BytesMut) -> CodecResult<IsNull> {
        match &self.0 {
            Value::Null => return Ok(IsNull::Yes),
            Value::Bool(v) => types::bool_to_sql(*v, buf),
            Value::Int2(v) => types::int2_to_sql(*v, buf),
            Value::Int4(v) => types::int4_to_sql(*v, buf),
            Value::Int8(v) => types::int8_to_sql(*v, buf),
            Value::Float4(v) => types::float4_to_sql(*v, buf),
            Value::Float8(v) => types::float8_to_sql(*v, buf),
            Value::Text(v) => types::text_to_sql(v, buf),
            Value::Bytea(v) => types::bytea_to_sql(v, buf),
            Value::Oid(v) | Value::Cid(v) => types::oid_to_sql(*v, buf),
            other => {
                return Err(CodecError::UnsupportedEncoding {
                    value: format!("{other:?}"),
                    format: super::Format::Binary,
                });
            }
        }
        Ok(IsNull::No)
    }
}

fn parse_text<T>(type_name: &'static str, src: &str) -> CodecResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    src.trim().parse().map_err(|e| CodecError::invalid(type_name, e))
}

fn write_int(buf: &mut BytesMut, v: impl itoa::Integer) {
    buf.extend_from_slice(itoa::Buffer::new().format(v).as_bytes());
}

fn write_float(buf: &mut BytesMut, v: impl ryu::Float) {
    buf.extend_from_slice(ryu::Buffer::new().format_finite(v).as_bytes());
}

fn special_float(is_nan: bool, is_infinite: bool, negative: bool) -> Option<&'static str> {
    if is_nan {
        Some("NaN")
    } else if is_infinite {
        Some(if negative { "-Infinity" } else { "Infinity" })
    } else {
        None
    }
}

fn parse_bool(src: &str) -> CodecResult<bool> {
    let s = src.trim();
    const TRUE: [&str; 5] = ["t", "true", "yes", "on", "1"];
    const FALSE: [&str; 5] = ["f", "false", "no", "off", "0"];
    if TRUE.iter().any(|t| s.eq_ignore_ascii_case(t)) {
        Ok(true)
    } else if FALSE.iter().any(|f| s.eq_ignore_ascii_case(f)) {
        Ok(false)
    } else {
        Err(CodecError::invalid("bool", format!("{s:?}")))
    }
}

/// Write bytea in hex format: `\x` followed by two lowercase digits per byte.
fn write_bytea_hex(buf: &mut BytesMut, bytes: &[u8]) {
    buf.reserve(2 + bytes.len() * 2);
    buf.extend_from_slice(b"\\x");
    for &b in bytes {
        buf.put_u8(HEX_DIGITS[(b >> 4) as usize]);
        buf.put_u8(HEX_DIGITS[(b & 0x0f) as usize]);
    }
}

/// Parse bytea text in hex (`\x..`) or legacy escape format.
fn parse_bytea(src: &str) -> CodecResult<Vec<u8>> {
    let bytes = src.as_bytes();
    if let Some(hex) = bytes.strip_prefix(b"\\x") {
        if hex.len() % 2 != 0 {
            return Err(CodecError::invalid("bytea", "odd number of hex digits"));
        }
        return hex
            .chunks_exact(2)
            .map(|pair| Ok((hex_value(pair[0])? << 4) | hex_value(pair[1])?))
            .collect();
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'\\') => {
                out.push(b'\\');
                i += 2;
            }
            b'\\' => {
                let octal = bytes
                    .get(i + 1..i + 4)
                    .filter(|d| d.iter().all(|c| (b'0'..=b'7').contains(c)))
                    .ok_or_else(|| CodecError::invalid("bytea", "invalid escape sequence"))?;
                let v = octal.iter().fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
                out.push(u8::try_from(v).map_err(|e| CodecError::invalid("bytea", e))?);
                i += 4;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn hex_value(c: u8) -> CodecResult<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(CodecError::invalid("bytea", format!("invalid hex digit {:?}", c as char))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(ty: ScalarType, value: Value) -> String {
        let registry = TypeRegistry::new();
        let bound = ty.set(&value).unwrap();
        let mut buf = BytesMut::new();
        let is_null = bound.as_text().unwrap().encode_text(&registry, &mut buf).unwrap();
        assert_eq!(is_null, IsNull::No);
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn test_text_forms() {
        assert_eq!(text(ScalarType::Bool, Value::Bool(true)), "t");
        assert_eq!(text(ScalarType::Int4, Value::Int4(-42)), "-42");
        assert_eq!(text(ScalarType::Float8, Value::Float8(1.5)), "1.5");
        assert_eq!(text(ScalarType::Float8, Value::Float8(f64::NEG_INFINITY)), "-Infinity");
        assert_eq!(text(ScalarType::Float4, Value::Float4(f32::NAN)), "NaN");
        assert_eq!(text(ScalarType::Bytea, Value::Bytea(vec![0xde, 0xad, 0x01])), "\\xdead01");
        assert_eq!(text(ScalarType::Cid, Value::Cid(42)), "42");
    }

    #[test]
    fn test_set_widens_integers() {
        assert_eq!(text(ScalarType::Int8, Value::Int2(7)), "7");
        assert_eq!(text(ScalarType::Float8, Value::Float4(0.5)), "0.5");
    }

    #[test]
    fn test_set_rejects_mismatch() {
        let err = ScalarType::Int2.set(&Value::Int8(1)).unwrap_err();
        assert!(matches!(err, CodecError::Assign { from: "int8", to: "int2" }));
        assert!(ScalarType::Cid.set(&Value::Oid(1)).is_err());
    }

    #[test]
    fn test_set_null_encodes_null() {
        let registry = TypeRegistry::new();
        let bound = ScalarType::Int4.set(&Value::Null).unwrap();
        let mut buf = BytesMut::new();
        let is_null = bound.as_binary().unwrap().encode_binary(&registry, &mut buf).unwrap();
        assert_eq!(is_null, IsNull::Yes);
    }

    #[test]
    fn test_decode_text() {
        let registry = TypeRegistry::new();
        assert_eq!(ScalarType::Bool.decode_text(&registry, "true").unwrap(), Value::Bool(true));
        assert_eq!(ScalarType::Bool.decode_text(&registry, "f").unwrap(), Value::Bool(false));
        assert_eq!(ScalarType::Int8.decode_text(&registry, " 300 ").unwrap(), Value::Int8(300));
        assert_eq!(
            ScalarType::Float8.decode_text(&registry, "-Infinity").unwrap(),
            Value::Float8(f64::NEG_INFINITY)
        );
        assert!(ScalarType::Int2.decode_text(&registry, "70000").is_err());
        assert!(ScalarType::Bool.decode_text(&registry, "maybe").is_err());
    }

    #[test]
    fn test_decode_bytea_formats() {
        assert_eq!(parse_bytea("\\xDEad").unwrap(), vec![0xde, 0xad]);
        assert_eq!(parse_bytea("a\\\\b\\001").unwrap(), vec![b'a', b'\\', b'b', 1]);
        assert!(parse_bytea("\\x0").is_err());
        assert!(parse_bytea("\\9").is_err());
    }

    #[test]
    fn test_binary_forms() {
        let registry = TypeRegistry::new();
        let bound = ScalarType::Int8.set(&Value::Int8(300)).unwrap();
        let mut buf = BytesMut::new();
        bound.as_binary().unwrap().encode_binary(&registry, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &300i64.to_be_bytes());
        assert_eq!(ScalarType::Int8.decode_binary(&registry, &buf).unwrap(), Value::Int8(300));
        assert!(ScalarType::Int8.decode_binary(&registry, &buf[..4]).is_err());
    }

    #[test]
    fn test_cid_binary_is_uint32() {
        let registry = TypeRegistry::new();
        assert_eq!(
            ScalarType::Cid.decode_binary(&registry, &[0, 0, 0, 42]).unwrap(),
            Value::Cid(42)
        );
    }
}
