//! Type registry and capability dispatch.
//!
//! The registry maps a runtime [`Value`] to a [`TypeDescriptor`] (OID plus a
//! prototype [`TypeCodec`]) and maps wire OIDs back to decoders. It is
//! read-only during encode/decode; registration happens up front through
//! `&mut self`, so sharing a populated registry across threads needs no
//! locking.
//!
//! # Dispatch order
//!
//! 1. The value's own capability ([`Value::direct_text`] /
//!    [`Value::direct_binary`]).
//! 2. `resolve` + `set` on the registry prototype, then the bound value's
//!    capability.
//! 3. Otherwise [`CodecError::UnknownType`] (resolve failed) or
//!    [`CodecError::UnsupportedEncoding`] (resolved, format missing).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;

use super::dest::FieldDest;
use super::encode::{Encodable, IsNull};
use super::oids::{Oid, oid};
use super::scalar::ScalarType;
use super::value::{Format, Value};
use crate::composite::RecordCodec;
use crate::error::{CodecError, CodecResult};

/// Prototype codec for one type.
pub trait TypeCodec: fmt::Debug + Send + Sync {
    /// Bind a runtime value to this type, producing something that can
    /// encode it.
    fn set(&self, value: &Value) -> CodecResult<Box<dyn Encodable>>;

    /// Decode the text representation of a non-null value.
    fn decode_text(&self, registry: &TypeRegistry, src: &str) -> CodecResult<Value>;

    /// Decode the binary representation of a non-null value.
    fn decode_binary(&self, registry: &TypeRegistry, src: &[u8]) -> CodecResult<Value>;
}

/// A registered type: OID, name and prototype codec.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    oid: Oid,
    name: String,
    codec: Arc<dyn TypeCodec>,
}

impl TypeDescriptor {
    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> &dyn TypeCodec {
        self.codec.as_ref()
    }

    /// Bind `value` to this descriptor's prototype codec.
    pub fn set(&self, value: &Value) -> CodecResult<Box<dyn Encodable>> {
        self.codec.set(value)
    }
}

/// OID and name lookup for codecs.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    by_oid: HashMap<Oid, TypeDescriptor>,
    by_name: HashMap<String, Oid>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in codec registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for ty in [
            ScalarType::Bool,
            ScalarType::Int2,
            ScalarType::Int4,
            ScalarType::Int8,
            ScalarType::Float4,
            ScalarType::Float8,
            ScalarType::Text,
            ScalarType::Bytea,
            ScalarType::Oid,
            ScalarType::Cid,
        ] {
            registry.register(ty.oid(), ty.name(), Arc::new(ty));
        }
        // Text-family aliases decode as text.
        registry.register(oid::VARCHAR, "varchar", Arc::new(ScalarType::Text));
        registry.register(oid::BPCHAR, "bpchar", Arc::new(ScalarType::Text));
        registry.register(oid::NAME, "name", Arc::new(ScalarType::Text));
        registry.register(oid::RECORD, "record", Arc::new(RecordCodec));
        registry
    }

    /// Register a codec under `oid` and `name`. A later registration for the
    /// same OID replaces the earlier one; the first OID registered under a
    /// name stays the one values resolve to.
    pub fn register(&mut self, oid: Oid, name: impl Into<String>, codec: Arc<dyn TypeCodec>) {
        let name = name.into();
        self.by_name.entry(name.clone()).or_insert(oid);
        self.by_oid.insert(oid, TypeDescriptor { oid, name, codec });
    }

    /// Reverse lookup by OID.
    pub fn lookup(&self, oid: Oid) -> Option<&TypeDescriptor> {
        self.by_oid.get(&oid)
    }

    /// Lookup by registered type name.
    pub fn lookup_name(&self, name: &str) -> Option<&TypeDescriptor> {
        self.by_name.get(name).and_then(|oid| self.by_oid.get(oid))
    }

    /// Resolve a runtime value to its descriptor. An untyped NULL never
    /// resolves.
    pub fn resolve(&self, value: &Value) -> Option<&TypeDescriptor> {
        value.type_name().and_then(|name| self.lookup_name(name))
    }

    /// Encode `value` in text format. An untyped NULL encodes as NULL.
    pub fn encode_text(&self, value: &Value, buf: &mut BytesMut) -> CodecResult<IsNull> {
        if value.is_null() {
            return Ok(IsNull::Yes);
        }
        if let Some(encoder) = value.direct_text() {
            return encoder.encode_text(self, buf);
        }

        let descriptor = self.resolve(value).ok_or_else(|| unknown_type(value))?;
        let bound = descriptor.set(value)?;
        match bound.as_text() {
            Some(encoder) => encoder.encode_text(self, buf),
            None => Err(unsupported(value, Format::Text)),
        }
    }

    /// Encode `value` in binary format, returning the OID it was encoded as.
    ///
    /// The binary composite format tags every field with an OID, so the value
    /// must resolve even when it encodes itself; an untyped NULL fails.
    pub fn encode_binary(&self, value: &Value, buf: &mut BytesMut) -> CodecResult<(Oid, IsNull)> {
        let descriptor = self.resolve(value).ok_or_else(|| unknown_type(value))?;
        let oid = descriptor.oid();

        if let Some(encoder) = value.direct_binary() {
            return Ok((oid, encoder.encode_binary(self, buf)?));
        }

        let bound = descriptor.set(value)?;
        match bound.as_binary() {
            Some(encoder) => Ok((oid, encoder.encode_binary(self, buf)?)),
            None => Err(unsupported(value, Format::Binary)),
        }
    }

    /// Decode a binary field of type `oid` into `dest`. `None` is SQL NULL.
    pub fn decode_binary(
        &self,
        oid: Oid,
        src: Option<&[u8]>,
        dest: &mut dyn FieldDest,
    ) -> CodecResult<()> {
        let Some(src) = src else {
            return dest.assign(None);
        };
        if let Some(result) = dest.decode_binary_direct(self, oid, src) {
            return result;
        }
        let descriptor = self.lookup(oid).ok_or(CodecError::UnknownOid(oid))?;
        let value = descriptor.codec().decode_binary(self, src)?;
        dest.assign(Some(value))
    }

    /// Decode a text field of type `oid` into `dest`. `None` is SQL NULL.
    pub fn decode_text(
        &self,
        oid: Oid,
        src: Option<&str>,
        dest: &mut dyn FieldDest,
    ) -> CodecResult<()> {
        let Some(src) = src else {
            return dest.assign(None);
        };
        if let Some(result) = dest.decode_text_direct(self, src) {
            return result;
        }
        let descriptor = self.lookup(oid).ok_or(CodecError::UnknownOid(oid))?;
        let value = descriptor.codec().decode_text(self, src)?;
        dest.assign(Some(value))
    }
}

fn unknown_type(value: &Value) -> CodecError {
    CodecError::UnknownType {
        value: format!("{value:?}"),
    }
}

fn unsupported(value: &Value, format: Format) -> CodecError {
    CodecError::UnsupportedEncoding {
        value: format!("{value:?}"),
        format,
    }
}
