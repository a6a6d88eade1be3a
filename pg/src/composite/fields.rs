//! Schema-less composite values.
//!
//! [`CompositeFields`] is an ordered list of values encoded or decoded
//! positionally, with no knowledge of the server-side composite type. It
//! encodes itself, so a [`Value::Record`] nests without a registered type.

use std::cell::Cell;

use bytes::BytesMut;
use serde::Serialize;

use super::binary::{CompositeBinaryBuilder, CompositeBinaryScanner};
use super::text::{CompositeTextBuilder, CompositeTextScanner};
use crate::error::{CodecError, CodecResult};
use crate::types::{
    BinaryEncode, Encodable, FieldDest, IsNull, TextEncode, TypeCodec, TypeRegistry, Value,
};

/// Ordered composite field values.
///
/// For decoding, each element is a destination slot: its current value
/// decides how a text field is parsed, and a `Value::Null` slot takes
/// whatever the payload holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CompositeFields(Vec<Value>);

impl CompositeFields {
    pub fn new(fields: Vec<Value>) -> Self {
        Self(fields)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }

    /// Append the text form, `(f1,f2,...)`. NULL fields are left empty.
    pub fn encode_text(&self, registry: &TypeRegistry, buf: &mut BytesMut) -> CodecResult<()> {
        let mut builder = CompositeTextBuilder::new(registry, buf);
        for field in &self.0 {
            builder.append_value(field);
        }
        builder.finish()
    }

    /// Append the binary form. Every field must resolve to an OID, so an
    /// untyped NULL fails with [`CodecError::UnknownType`].
    pub fn encode_binary(&self, registry: &TypeRegistry, buf: &mut BytesMut) -> CodecResult<()> {
        let mut builder = CompositeBinaryBuilder::new(registry, buf);
        for field in &self.0 {
            builder.append_value(field);
        }
        builder.finish()
    }

    /// Decode a text composite into the existing slots, in order.
    pub fn decode_text(&mut self, registry: &TypeRegistry, src: Option<&[u8]>) -> CodecResult<()> {
        let src = self.check_decode(src)?;
        let mut scanner = CompositeTextScanner::new(registry, src);
        for field in &mut self.0 {
            scanner.scan_field(field);
        }
        scanner.finish()
    }

    /// Decode a binary composite into the existing slots, in order.
    pub fn decode_binary(
        &mut self,
        registry: &TypeRegistry,
        src: Option<&[u8]>,
    ) -> CodecResult<()> {
        let src = self.check_decode(src)?;
        let mut scanner = CompositeBinaryScanner::new(registry, src);
        for field in &mut self.0 {
            scanner.scan_field(field);
        }
        scanner.finish()
    }

    /// Text decode into an optional composite. A NULL payload clears the
    /// slot; otherwise existing slots are filled, or the fields are decoded
    /// generically when there are none.
    pub fn decode_nullable_text(
        slot: &mut Option<CompositeFields>,
        registry: &TypeRegistry,
        src: Option<&[u8]>,
    ) -> CodecResult<()> {
        let Some(src) = src else {
            *slot = None;
            return Ok(());
        };
        match slot {
            Some(fields) if !fields.is_empty() => fields.decode_text(registry, Some(src)),
            _ => {
                *slot = Some(RecordCodec::scan_text(registry, src)?);
                Ok(())
            }
        }
    }

    /// Binary counterpart of [`decode_nullable_text`](Self::decode_nullable_text).
    pub fn decode_nullable_binary(
        slot: &mut Option<CompositeFields>,
        registry: &TypeRegistry,
        src: Option<&[u8]>,
    ) -> CodecResult<()> {
        let Some(src) = src else {
            *slot = None;
            return Ok(());
        };
        match slot {
            Some(fields) if !fields.is_empty() => fields.decode_binary(registry, Some(src)),
            _ => {
                *slot = Some(RecordCodec::scan_binary(registry, src)?);
                Ok(())
            }
        }
    }

    fn check_decode<'s>(&self, src: Option<&'s [u8]>) -> CodecResult<&'s [u8]> {
        if self.is_empty() {
            return Err(CodecError::EmptyFieldSet);
        }
        src.ok_or(CodecError::UnexpectedNull)
    }
}

impl From<Vec<Value>> for CompositeFields {
    fn from(fields: Vec<Value>) -> Self {
        Self(fields)
    }
}

impl FromIterator<Value> for CompositeFields {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CompositeFields {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Encodable for CompositeFields {
    fn as_text(&self) -> Option<&dyn TextEncode> {
        Some(self)
    }

    fn as_binary(&self) -> Option<&dyn BinaryEncode> {
        Some(self)
    }
}

impl TextEncode for CompositeFields {
    fn encode_text(&self, registry: &TypeRegistry, buf: &mut BytesMut) -> CodecResult<IsNull> {
        CompositeFields::encode_text(self, registry, buf)?;
        Ok(IsNull::No)
    }
}

impl BinaryEncode for CompositeFields {
    fn encode_binary(&self, registry: &TypeRegistry, buf: &mut BytesMut) -> CodecResult<IsNull> {
        CompositeFields::encode_binary(self, registry, buf)?;
        Ok(IsNull::No)
    }
}

/// Decode a text composite into caller-supplied slots.
pub fn decode_text_into(
    registry: &TypeRegistry,
    src: Option<&[u8]>,
    dests: &mut [&mut dyn FieldDest],
) -> CodecResult<()> {
    if dests.is_empty() {
        return Err(CodecError::EmptyFieldSet);
    }
    let src = src.ok_or(CodecError::UnexpectedNull)?;
    let mut scanner = CompositeTextScanner::new(registry, src);
    for dest in dests.iter_mut() {
        scanner.scan_field(&mut **dest);
    }
    scanner.finish()
}

/// Decode a binary composite into caller-supplied slots.
pub fn decode_binary_into(
    registry: &TypeRegistry,
    src: Option<&[u8]>,
    dests: &mut [&mut dyn FieldDest],
) -> CodecResult<()> {
    if dests.is_empty() {
        return Err(CodecError::EmptyFieldSet);
    }
    let src = src.ok_or(CodecError::UnexpectedNull)?;
    let mut scanner = CompositeBinaryScanner::new(registry, src);
    for dest in dests.iter_mut() {
        scanner.scan_field(&mut **dest);
    }
    scanner.finish()
}

/// Deepest nesting of `record` values a single decode may descend into.
pub const MAX_RECORD_DEPTH: usize = 100;

thread_local! {
    static RECORD_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// One level of `record` nesting on the current thread, released on drop.
///
/// Nested records reach the codec again through the registry, so the count
/// lives outside any one scanner.
struct NestingGuard;

impl NestingGuard {
    fn enter() -> CodecResult<Self> {
        RECORD_DEPTH.with(|depth| {
            let next = depth.get() + 1;
            if next > MAX_RECORD_DEPTH {
                return Err(CodecError::MalformedComposite("composite nesting too deep".into()));
            }
            depth.set(next);
            Ok(NestingGuard)
        })
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        RECORD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Codec for the anonymous `record` type.
///
/// Decoding has no slots to guide it: binary fields decode by their wire
/// OID, text fields come back as [`Value::Text`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCodec;

impl RecordCodec {
    fn scan_text(registry: &TypeRegistry, src: &[u8]) -> CodecResult<CompositeFields> {
        let _depth = NestingGuard::enter()?;
        let mut scanner = CompositeTextScanner::new(registry, src);
        let mut fields = Vec::new();
        while let Some(field) = scanner.next_field()? {
            fields.push(field.map_or(Value::Null, |text| Value::Text(text.into_owned())));
        }
        scanner.finish()?;
        Ok(CompositeFields(fields))
    }

    fn scan_binary(registry: &TypeRegistry, src: &[u8]) -> CodecResult<CompositeFields> {
        let _depth = NestingGuard::enter()?;
        let mut scanner = CompositeBinaryScanner::new(registry, src);
        let mut fields = Vec::new();
        for _ in 0..scanner.field_count() {
            if scanner.err().is_some() {
                break;
            }
            let mut value = Value::Null;
            scanner.scan_field(&mut value);
            fields.push(value);
        }
        scanner.finish()?;
        Ok(CompositeFields(fields))
    }
}

impl TypeCodec for RecordCodec {
    fn set(&self, value: &Value) -> CodecResult<Box<dyn Encodable>> {
        match value {
            Value::Record(fields) => Ok(Box::new(fields.clone())),
            other => Err(CodecError::Assign {
                from: other.kind_name(),
                to: "record",
            }),
        }
    }

    fn decode_text(&self, registry: &TypeRegistry, src: &str) -> CodecResult<Value> {
        Self::scan_text(registry, src.as_bytes()).map(Value::Record)
    }

    fn decode_binary(&self, registry: &TypeRegistry, src: &[u8]) -> CodecResult<Value> {
        Self::scan_binary(registry, src).map(Value::Record)
    }
}
