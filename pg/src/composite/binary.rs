//! Binary composite format.
//!
//! Wire format:
//! - field count (4 bytes, big-endian)
//! - per field: OID (4 bytes), length (4 bytes, signed, -1 = NULL),
//!   then `length` payload bytes (absent for NULL)

use bytes::{BufMut, BytesMut};
use tracing::{debug, trace};

use crate::error::{CodecError, CodecResult};
use crate::types::{BinaryEncode, FieldDest, IsNull, Oid, TypeRegistry, Value};

/// Length sentinel for a NULL field.
const NULL_LENGTH: i32 = -1;

/// Appends a binary composite to a caller buffer.
///
/// The first error is retained and reported by [`finish`](Self::finish);
/// later appends become no-ops. On error the buffer is truncated back to
/// where the composite started.
#[derive(Debug)]
pub struct CompositeBinaryBuilder<'a> {
    registry: &'a TypeRegistry,
    buf: &'a mut BytesMut,
    start: usize,
    field_count: u32,
    err: Option<CodecError>,
}

impl<'a> CompositeBinaryBuilder<'a> {
    pub fn new(registry: &'a TypeRegistry, buf: &'a mut BytesMut) -> Self {
        let start = buf.len();
        buf.put_u32(0); // field count, patched in finish
        Self {
            registry,
            buf,
            start,
            field_count: 0,
            err: None,
        }
    }

    /// Append a field through capability dispatch. The value must resolve to
    /// an OID; an untyped NULL is an error.
    pub fn append_value(&mut self, value: &Value) {
        let registry = self.registry;
        self.append_with(|buf| registry.encode_binary(value, buf));
    }

    /// Append a field with a known OID and encoder.
    pub fn append_encoder(&mut self, oid: Oid, encoder: &dyn BinaryEncode) {
        let registry = self.registry;
        self.append_with(|buf| Ok((oid, encoder.encode_binary(registry, buf)?)));
    }

    /// Append pre-encoded bytes; `None` writes a NULL field.
    pub fn append_raw(&mut self, oid: Oid, value: Option<&[u8]>) {
        self.append_with(|buf| match value {
            Some(bytes) => {
                buf.extend_from_slice(bytes);
                Ok((oid, IsNull::No))
            }
            None => Ok((oid, IsNull::Yes)),
        })
    }

    /// Write one `(oid, length, payload)` record. OID and length are
    /// placeholders until the payload is known.
    fn append_with(&mut self, encode: impl FnOnce(&mut BytesMut) -> CodecResult<(Oid, IsNull)>) {
        if self.err.is_some() {
            return;
        }

        let header = self.buf.len();
        self.buf.put_u32(0);
        self.buf.put_i32(0);
        let payload = self.buf.len();

        let (oid, is_null) = match encode(&mut *self.buf) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.err = Some(e);
                return;
            }
        };

        let len = match is_null {
            IsNull::Yes => {
                self.buf.truncate(payload);
                NULL_LENGTH
            }
            IsNull::No => match i32::try_from(self.buf.len() - payload) {
                Ok(len) => len,
                Err(_) => {
                    self.err = Some(CodecError::MalformedComposite(format!(
                        "field {} exceeds i32::MAX bytes",
                        self.field_count
                    )));
                    return;
                }
            },
        };

        self.buf[header..header + 4].copy_from_slice(&oid.to_be_bytes());
        self.buf[header + 4..payload].copy_from_slice(&len.to_be_bytes());
        self.field_count += 1;
    }

    /// Patch the field count and return, or report the first error.
    pub fn finish(self) -> CodecResult<()> {
        if let Some(err) = self.err {
            self.buf.truncate(self.start);
            return Err(err);
        }
        self.buf[self.start..self.start + 4].copy_from_slice(&self.field_count.to_be_bytes());
        let bytes = self.buf.len() - self.start;
        trace!(fields = self.field_count, bytes, "built binary composite");
        Ok(())
    }
}

/// One raw field record read from a binary composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryField<'s> {
    pub oid: Oid,
    /// Payload bytes; `None` is SQL NULL.
    pub bytes: Option<&'s [u8]>,
}

/// Reads a binary composite field by field into destination slots.
///
/// Decode failures are captured rather than returned: the first one is kept
/// (wrapped in [`CodecError::FieldDecode`]) and later fields are still
/// consumed structurally but not decoded. A structural failure (truncation,
/// reading past the last field) stops the scan.
#[derive(Debug)]
pub struct CompositeBinaryScanner<'a, 's> {
    registry: &'a TypeRegistry,
    src: &'s [u8],
    pos: usize,
    field_count: usize,
    fields_read: usize,
    err: Option<CodecError>,
    halted: bool,
}

impl<'a, 's> CompositeBinaryScanner<'a, 's> {
    /// Start a scan. The field count is read immediately.
    pub fn new(registry: &'a TypeRegistry, src: &'s [u8]) -> Self {
        let mut scanner = Self {
            registry,
            src,
            pos: 0,
            field_count: 0,
            fields_read: 0,
            err: None,
            halted: false,
        };
        match scanner.read_i32() {
            Ok(count) if count >= 0 => scanner.field_count = count as usize,
            Ok(count) => {
                let detail = format!("negative field count {count}");
                scanner.halt(CodecError::MalformedComposite(detail))
            }
            Err(e) => scanner.halt(e),
        }
        scanner
    }

    /// Field count declared by the payload.
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Bytes consumed so far, including the field count.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    /// The captured error, if any.
    pub fn err(&self) -> Option<&CodecError> {
        self.err.as_ref()
    }

    /// Read the next raw record. `Ok(None)` once every declared field has
    /// been read.
    pub fn next_field(&mut self) -> CodecResult<Option<BinaryField<'s>>> {
        if self.fields_read == self.field_count {
            return Ok(None);
        }
        let oid = self.read_i32()? as Oid;
        let len = self.read_i32()?;
        let bytes = match len {
            NULL_LENGTH => None,
            n if n < 0 => {
                return Err(CodecError::MalformedComposite(format!(
                    "field {}: invalid length {n}",
                    self.fields_read
                )));
            }
            n => Some(self.read_bytes(n as usize)?),
        };
        self.fields_read += 1;
        Ok(Some(BinaryField { oid, bytes }))
    }

    /// Decode the next field into `dest` using the decoder registered for
    /// its wire OID.
    pub fn scan_field(&mut self, dest: &mut dyn FieldDest) {
        if self.halted {
            return;
        }
        let index = self.fields_read;
        match self.next_field() {
            Ok(Some(field)) => {
                if self.err.is_some() {
                    return;
                }
                if let Err(e) = self.registry.decode_binary(field.oid, field.bytes, dest) {
                    let oid = field.oid;
                    debug!(index, oid, error = %e, "binary composite field failed to decode");
                    self.err = Some(CodecError::FieldDecode {
                        index,
                        source: Box::new(e),
                    });
                }
            }
            Ok(None) => {
                self.halt(CodecError::MalformedComposite("read past end of composite".into()))
            }
            Err(e) => self.halt(e),
        }
    }

    /// Report the first captured error, if any.
    pub fn finish(self) -> CodecResult<()> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn halt(&mut self, err: CodecError) {
        debug!(error = %err, consumed = self.pos, "binary composite scan stopped");
        if self.err.is_none() {
            self.err = Some(err);
        }
        self.halted = true;
    }

    fn read_i32(&mut self) -> CodecResult<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_bytes(&mut self, len: usize) -> CodecResult<&'s [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.src.len())
            .ok_or_else(|| {
                CodecError::MalformedComposite(format!(
                    "unexpected end of data: need {len} bytes at offset {}, have {}",
                    self.pos,
                    self.src.len() - self.pos
                ))
            })?;
        let bytes = &self.src[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }
}
