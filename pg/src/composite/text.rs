//! Text composite format.
//!
//! Wire format: `(` field `,` field ... `)`
//! - a NULL field is empty
//! - a field is double-quoted when it is empty, has leading or trailing
//!   whitespace, or contains `(`, `)`, `,`, `"` or `\`
//! - inside quotes, `"` and `\` are backslash-escaped; the reader also
//!   accepts `""` for a literal quote

use std::borrow::Cow;

use bytes::{BufMut, BytesMut};
use tracing::{debug, trace};

use crate::error::{CodecError, CodecResult};
use crate::types::{FieldDest, IsNull, TextEncode, TypeRegistry, Value, oid};

/// Quote `src` for use as a text composite field, borrowing when no quoting
/// is needed.
pub fn quote_composite_field_if_needed(src: &str) -> Cow<'_, str> {
    if !needs_quoting(src.as_bytes()) {
        return Cow::Borrowed(src);
    }
    let mut quoted = String::with_capacity(src.len() + 2);
    quoted.push('"');
    for c in src.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Cow::Owned(quoted)
}

fn needs_quoting(src: &[u8]) -> bool {
    match (src.first(), src.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_whitespace()
                || last.is_ascii_whitespace()
                || src.iter().any(|b| matches!(b, b'(' | b')' | b',' | b'"' | b'\\'))
        }
        _ => true,
    }
}

/// Byte-level variant of [`quote_composite_field_if_needed`]; the special
/// characters are all ASCII so the encoder's output needs no UTF-8 check.
fn put_field(buf: &mut BytesMut, field: &[u8]) {
    if !needs_quoting(field) {
        buf.extend_from_slice(field);
        return;
    }
    buf.put_u8(b'"');
    for &b in field {
        if matches!(b, b'"' | b'\\') {
            buf.put_u8(b'\\');
        }
        buf.put_u8(b);
    }
    buf.put_u8(b'"');
}

/// Appends a text composite to a caller buffer.
///
/// Same error model as the binary builder: the first error is kept, later
/// appends are skipped and [`finish`](Self::finish) truncates the buffer.
#[derive(Debug)]
pub struct CompositeTextBuilder<'a> {
    registry: &'a TypeRegistry,
    buf: &'a mut BytesMut,
    start: usize,
    scratch: BytesMut,
    field_count: usize,
    err: Option<CodecError>,
}

impl<'a> CompositeTextBuilder<'a> {
    pub fn new(registry: &'a TypeRegistry, buf: &'a mut BytesMut) -> Self {
        let start = buf.len();
        buf.put_u8(b'(');
        Self {
            registry,
            buf,
            start,
            scratch: BytesMut::with_capacity(32),
            field_count: 0,
            err: None,
        }
    }

    /// Append a field through capability dispatch. An untyped NULL is
    /// written as an empty field.
    pub fn append_value(&mut self, value: &Value) {
        self.append_with(|registry, scratch| registry.encode_text(value, scratch));
    }

    /// Append a field with an explicit encoder.
    pub fn append_encoder(&mut self, encoder: &dyn TextEncode) {
        self.append_with(|registry, scratch| encoder.encode_text(registry, scratch));
    }

    /// Append an already-rendered field; `None` writes NULL.
    pub fn append_raw(&mut self, value: Option<&str>) {
        self.append_with(|_, scratch| match value {
            Some(text) => {
                scratch.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        })
    }

    fn append_with(
        &mut self,
        encode: impl FnOnce(&TypeRegistry, &mut BytesMut) -> CodecResult<IsNull>,
    ) {
        if self.err.is_some() {
            return;
        }
        if self.field_count > 0 {
            self.buf.put_u8(b',');
        }
        self.field_count += 1;

        self.scratch.clear();
        match encode(self.registry, &mut self.scratch) {
            Ok(IsNull::No) => put_field(self.buf, &self.scratch),
            Ok(IsNull::Yes) => {}
            Err(e) => self.err = Some(e),
        }
    }

    /// Close the composite, or report the first error.
    pub fn finish(self) -> CodecResult<()> {
        if let Some(err) = self.err {
            self.buf.truncate(self.start);
            return Err(err);
        }
        self.buf.put_u8(b')');
        let bytes = self.buf.len() - self.start;
        trace!(fields = self.field_count, bytes, "built text composite");
        Ok(())
    }
}

/// Reads a text composite field by field.
///
/// Text fields carry no OID, so each destination decides how its field is
/// parsed (see [`FieldDest::expected_oid`]). Error handling follows the
/// binary scanner: decode failures are kept and scanning continues
/// structurally, syntax errors stop the scan.
#[derive(Debug)]
pub struct CompositeTextScanner<'a, 's> {
    registry: &'a TypeRegistry,
    src: &'s str,
    pos: usize,
    fields_read: usize,
    closed: bool,
    err: Option<CodecError>,
    halted: bool,
}

impl<'a, 's> CompositeTextScanner<'a, 's> {
    /// Start a scan. The input must be UTF-8 and open with `(`.
    pub fn new(registry: &'a TypeRegistry, src: &'s [u8]) -> Self {
        let mut scanner = Self {
            registry,
            src: "",
            pos: 0,
            fields_read: 0,
            closed: false,
            err: None,
            halted: false,
        };
        let src = match std::str::from_utf8(src) {
            Ok(src) => src,
            Err(e) => {
                scanner.halt(malformed(format!("invalid UTF-8: {e}")));
                return scanner;
            }
        };
        scanner.src = src;

        let trimmed = src.trim_start();
        scanner.pos = src.len() - trimmed.len();
        if trimmed.starts_with('(') {
            scanner.pos += 1;
        } else {
            scanner.halt(malformed("missing left parenthesis"));
        }
        scanner
    }

    /// Number of fields read so far.
    pub fn field_count(&self) -> usize {
        self.fields_read
    }

    /// Bytes consumed so far, including delimiters.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    /// The captured error, if any.
    pub fn err(&self) -> Option<&CodecError> {
        self.err.as_ref()
    }

    /// Read the next raw field. The inner `None` is SQL NULL; the outer
    /// `None` means the closing parenthesis has been consumed.
    pub fn next_field(&mut self) -> CodecResult<Option<Option<Cow<'s, str>>>> {
        if self.closed || self.halted {
            return Ok(None);
        }
        let field = self.read_field()?;

        // read_field stops on a delimiter
        if self.src.as_bytes()[self.pos] == b')' {
            self.closed = true;
            if !self.src[self.pos + 1..].trim().is_empty() {
                return Err(malformed("junk after right parenthesis"));
            }
        }
        self.pos += 1;
        self.fields_read += 1;
        Ok(Some(field))
    }

    /// Decode the next field into `dest`. A destination with no preference
    /// receives the field as text.
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
                let oid = dest.expected_oid(self.registry).unwrap_or(oid::TEXT);
                if let Err(e) = self.registry.decode_text(oid, field.as_deref(), dest) {
                    debug!(index, oid, error = %e, "text composite field failed to decode");
                    self.err = Some(CodecError::FieldDecode {
                        index,
                        source: Box::new(e),
                    });
                }
            }
            Ok(None) => self.halt(malformed("read past end of composite")),
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
        debug!(error = %err, consumed = self.pos, "text composite scan stopped");
        if self.err.is_none() {
            self.err = Some(err);
        }
        self.halted = true;
    }

    /// Parse one field up to (not including) its `,` or `)` delimiter.
    fn read_field(&mut self) -> CodecResult<Option<Cow<'s, str>>> {
        let src: &'s str = self.src;
        let rest = &src[self.pos..];

        // Plain unquoted field: borrow it.
        if let Some(end) = rest.find([',', ')', '"', '\\']) {
            if matches!(rest.as_bytes()[end], b',' | b')') {
                self.pos += end;
                let raw = &rest[..end];
                return Ok((!raw.is_empty()).then_some(Cow::Borrowed(raw)));
            }
        }

        let mut out = String::new();
        let mut quoted = false;
        let mut in_quotes = false;
        let mut chars = rest.char_indices().peekable();
        loop {
            let Some((i, c)) = chars.next() else {
                return Err(malformed("unexpected end of input"));
            };
            match c {
                '"' if in_quotes => {
                    if chars.next_if(|&(_, next)| next == '"').is_some() {
                        out.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '"' => {
                    in_quotes = true;
                    quoted = true;
                }
                '\\' => match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => return Err(malformed("unexpected end of input")),
                },
                ',' | ')' if !in_quotes => {
                    self.pos += i;
                    break;
                }
                c => out.push(c),
            }
        }

        // An empty field is NULL only if it was never quoted.
        Ok((quoted || !out.is_empty()).then_some(Cow::Owned(out)))
    }
}

fn malformed(detail: impl Into<String>) -> CodecError {
    CodecError::MalformedComposite(detail.into())
}
