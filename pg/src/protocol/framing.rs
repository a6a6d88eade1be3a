//! Message envelope: tags, framing classes and the generic encode/decode
//! driver.
//!
//! Wire format (length-prefixed):
//! - tag (1 byte)
//! - length (4 bytes, big-endian, counts itself and the payload)
//! - payload
//!
//! Wire format (fixed-size):
//! - tag (1 byte)
//! - payload (size fixed by the tag, no length field)

use std::fmt;

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{CodecError, CodecResult};

/// Maximum accepted length field (16 MB).
/// PostgreSQL allows up to 1 GB; 16 MB covers ordinary traffic.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length field of a length-prefixed message.
const LENGTH_FIELD: usize = 4;

/// Which side of the connection sends a message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Frontend,
    Backend,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Frontend => write!(f, "frontend"),
            Direction::Backend => write!(f, "backend"),
        }
    }
}

/// How a message's payload boundary is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framing {
    /// A 4-byte length follows the tag.
    LengthPrefixed,
    /// The payload has this many bytes; there is no length field.
    FixedSize(usize),
}

/// Tag byte, direction and framing of one message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageTag {
    pub byte: u8,
    pub direction: Direction,
    pub framing: Framing,
}

impl MessageTag {
    pub const fn frontend(byte: u8, framing: Framing) -> Self {
        Self {
            byte,
            direction: Direction::Frontend,
            framing,
        }
    }

    pub const fn backend(byte: u8, framing: Framing) -> Self {
        Self {
            byte,
            direction: Direction::Backend,
            framing,
        }
    }
}

/// A protocol message kind.
///
/// Implementors only handle their payload; [`encode`](Message::encode) and
/// [`decode`](Message::decode) add and check the envelope according to
/// [`Message::TAG`].
pub trait Message: Sized + Serialize {
    const TAG: MessageTag;
    /// Kind name used in errors, logs and the debug dump.
    const NAME: &'static str;

    /// Append the payload (no tag, no length).
    fn encode_payload(&self, buf: &mut BytesMut);

    /// Decode from exactly the payload bytes. Fixed-size kinds receive
    /// exactly their declared size.
    fn decode_payload(src: &[u8]) -> CodecResult<Self>;

    /// Append the full message: tag, length if any, payload.
    ///
    /// # Panics
    ///
    /// Panics if a length-prefixed payload exceeds `i32::MAX - 4` bytes.
    fn encode(&self, buf: &mut BytesMut) {
        encode_message(self, buf)
    }

    /// Decode a payload already separated from its tag and length.
    fn decode(src: &[u8]) -> CodecResult<Self> {
        decode_message(src)
    }
}

/// Append `msg` to `buf` using its framing class.
///
/// # Panics
///
/// Panics if a length-prefixed payload exceeds `i32::MAX - 4` bytes.
pub fn encode_message<M: Message>(msg: &M, buf: &mut BytesMut) {
    let start = buf.len();
    buf.put_u8(M::TAG.byte);
    match M::TAG.framing {
        Framing::LengthPrefixed => {
            let len_at = buf.len();
            buf.put_i32(0);
            msg.encode_payload(buf);
            let len = length_field_value(buf.len() - len_at);
            buf[len_at..len_at + LENGTH_FIELD].copy_from_slice(&len.to_be_bytes());
        }
        Framing::FixedSize(size) => {
            msg.encode_payload(buf);
            debug_assert_eq!(buf.len() - start - 1, size, "{} payload size", M::NAME);
        }
    }
    trace!(message = M::NAME, bytes = buf.len() - start, "encoded message");
}

/// Length field for `len` bytes following the tag. The field counts itself
/// but not the tag, and cannot exceed `i32::MAX`.
fn length_field_value(len: usize) -> i32 {
    match i32::try_from(len) {
        Ok(len) => len,
        Err(_) => panic!("message length {len} does not fit the i32 length field"),
    }
}

/// Decode a payload of kind `M`. A fixed-size payload shorter than its size
/// is malformed; extra bytes beyond it are ignored.
pub fn decode_message<M: Message>(src: &[u8]) -> CodecResult<M> {
    let payload = match M::TAG.framing {
        Framing::LengthPrefixed => src,
        Framing::FixedSize(size) => src.get(..size).ok_or_else(|| {
            let detail = format!("too short: need {size} bytes, have {}", src.len());
            CodecError::malformed(M::NAME, detail)
        })?,
    };
    let msg = M::decode_payload(payload)?;
    trace!(message = M::NAME, bytes = payload.len(), "decoded message");
    Ok(msg)
}

/// Frame parser limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Largest length field accepted by a frame parser.
    pub max_message_size: usize,
}

impl FrameConfig {
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One complete frame found at the start of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame<'a> {
    pub tag: u8,
    pub payload: &'a [u8],
    /// Bytes the frame occupies, tag included.
    pub len: usize,
}

/// Locate the first frame in `src`. `Ok(None)` means more bytes are needed.
pub(crate) fn split_frame<'a>(
    direction: Direction,
    src: &'a [u8],
    config: &FrameConfig,
    framing_of: fn(u8) -> Option<Framing>,
) -> CodecResult<Option<Frame<'a>>> {
    let Some(&tag) = src.first() else {
        return Ok(None);
    };
    let Some(framing) = framing_of(tag) else {
        debug!(%direction, tag, "rejected frame with unknown tag");
        return Err(CodecError::UnknownMessageType { direction, tag });
    };

    let (payload_start, len) = match framing {
        Framing::FixedSize(size) => (1, 1 + size),
        Framing::LengthPrefixed => {
            let Some(header) = src.get(1..1 + LENGTH_FIELD) else {
                return Ok(None);
            };
            let declared = i32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            if declared < LENGTH_FIELD as i32 {
                debug!(%direction, tag, declared, "rejected frame with short length");
                return Err(CodecError::malformed("frame", format!("length {declared} is below 4")));
            }
            let declared = declared as usize;
            if declared > config.max_message_size {
                let max = config.max_message_size;
                debug!(%direction, tag, declared, max, "rejected oversized frame");
                return Err(CodecError::malformed(
                    "frame",
                    format!("length {declared} exceeds maximum {}", config.max_message_size),
                ));
            }
            (1 + LENGTH_FIELD, 1 + declared)
        }
    };

    Ok(src.get(payload_start..len).map(|payload| Frame { tag, payload, len }))
}

/// Write a null-terminated string.
pub(crate) fn put_cstring(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

/// Read a payload that is exactly one null-terminated string. The
/// terminator must be the last byte.
pub(crate) fn read_cstring(kind: &'static str, src: &[u8]) -> CodecResult<String> {
    match src.iter().position(|&b| b == 0) {
        Some(nul) if nul + 1 == src.len() => String::from_utf8(src[..nul].to_vec())
            .map_err(|e| CodecError::malformed(kind, format!("invalid UTF-8: {e}"))),
        Some(nul) => Err(CodecError::malformed(
            kind,
            format!("terminator at byte {nul} of {}", src.len()),
        )),
        None => Err(CodecError::malformed(kind, "missing string terminator")),
    }
}

/// Reject a non-empty payload for kinds that carry none.
pub(crate) fn expect_empty(kind: &'static str, src: &[u8]) -> CodecResult<()> {
    if src.is_empty() {
        Ok(())
    } else {
        Err(CodecError::malformed(kind, format!("unexpected {} payload bytes", src.len())))
    }
}

/// Render a message's JSON debug dump for `Display`.
pub(crate) fn fmt_dump<T: Serialize>(value: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let dump = serde_json::to_string(value).map_err(|_| fmt::Error)?;
    f.write_str(&dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn framing_of(tag: u8) -> Option<Framing> {
        match tag {
            b'L' => Some(Framing::LengthPrefixed),
            b'F' => Some(Framing::FixedSize(2)),
            _ => None,
        }
    }

    #[test]
    fn test_length_field_value_limit() {
        assert_eq!(length_field_value(4), 4);
        assert_eq!(length_field_value(i32::MAX as usize), i32::MAX);
    }

    #[test]
    #[should_panic(expected = "does not fit the i32 length field")]
    fn test_length_field_value_overflow() {
        length_field_value(i32::MAX as usize + 1);
    }

    #[test]
    fn test_read_cstring() {
        assert_eq!(read_cstring("Test", b"hello\0").unwrap(), "hello");
        assert_eq!(read_cstring("Test", b"\0").unwrap(), "");
        assert!(read_cstring("Test", b"hello").is_err());
        assert!(read_cstring("Test", b"").is_err());
        assert!(read_cstring("Test", b"he\0llo\0").is_err());
        assert!(read_cstring("Test", b"\xff\0").is_err());
    }

    #[test]
    fn test_put_cstring() {
        let mut buf = BytesMut::new();
        put_cstring(&mut buf, "test");
        assert_eq!(buf, b"test\0"[..]);
    }

    #[test]
    fn test_split_length_prefixed() {
        let config = FrameConfig::default();
        let src = [b'L', 0, 0, 0, 6, b'h', b'i', b'L'];
        let frame = split_frame(Direction::Frontend, &src, &config, framing_of)
            .unwrap()
            .unwrap();
        assert_eq!(frame.tag, b'L');
        assert_eq!(frame.payload, b"hi");
        assert_eq!(frame.len, 7);

        // incomplete header / payload
        for partial in [&src[..3], &src[..6], &src[..0]] {
            let split = split_frame(Direction::Frontend, partial, &config, framing_of).unwrap();
            assert!(split.is_none());
        }
    }

    #[test]
    fn test_split_fixed_size() {
        let config = FrameConfig::default();
        let frame = split_frame(Direction::Backend, &[b'F', 1, 2, 3], &config, framing_of)
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload, &[1, 2]);
        assert_eq!(frame.len, 3);
        let split = split_frame(Direction::Backend, &[b'F', 1], &config, framing_of).unwrap();
        assert!(split.is_none());
    }

    #[test]
    fn test_split_rejects_bad_frames() {
        let config = FrameConfig::default().with_max_message_size(8);
        let err = split_frame(Direction::Backend, &[b'?'], &config, framing_of).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnknownMessageType {
                direction: Direction::Backend,
                tag: b'?'
            }
        ));
        assert_eq!(err.to_string(), "unknown backend message type: 0x3f");

        let short = split_frame(Direction::Frontend, &[b'L', 0, 0, 0, 3], &config, framing_of);
        assert!(matches!(short, Err(CodecError::MalformedMessage { kind: "frame", .. })));

        let big = split_frame(Direction::Frontend, &[b'L', 0, 0, 0, 9], &config, framing_of);
        assert!(matches!(big, Err(CodecError::MalformedMessage { kind: "frame", .. })));
    }

    #[test]
    fn test_default_config() {
        assert_eq!(FrameConfig::default().max_message_size, 16 * 1024 * 1024);
    }
}
