//! Codec errors.
//!
//! Every encode/decode path in this crate reports failures through
//! [`CodecError`]. Errors are fatal to the single call that produced them.

use thiserror::Error;

use crate::protocol::Direction;
use crate::types::{Format, Oid};

/// Errors produced by message envelopes, composite codecs and type dispatch.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A wire message violated its framing or payload structure.
    #[error("invalid message format: {kind}: {detail}")]
    MalformedMessage { kind: &'static str, detail: String },

    /// The frame parser saw a tag that names no known message kind.
    #[error("unknown {direction} message type: 0x{tag:02x}")]
    UnknownMessageType { direction: Direction, tag: u8 },

    /// Decoding into a composite with zero destination slots.
    #[error("cannot decode into empty composite fields")]
    EmptyFieldSet,

    /// A NULL composite payload where a nilable wrapper should have been used.
    #[error("cannot decode unexpected null into composite fields")]
    UnexpectedNull,

    /// The registry has no descriptor for a runtime value.
    #[error("unknown data type for {value}")]
    UnknownType { value: String },

    /// The registry has no codec for a wire OID.
    #[error("unknown OID {0}")]
    UnknownOid(Oid),

    /// The value resolved to a type that cannot produce the requested format.
    #[error("cannot encode {format} format for {value}")]
    UnsupportedEncoding { value: String, format: Format },

    /// The first field of a composite scan that failed to decode.
    #[error("composite field {index}: {source}")]
    FieldDecode {
        index: usize,
        #[source]
        source: Box<CodecError>,
    },

    /// Structural violation of a composite payload.
    #[error("malformed composite: {0}")]
    MalformedComposite(String),

    /// A scalar codec rejected its input.
    #[error("invalid {type_name} value: {detail}")]
    InvalidValue {
        type_name: &'static str,
        detail: String,
    },

    /// A decoded value does not fit its destination slot.
    #[error("cannot assign {from} to {to}")]
    Assign { from: &'static str, to: &'static str },
}

impl CodecError {
    pub(crate) fn malformed(kind: &'static str, detail: impl Into<String>) -> Self {
        CodecError::MalformedMessage {
            kind,
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid(type_name: &'static str, detail: impl ToString) -> Self {
        CodecError::InvalidValue {
            type_name,
            detail: detail.to_string(),
        }
    }

    /// Index of the failing field when this is a [`CodecError::FieldDecode`].
    pub fn field_index(&self) -> Option<usize> {
        match self {
            CodecError::FieldDecode { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = CodecError::malformed("WroteXlog", "too short");
        assert_eq!(err.to_string(), "invalid message format: WroteXlog: too short");
    }

    #[test]
    fn test_field_decode_keeps_index_and_source() {
        let err = CodecError::FieldDecode {
            index: 2,
            source: Box::new(CodecError::UnknownOid(9999)),
        };
        assert_eq!(err.field_index(), Some(2));
        assert!(err.to_string().contains("unknown OID 9999"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_unknown_message_type_display() {
        let err = CodecError::UnknownMessageType {
            direction: Direction::Backend,
            tag: b'?',
        };
        assert_eq!(err.to_string(), "unknown backend message type: 0x3f");
    }
}
