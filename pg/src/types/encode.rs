//! Encode capabilities.
//!
//! A value that can put itself on the wire in a given format exposes a small
//! trait object for that format. Dispatch asks for the capability it needs
//! through [`Encodable`] instead of inspecting the concrete type.

use bytes::BytesMut;

use super::TypeRegistry;
use crate::error::CodecResult;

/// Whether an encoder produced a value or a SQL NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsNull {
    Yes,
    No,
}

/// Produces the text representation of a value.
pub trait TextEncode {
    /// Append the text form to `buf`.
    ///
    /// Returning [`IsNull::Yes`] means the value is NULL; anything written to
    /// `buf` in that case is discarded by the caller.
    fn encode_text(&self, registry: &TypeRegistry, buf: &mut BytesMut) -> CodecResult<IsNull>;
}

/// Produces the binary representation of a value.
pub trait BinaryEncode {
    /// Append the binary form to `buf`. Same NULL contract as [`TextEncode`].
    fn encode_binary(&self, registry: &TypeRegistry, buf: &mut BytesMut) -> CodecResult<IsNull>;
}

/// Capability query: which wire formats a value can produce by itself.
pub trait Encodable: std::fmt::Debug + Send + Sync {
    fn as_text(&self) -> Option<&dyn TextEncode> {
        None
    }

    fn as_binary(&self) -> Option<&dyn BinaryEncode> {
        None
    }
}
