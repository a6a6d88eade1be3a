//! # pgwire-codec
//!
//! Wire-level codecs for a PostgreSQL-family client:
//!
//! - [`protocol`]: message envelopes with length-prefixed and fixed-size
//!   framing, plus a frame parser for byte streams
//! - [`composite`]: composite (row) values in the binary and text formats
//! - [`types`]: values, OIDs and the type registry used for capability
//!   dispatch
//!
//! Everything is a synchronous buffer-to-buffer transform; callers own the
//! sockets.
//!
//! ```
//! use bytes::BytesMut;
//! use pgwire_codec::{CompositeFields, TypeRegistry, Value};
//!
//! let registry = TypeRegistry::with_builtins();
//! let fields = CompositeFields::new(vec![Value::Int4(1), Value::from("a,b")]);
//!
//! let mut buf = BytesMut::new();
//! fields.encode_text(&registry, &mut buf).unwrap();
//! assert_eq!(&buf[..], br#"(1,"a,b")"#);
//! ```

pub mod composite;
pub mod error;
pub mod protocol;
pub mod types;

pub use composite::CompositeFields;
pub use error::{CodecError, CodecResult};
pub use protocol::{BackendMessage, FrameConfig, FrontendMessage, Message};
pub use types::{FieldDest, Format, IsNull, Oid, TypeRegistry, Value, oid};
