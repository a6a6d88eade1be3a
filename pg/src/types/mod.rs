//! Capability dispatch: values, type OIDs, codecs and the registry.

pub mod dest;
pub mod encode;
pub mod oids;
pub mod registry;
pub mod scalar;
pub mod value;

pub use dest::{FieldDest, FromValue};
pub use encode::{BinaryEncode, Encodable, IsNull, TextEncode};
pub use oids::{Oid, oid, oid_to_name};
pub use registry::{TypeCodec, TypeDescriptor, TypeRegistry};
pub use scalar::ScalarType;
pub use value::{CustomValue, Format, Value};
