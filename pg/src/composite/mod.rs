//! Composite (row) value codecs.
//!
//! - `binary`: builder and scanner for the OID-tagged binary format
//! - `text`: builder and scanner for the parenthesized text format
//! - `fields`: [`CompositeFields`], the schema-less aggregate over both

pub mod binary;
pub mod fields;
pub mod text;

pub use binary::{BinaryField, CompositeBinaryBuilder, CompositeBinaryScanner};
pub use fields::{
    CompositeFields, MAX_RECORD_DEPTH, RecordCodec, decode_binary_into, decode_text_into,
};
pub use text::{CompositeTextBuilder, CompositeTextScanner, quote_composite_field_if_needed};
