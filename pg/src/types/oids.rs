//! PostgreSQL Type OID Constants
//!
//! Reference: https://github.com/postgres/postgres/blob/master/src/include/catalog/pg_type.dat

/// Numeric identifier of a data type within the protocol's type system.
pub type Oid = postgres_protocol::Oid;

/// PostgreSQL Type OIDs with a built-in codec.
pub mod oid {
    use super::Oid;

    // Boolean
    pub const BOOL: Oid = 16;

    // Bytes
    pub const BYTEA: Oid = 17;

    // Characters
    pub const NAME: Oid = 19;

    // Integers
    pub const INT8: Oid = 20; // bigint
    pub const INT2: Oid = 21; // smallint
    pub const INT4: Oid = 23; // integer

    // Text
    pub const TEXT: Oid = 25;
    pub const BPCHAR: Oid = 1042; // blank-padded char
    pub const VARCHAR: Oid = 1043;

    // Identifiers
    pub const OID: Oid = 26;
    pub const CID: Oid = 29; // command identifier

    // Float
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;

    // Anonymous composite
    pub const RECORD: Oid = 2249;
}

/// Map OID to a human-readable type name
pub fn oid_to_name(oid: Oid) -> &'static str {
    match oid {
        oid::BOOL => "bool",
        oid::BYTEA => "bytea",
        oid::NAME => "name",
        oid::INT8 => "int8",
        oid::INT2 => "int2",
        oid::INT4 => "int4",
        oid::TEXT => "text",
        oid::BPCHAR => "bpchar",
        oid::VARCHAR => "varchar",
        oid::OID => "oid",
        oid::CID => "cid",
        oid::FLOAT4 => "float4",
        oid::FLOAT8 => "float8",
        oid::RECORD => "record",
        _ => "unknown",
    }
}
