//! Presence protocol decoder.
//!
//! Appliances broadcast a datagram whose first byte selects the record
//! schema: `0xA3` for recorders, `0xB3` for cameras. The fixed fields are
//! followed by a text block of `key: value` lines.
//!
//! ```text
//! 0x00  header (8 x 4 bytes)          both kinds
//! 0x20  version, hostname, addresses  cameras only
//! 0x78  MAC (17 bytes)
//! 0x89  model (11 bytes)
//! 0x94  trailer text ...
//! ```

pub mod decoder;
pub mod schema;


pub use decoder::{decode, parse_trailer};
pub use schema::{
    DEVICE_PREFIX_LEN, DEVICE_SCHEMA, DecodedFields, FieldRule, FieldSpec, FieldValue,
    NVR_PREFIX_LEN, NVR_SCHEMA, decode_fields, schema_len,
};
