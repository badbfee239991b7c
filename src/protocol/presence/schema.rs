//! Fixed field layouts of the two presence record kinds.
//!
//! Each schema is consumed front to back, little-endian, with no gaps. The
//! layouts are the interoperability surface with the broadcasting appliances
//! and must not be reordered.

use std::net::Ipv4Addr;

use byteorder::{ByteOrder, LittleEndian};

/// How the bytes of one field are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Opaque bytes, kept as a space-separated hex dump
    Hex,
    /// Little-endian unsigned integer (2 or 4 bytes)
    Unsigned,
    /// Four address octets in wire order
    Ipv4,
    /// NUL-padded text
    Text,
    /// Four little-endian `u16` components, rendered `a.b.c.d`
    Version,
}

/// One entry of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name
    pub name: &'static str,
    /// Width on the wire, in bytes
    pub width: usize,
    /// Interpretation
    pub rule: FieldRule,
}

const fn field(name: &'static str, width: usize, rule: FieldRule) -> FieldSpec {
    FieldSpec { name, width, rule }
}

/// Header shared by both kinds; the whole fixed part of a recorder record
pub const NVR_SCHEMA: &[FieldSpec] = &[
    field("message_type", 4, FieldRule::Hex),
    field("payload_length", 4, FieldRule::Unsigned),
    field("seq_or_id", 4, FieldRule::Hex),
    field("unknown_0c", 4, FieldRule::Hex),
    field("length_or_sid", 4, FieldRule::Hex),
    field("trailer_length", 4, FieldRule::Unsigned),
    field("sid", 4, FieldRule::Hex),
    field("unknown_1c", 4, FieldRule::Hex),
];

/// Camera record: the shared header followed by the extended block
pub const DEVICE_SCHEMA: &[FieldSpec] = &[
    field("message_type", 4, FieldRule::Hex),
    field("payload_length", 4, FieldRule::Unsigned),
    field("seq_or_id", 4, FieldRule::Hex),
    field("unknown_0c", 4, FieldRule::Hex),
    field("length_or_sid", 4, FieldRule::Hex),
    field("trailer_length", 4, FieldRule::Unsigned),
    field("sid", 4, FieldRule::Hex),
    field("unknown_1c", 4, FieldRule::Hex),
    // 0x20
    field("version", 8, FieldRule::Version),
    field("hostname", 16, FieldRule::Text),
    field("ip", 4, FieldRule::Ipv4),
    field("subnet_mask", 4, FieldRule::Ipv4),
    field("default_gateway", 4, FieldRule::Ipv4),
    field("dns_ip", 4, FieldRule::Ipv4),
    field("alarm_ip", 4, FieldRule::Ipv4),
    field("alarm_port", 2, FieldRule::Unsigned),
    field("unknown_4e", 2, FieldRule::Hex),
    field("email_ip", 4, FieldRule::Ipv4),
    field("email_port", 2, FieldRule::Unsigned),
    field("unknown_56", 8, FieldRule::Hex),
    field("http_port", 2, FieldRule::Unsigned),
    field("https_port", 2, FieldRule::Unsigned),
    field("tcp_port", 2, FieldRule::Unsigned),
    field("max_connections", 2, FieldRule::Unsigned),
    field("ssl_port", 2, FieldRule::Unsigned),
    field("udp_port", 2, FieldRule::Unsigned),
    field("unknown_6a", 2, FieldRule::Hex),
    field("multicast_ip", 4, FieldRule::Ipv4),
    field("multicast_port", 2, FieldRule::Unsigned),
    field("unknown_72", 6, FieldRule::Hex),
    // 0x78
    field("mac", 17, FieldRule::Text),
    // 0x89
    field("model", 11, FieldRule::Text),
];

/// Total width of a schema's fixed part
#[must_use]
pub const fn schema_len(schema: &[FieldSpec]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < schema.len() {
        total += schema[i].width;
        i += 1;
    }
    total
}

/// Width of the recorder fixed part (32 bytes)
pub const NVR_PREFIX_LEN: usize = schema_len(NVR_SCHEMA);

/// Width of the camera fixed part (148 bytes)
pub const DEVICE_PREFIX_LEN: usize = schema_len(DEVICE_SCHEMA);

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Hex dump, e.g. `b3 00 1c 01`
    Hex(String),
    /// Unsigned integer
    Unsigned(u32),
    /// IPv4 address
    Ipv4(Ipv4Addr),
    /// Text with trailing NULs removed
    Text(String),
    /// Dotted version
    Version(String),
}

impl FieldValue {
    fn decode(rule: FieldRule, bytes: &[u8]) -> Self {
        match rule {
            FieldRule::Hex => Self::Hex(hex_dump(bytes)),
            #[allow(clippy::cast_possible_truncation)]
            FieldRule::Unsigned => Self::Unsigned(LittleEndian::read_uint(bytes, bytes.len()) as u32),
            FieldRule::Ipv4 => Self::Ipv4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])),
            FieldRule::Text => {
                let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                Self::Text(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            FieldRule::Version => Self::Version(
                bytes
                    .chunks_exact(2)
                    .map(|c| LittleEndian::read_u16(c).to_string())
                    .collect::<Vec<_>>()
                    .join("."),
            ),
        }
    }
}

/// Values of one schema, in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFields {
    values: Vec<(&'static str, FieldValue)>,
    /// Bytes of the payload consumed by the fixed part
    pub consumed: usize,
    /// The payload ended before the fixed part did
    pub truncated: bool,
}

impl DecodedFields {
    /// Look up a value by field name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Iterate `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(n, v)| (*n, v))
    }

    /// Hex or text field as a string (empty if absent)
    #[must_use]
    pub fn string(&self, name: &str) -> String {
        match self.get(name) {
            Some(FieldValue::Hex(s) | FieldValue::Text(s) | FieldValue::Version(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Unsigned field (zero if absent)
    #[must_use]
    pub fn unsigned(&self, name: &str) -> u32 {
        match self.get(name) {
            Some(FieldValue::Unsigned(v)) => *v,
            _ => 0,
        }
    }

    /// Two-byte unsigned field (zero if absent)
    #[must_use]
    pub fn port(&self, name: &str) -> u16 {
        u16::try_from(self.unsigned(name)).unwrap_or_default()
    }

    /// Address field (`0.0.0.0` if absent)
    #[must_use]
    pub fn ipv4(&self, name: &str) -> Ipv4Addr {
        match self.get(name) {
            Some(FieldValue::Ipv4(ip)) => *ip,
            _ => Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Decode the fixed part of `payload` according to `schema`.
///
/// Bytes missing at the end of a short payload read as zero and set
/// `truncated`; this never fails.
#[must_use]
pub fn decode_fields(schema: &[FieldSpec], payload: &[u8]) -> DecodedFields {
    let mut values = Vec::with_capacity(schema.len());
    let mut offset = 0;
    let mut scratch = [0u8; 32];

    for spec in schema {
        let end = offset + spec.width;
        let bytes: &[u8] = if end <= payload.len() {
            &payload[offset..end]
        } else {
            let buf = &mut scratch[..spec.width];
            buf.fill(0);
            if offset < payload.len() {
                let have = payload.len() - offset;
                buf[..have].copy_from_slice(&payload[offset..]);
            }
            buf
        };
        values.push((spec.name, FieldValue::decode(spec.rule, bytes)));
        offset = end;
    }

    DecodedFields {
        values,
        consumed: offset.min(payload.len()),
        truncated: payload.len() < offset,
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
