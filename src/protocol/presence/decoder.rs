//! Classification and decoding of presence datagrams.

use std::net::SocketAddr;

use super::schema::{DEVICE_SCHEMA, DecodedFields, NVR_SCHEMA, decode_fields};
use crate::error::DecodeError;
use crate::types::{DeviceKind, DeviceRecord, NvrRecord, PresenceRecord, RecordHeader, Trailer};

/// Decode one datagram received from `source`.
///
/// Only the leading magic byte can make this fail; a short payload yields a
/// record flagged as truncated and malformed trailer lines are skipped.
///
/// # Errors
///
/// Returns `DecodeError::Empty` for a zero-length payload and
/// `DecodeError::UnknownMagic` if the first byte selects no schema.
pub fn decode(payload: &[u8], source: SocketAddr) -> Result<PresenceRecord, DecodeError> {
    let magic = *payload.first().ok_or(DecodeError::Empty)?;
    let kind = DeviceKind::from_magic(magic).ok_or(DecodeError::UnknownMagic(magic))?;

    let record = match kind {
        DeviceKind::Nvr => {
            let fields = decode_fields(NVR_SCHEMA, payload);
            PresenceRecord::Nvr(NvrRecord {
                source,
                header: header(&fields),
                trailer: parse_trailer(&payload[fields.consumed..]),
                truncated: fields.truncated,
            })
        }
        DeviceKind::Device => {
            let f = decode_fields(DEVICE_SCHEMA, payload);
            PresenceRecord::Device(Box::new(DeviceRecord {
                source,
                header: header(&f),
                version: f.string("version"),
                hostname: f.string("hostname"),
                ip: f.ipv4("ip"),
                subnet_mask: f.ipv4("subnet_mask"),
                default_gateway: f.ipv4("default_gateway"),
                dns_ip: f.ipv4("dns_ip"),
                alarm_ip: f.ipv4("alarm_ip"),
                alarm_port: f.port("alarm_port"),
                unknown_4e: f.string("unknown_4e"),
                email_ip: f.ipv4("email_ip"),
                email_port: f.port("email_port"),
                unknown_56: f.string("unknown_56"),
                http_port: f.port("http_port"),
                https_port: f.port("https_port"),
                tcp_port: f.port("tcp_port"),
                max_connections: f.port("max_connections"),
                ssl_port: f.port("ssl_port"),
                udp_port: f.port("udp_port"),
                unknown_6a: f.string("unknown_6a"),
                multicast_ip: f.ipv4("multicast_ip"),
                multicast_port: f.port("multicast_port"),
                unknown_72: f.string("unknown_72"),
                mac: f.string("mac"),
                model: f.string("model"),
                trailer: parse_trailer(&payload[f.consumed..]),
                truncated: f.truncated,
            }))
        }
    };

    tracing::trace!(
        %source,
        kind = %kind,
        len = payload.len(),
        truncated = record.is_truncated(),
        "Decoded presence record"
    );

    Ok(record)
}

fn header(fields: &DecodedFields) -> RecordHeader {
    RecordHeader {
        message_type: fields.string("message_type"),
        payload_length: fields.unsigned("payload_length"),
        seq_or_id: fields.string("seq_or_id"),
        unknown_0c: fields.string("unknown_0c"),
        length_or_sid: fields.string("length_or_sid"),
        trailer_length: fields.unsigned("trailer_length"),
        sid: fields.string("sid"),
        unknown_1c: fields.string("unknown_1c"),
    }
}

/// Parse the free-form block after the fixed fields.
///
/// Each line of the form `key: value` becomes an entry, split at the first
/// colon with both sides trimmed. Lines without a colon or with an empty key
/// are ignored, as are NUL padding bytes.
#[must_use]
pub fn parse_trailer(bytes: &[u8]) -> Trailer {
    let text = String::from_utf8_lossy(bytes);
    let mut trailer = Trailer::new();

    for line in text.lines() {
        let line = line.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        trailer.insert(key, value.trim());
    }

    trailer
}
