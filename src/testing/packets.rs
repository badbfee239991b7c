//! Builders for wire datagrams used by tests and the benchmarks.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use bytes::{BufMut, BytesMut};

use crate::protocol::presence::{DEVICE_PREFIX_LEN, NVR_PREFIX_LEN};
use crate::protocol::sntp::{NtpTimestamp, PACKET_SIZE};
use crate::types::{
    DeviceKind, DeviceRecord, NvrRecord, PresenceRecord, RecordHeader, Trailer,
};

/// Build a 48-byte SNTP response with the given header byte, stratum and
/// timestamps; every other field is zero.
#[must_use]
pub fn sntp_response(
    header: u8,
    stratum: u8,
    origin: NtpTimestamp,
    receive: NtpTimestamp,
    transmit: NtpTimestamp,
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(PACKET_SIZE);
    buf.put_u8(header);
    buf.put_u8(stratum);
    buf.put_bytes(0, 22);
    buf.put_u64(origin.to_raw());
    buf.put_u64(receive.to_raw());
    buf.put_u64(transmit.to_raw());
    buf.to_vec()
}

/// Recorder announcement
#[derive(Debug, Clone)]
pub struct NvrPayload {
    /// Trailer lines, `(key, value)`
    pub trailer: Vec<(String, String)>,
}

impl Default for NvrPayload {
    fn default() -> Self {
        Self {
            trailer: vec![
                ("Name".to_string(), "NVR".to_string()),
                ("SerialNo".to_string(), "NVR0000000001".to_string()),
            ],
        }
    }
}

impl NvrPayload {
    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let trailer = encode_trailer(&self.trailer);
        let mut buf = BytesMut::with_capacity(NVR_PREFIX_LEN + trailer.len());
        put_header(&mut buf, DeviceKind::Nvr, 0, trailer.len());
        buf.put_slice(&trailer);
        buf.to_vec()
    }
}

/// Camera announcement
#[derive(Debug, Clone)]
pub struct DevicePayload {
    /// Firmware version components
    pub version: [u16; 4],
    /// Hostname (at most 16 bytes on the wire)
    pub hostname: String,
    /// Declared address
    pub ip: Ipv4Addr,
    /// Subnet mask
    pub subnet_mask: Ipv4Addr,
    /// Default gateway
    pub default_gateway: Ipv4Addr,
    /// HTTP port
    pub http_port: u16,
    /// HTTPS port
    pub https_port: u16,
    /// Proprietary TCP port
    pub tcp_port: u16,
    /// Multicast group
    pub multicast_ip: Ipv4Addr,
    /// Multicast port
    pub multicast_port: u16,
    /// MAC address text (17 bytes on the wire)
    pub mac: String,
    /// Model text (11 bytes on the wire)
    pub model: String,
    /// Trailer lines, `(key, value)`
    pub trailer: Vec<(String, String)>,
}

impl Default for DevicePayload {
    fn default() -> Self {
        Self {
            version: [2, 800, 0, 7],
            hostname: "camera".to_string(),
            ip: Ipv4Addr::new(192, 168, 1, 108),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            default_gateway: Ipv4Addr::new(192, 168, 1, 1),
            http_port: 80,
            https_port: 443,
            tcp_port: 37777,
            multicast_ip: Ipv4Addr::new(239, 255, 42, 42),
            multicast_port: 36666,
            mac: "3c:ef:8c:01:02:03".to_string(),
            model: "IPC-HDW".to_string(),
            trailer: vec![
                ("Name".to_string(), "camera".to_string()),
                ("SerialNo".to_string(), "7K0000000001".to_string()),
            ],
        }
    }
}

impl DevicePayload {
    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        const MAC_AND_MODEL: usize = 17 + 11;

        let trailer = encode_trailer(&self.trailer);
        let mut buf = BytesMut::with_capacity(DEVICE_PREFIX_LEN + trailer.len());
        put_header(
            &mut buf,
            DeviceKind::Device,
            DEVICE_PREFIX_LEN - NVR_PREFIX_LEN - MAC_AND_MODEL,
            trailer.len(),
        );

        for component in self.version {
            buf.put_u16_le(component);
        }
        put_text(&mut buf, &self.hostname, 16);
        buf.put_slice(&self.ip.octets());
        buf.put_slice(&self.subnet_mask.octets());
        buf.put_slice(&self.default_gateway.octets());
        buf.put_slice(&self.default_gateway.octets()); // dns
        buf.put_bytes(0, 4); // alarm ip
        buf.put_u16_le(0); // alarm port
        buf.put_slice(&[0x2f, 0x01]);
        buf.put_bytes(0, 4); // email ip
        buf.put_u16_le(25);
        buf.put_slice(&[0x00, 0x02, 0, 0, 0, 0, 0, 0]);
        buf.put_u16_le(self.http_port);
        buf.put_u16_le(self.https_port);
        buf.put_u16_le(self.tcp_port);
        buf.put_u16_le(10); // max connections
        buf.put_u16_le(0); // ssl
        buf.put_u16_le(37778); // udp
        buf.put_bytes(0, 2);
        buf.put_slice(&self.multicast_ip.octets());
        buf.put_u16_le(self.multicast_port);
        buf.put_bytes(0, 6);
        put_text(&mut buf, &self.mac, 17);
        put_text(&mut buf, &self.model, 11);
        buf.put_slice(&trailer);
        buf.to_vec()
    }
}

/// Encoded recorder announcement with the given trailer lines
#[must_use]
pub fn nvr_payload(trailer: &[(&str, &str)]) -> Vec<u8> {
    NvrPayload {
        trailer: owned(trailer),
    }
    .encode()
}

/// Encoded camera announcement with the given identity and trailer lines
#[must_use]
pub fn device_payload(hostname: &str, ip: Ipv4Addr, mac: &str, trailer: &[(&str, &str)]) -> Vec<u8> {
    DevicePayload {
        hostname: hostname.to_string(),
        ip,
        mac: mac.to_string(),
        trailer: owned(trailer),
        ..DevicePayload::default()
    }
    .encode()
}

/// Recorder record as the decoder would produce it for `source`
#[must_use]
pub fn nvr_record(source: SocketAddr) -> PresenceRecord {
    PresenceRecord::Nvr(NvrRecord {
        source,
        header: RecordHeader::default(),
        trailer: Trailer::new(),
        truncated: false,
    })
}

/// Camera record built directly, without a wire round trip. The declared
/// address is the source address when that is IPv4.
#[must_use]
pub fn device_record(source: SocketAddr, hostname: &str, mac: &str, trailer: Trailer) -> PresenceRecord {
    let ip = match source.ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
    };
    PresenceRecord::Device(Box::new(DeviceRecord {
        source,
        header: RecordHeader::default(),
        version: "2.800.0.7".to_string(),
        hostname: hostname.to_string(),
        ip,
        subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
        default_gateway: Ipv4Addr::UNSPECIFIED,
        dns_ip: Ipv4Addr::UNSPECIFIED,
        alarm_ip: Ipv4Addr::UNSPECIFIED,
        alarm_port: 0,
        unknown_4e: String::new(),
        email_ip: Ipv4Addr::UNSPECIFIED,
        email_port: 0,
        unknown_56: String::new(),
        http_port: 80,
        https_port: 443,
        tcp_port: 37777,
        max_connections: 10,
        ssl_port: 0,
        udp_port: 0,
        unknown_6a: String::new(),
        multicast_ip: Ipv4Addr::UNSPECIFIED,
        multicast_port: 0,
        unknown_72: String::new(),
        mac: mac.to_string(),
        model: "IPC-HDW".to_string(),
        trailer,
        truncated: false,
    }))
}

fn put_header(buf: &mut BytesMut, kind: DeviceKind, payload_length: usize, trailer_length: usize) {
    let (sub, sid) = match kind {
        DeviceKind::Nvr => ([0x01, 0x00, 0x01], [0, 0, 0, 0]),
        DeviceKind::Device => ([0x00, 0x1c, 0x01], [0, 0, 1, 0]),
    };
    buf.put_u8(kind.magic());
    buf.put_slice(&sub);
    buf.put_u32_le(u32::try_from(payload_length).unwrap_or(u32::MAX));
    buf.put_bytes(0, 8); // seq_or_id, unknown_0c
    buf.put_slice(&[0x02, 0, 0, 0]);
    buf.put_u32_le(u32::try_from(trailer_length).unwrap_or(u32::MAX));
    buf.put_slice(&sid);
    buf.put_bytes(0, 4);
}

fn put_text(buf: &mut BytesMut, text: &str, width: usize) {
    let bytes = &text.as_bytes()[..text.len().min(width)];
    buf.put_slice(bytes);
    buf.put_bytes(0, width - bytes.len());
}

fn encode_trailer(lines: &[(String, String)]) -> Vec<u8> {
    lines
        .iter()
        .map(|(k, v)| format!("{k}: {v}\r\n"))
        .collect::<String>()
        .into_bytes()
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
