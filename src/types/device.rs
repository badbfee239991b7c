use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use serde::Deserialize;

/// Which presence schema a record was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Recorder announcement (magic `0xA3`)
    Nvr,
    /// Camera announcement (magic `0xB3`)
    Device,
}

impl DeviceKind {
    /// Leading byte of a datagram carrying this kind
    #[must_use]
    pub fn magic(self) -> u8 {
        match self {
            Self::Nvr => 0xA3,
            Self::Device => 0xB3,
        }
    }

    /// Classify by leading byte
    #[must_use]
    pub fn from_magic(b: u8) -> Option<Self> {
        match b {
            0xA3 => Some(Self::Nvr),
            0xB3 => Some(Self::Device),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nvr => f.write_str("nvr"),
            Self::Device => f.write_str("device"),
        }
    }
}

/// Insertion-ordered `key: value` pairs from the free-form block that follows
/// the fixed fields. A repeated key keeps its first position and its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trailer {
    entries: Vec<(String, String)>,
}

impl Trailer {
    /// Create an empty trailer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Look up a value by exact key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Well-known trailer keys
pub mod trailer_keys {
    /// Device name / identifier
    pub const NAME: &str = "Name";
    /// Serial number
    pub const SERIAL: &str = "SerialNo";
    /// IPv6 address, `addr/prefix;...`
    pub const IPV6: &str = "IPv6Addr";
}

/// The 32-byte header shared by both record kinds.
///
/// Most of these fields are undocumented; opaque ones are kept as the
/// space-separated hex dump of their wire bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHeader {
    /// Message type bytes, e.g. `a3 01 00 01`
    pub message_type: String,
    /// Declared payload length (excludes header, MAC, model and trailer)
    pub payload_length: u32,
    /// Sequence or identifier bytes
    pub seq_or_id: String,
    /// Unknown bytes at 0x0C
    pub unknown_0c: String,
    /// Length or session bytes
    pub length_or_sid: String,
    /// Declared trailer length
    pub trailer_length: u32,
    /// Session identifier bytes
    pub sid: String,
    /// Unknown bytes at 0x1C
    pub unknown_1c: String,
}

/// Announcement from a recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvrRecord {
    /// Where the datagram came from
    pub source: SocketAddr,
    /// Fixed header
    pub header: RecordHeader,
    /// Trailing `key: value` block
    pub trailer: Trailer,
    /// The datagram ended inside the fixed fields
    pub truncated: bool,
}

impl NvrRecord {
    /// Recorders carry no hostname; one is derived from the last address octet
    #[must_use]
    pub fn hostname(&self) -> String {
        match self.source.ip() {
            IpAddr::V4(ip) => format!("NVR{}", ip.octets()[3]),
            IpAddr::V6(ip) => format!("NVR{:x}", ip.segments()[7]),
        }
    }
}

/// Announcement from a camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Where the datagram came from
    pub source: SocketAddr,
    /// Fixed header
    pub header: RecordHeader,
    /// Firmware version, `a.b.c.d`
    pub version: String,
    /// Configured hostname
    pub hostname: String,
    /// Declared IPv4 address
    pub ip: Ipv4Addr,
    /// Subnet mask
    pub subnet_mask: Ipv4Addr,
    /// Default gateway
    pub default_gateway: Ipv4Addr,
    /// DNS server
    pub dns_ip: Ipv4Addr,
    /// Alarm server address
    pub alarm_ip: Ipv4Addr,
    /// Alarm server port
    pub alarm_port: u16,
    /// Unknown bytes at 0x4E
    pub unknown_4e: String,
    /// Mail server address
    pub email_ip: Ipv4Addr,
    /// Mail server port
    pub email_port: u16,
    /// Unknown bytes at 0x56
    pub unknown_56: String,
    /// HTTP port
    pub http_port: u16,
    /// HTTPS port
    pub https_port: u16,
    /// Proprietary TCP service port
    pub tcp_port: u16,
    /// Maximum concurrent connections
    pub max_connections: u16,
    /// SSL service port
    pub ssl_port: u16,
    /// UDP service port
    pub udp_port: u16,
    /// Unknown bytes at 0x6A
    pub unknown_6a: String,
    /// Multicast group address
    pub multicast_ip: Ipv4Addr,
    /// Multicast port
    pub multicast_port: u16,
    /// Unknown bytes at 0x72
    pub unknown_72: String,
    /// MAC address as announced, e.g. `3c:ef:8c:01:02:03`
    pub mac: String,
    /// Model string
    pub model: String,
    /// Trailing `key: value` block
    pub trailer: Trailer,
    /// The datagram ended inside the fixed fields
    pub truncated: bool,
}

/// A decoded presence datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceRecord {
    /// Recorder
    Nvr(NvrRecord),
    /// Camera
    Device(Box<DeviceRecord>),
}

impl PresenceRecord {
    /// Schema the record was decoded with
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Nvr(_) => DeviceKind::Nvr,
            Self::Device(_) => DeviceKind::Device,
        }
    }

    /// Origin of the datagram
    #[must_use]
    pub fn source(&self) -> SocketAddr {
        match self {
            Self::Nvr(r) => r.source,
            Self::Device(r) => r.source,
        }
    }

    /// Originating host; the registry key
    #[must_use]
    pub fn host(&self) -> IpAddr {
        self.source().ip()
    }

    /// Fixed header
    #[must_use]
    pub fn header(&self) -> &RecordHeader {
        match self {
            Self::Nvr(r) => &r.header,
            Self::Device(r) => &r.header,
        }
    }

    /// Trailing `key: value` block
    #[must_use]
    pub fn trailer(&self) -> &Trailer {
        match self {
            Self::Nvr(r) => &r.trailer,
            Self::Device(r) => &r.trailer,
        }
    }

    /// Hostname, announced or derived
    #[must_use]
    pub fn hostname(&self) -> String {
        match self {
            Self::Nvr(r) => r.hostname(),
            Self::Device(r) => r.hostname.clone(),
        }
    }

    /// Announced MAC address (cameras only)
    #[must_use]
    pub fn mac(&self) -> Option<&str> {
        match self {
            Self::Nvr(_) => None,
            Self::Device(r) => Some(r.mac.as_str()),
        }
    }

    /// Model string (cameras only)
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.as_device().map(|r| r.model.as_str())
    }

    /// Firmware version (cameras only)
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.as_device().map(|r| r.version.as_str())
    }

    /// Declared IPv4 address (cameras only)
    #[must_use]
    pub fn declared_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            Self::Nvr(_) => None,
            Self::Device(r) => Some(r.ip),
        }
    }

    /// `Name` trailer entry
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.trailer().get(trailer_keys::NAME)
    }

    /// `SerialNo` trailer entry
    #[must_use]
    pub fn serial(&self) -> Option<&str> {
        self.trailer().get(trailer_keys::SERIAL)
    }

    /// First address of the `IPv6Addr` trailer entry, prefix length stripped
    #[must_use]
    pub fn ipv6(&self) -> Option<Ipv6Addr> {
        let raw = self.trailer().get(trailer_keys::IPV6)?;
        let first = raw.split(';').next()?.trim();
        let addr = first.split('/').next()?;
        addr.parse().ok()
    }

    /// The datagram ended inside the fixed fields
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        match self {
            Self::Nvr(r) => r.truncated,
            Self::Device(r) => r.truncated,
        }
    }

    /// Camera view, if this is one
    #[must_use]
    pub fn as_device(&self) -> Option<&DeviceRecord> {
        match self {
            Self::Device(r) => Some(r),
            Self::Nvr(_) => None,
        }
    }
}

/// Criteria that pick a camera out of the roster.
///
/// Every criterion that is set must match; an empty selector matches all
/// cameras.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceSelector {
    /// Announced hostname
    pub hostname: Option<String>,
    /// `Name` trailer entry
    pub id: Option<String>,
    /// `SerialNo` trailer entry
    pub serial: Option<String>,
    /// Declared IPv4 address
    pub ipv4: Option<Ipv4Addr>,
    /// Announced IPv6 address
    pub ipv6: Option<Ipv6Addr>,
    /// MAC address in any common notation
    pub mac: Option<String>,
}

impl DeviceSelector {
    /// Whether `record` satisfies every configured criterion
    #[must_use]
    pub fn matches(&self, record: &PresenceRecord) -> bool {
        let Some(device) = record.as_device() else {
            return false;
        };

        if let Some(hostname) = &self.hostname {
            if *hostname != device.hostname {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if record.id() != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(serial) = &self.serial {
            if record.serial() != Some(serial.as_str()) {
                return false;
            }
        }
        if let Some(ipv4) = self.ipv4 {
            if ipv4 != device.ip {
                return false;
            }
        }
        if let Some(ipv6) = self.ipv6 {
            if record.ipv6() != Some(ipv6) {
                return false;
            }
        }
        if let Some(mac) = &self.mac {
            if normalize_mac(mac) != normalize_mac(&device.mac) {
                return false;
            }
        }
        true
    }
}

/// Lowercase hex digits only, so `3C-EF-8C-01-02-03` equals `3cef8c010203`
fn normalize_mac(mac: &str) -> String {
    mac.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
