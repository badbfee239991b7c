//! SNTP request construction and response validation.

use bytes::{BufMut, BytesMut};

use super::timestamp::{FRACTION_SCALE, NtpTimestamp};
use crate::error::ProtocolError;

/// Protocol version written into requests
pub const NTP_VERSION: u8 = 4;

/// Size of an SNTP packet without extension fields
pub const PACKET_SIZE: usize = 48;

/// Byte offsets inside the 48-byte packet
mod offsets {
    pub const HEADER: usize = 0;
    pub const STRATUM: usize = 1;
    pub const ORIGIN: usize = 24;
    pub const RECEIVE: usize = 32;
    pub const TRANSMIT: usize = 40;
}

/// Leap indicator (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LeapIndicator {
    /// No warning
    None = 0,
    /// Last minute of the day has 61 seconds
    AddSecond = 1,
    /// Last minute of the day has 59 seconds
    RemoveSecond = 2,
    /// Clock unsynchronized
    Unsynchronized = 3,
}

impl LeapIndicator {
    /// Parse from the two low bits of `bits`
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::None,
            1 => Self::AddSecond,
            2 => Self::RemoveSecond,
            _ => Self::Unsynchronized,
        }
    }
}

/// Association mode (3 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    /// Reserved
    Unspecified = 0,
    /// Symmetric active
    SymmetricActive = 1,
    /// Symmetric passive
    SymmetricPassive = 2,
    /// Client
    Client = 3,
    /// Server
    Server = 4,
    /// Broadcast / multicast
    Broadcast = 5,
    /// NTP control message
    ControlMessage = 6,
    /// Reserved for private use
    Private = 7,
}

impl Mode {
    /// Parse from the three low bits of `bits`
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Self::Unspecified,
            1 => Self::SymmetricActive,
            2 => Self::SymmetricPassive,
            3 => Self::Client,
            4 => Self::Server,
            5 => Self::Broadcast,
            6 => Self::ControlMessage,
            _ => Self::Private,
        }
    }
}

/// First header byte: LI (2) | VN (3) | Mode (3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeapVersionMode {
    /// Leap indicator
    pub leap: LeapIndicator,
    /// Protocol version
    pub version: u8,
    /// Association mode
    pub mode: Mode,
}

impl LeapVersionMode {
    /// Header byte for a client request
    #[must_use]
    pub fn client() -> Self {
        Self {
            leap: LeapIndicator::None,
            version: NTP_VERSION,
            mode: Mode::Client,
        }
    }

    /// Unpack from the header byte
    #[must_use]
    pub fn from_byte(b: u8) -> Self {
        Self {
            leap: LeapIndicator::from_bits(b >> 6),
            version: (b >> 3) & 0b111,
            mode: Mode::from_bits(b),
        }
    }

    /// Pack into the header byte
    #[must_use]
    pub fn to_byte(self) -> u8 {
        ((self.leap as u8) << 6) | ((self.version & 0b111) << 3) | (self.mode as u8)
    }
}

/// Result of one successful exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SntpSample {
    /// Estimated `server - local` clock difference, in seconds
    pub offset_seconds: f64,
    /// Round-trip network delay, in seconds
    pub delay_seconds: f64,
    /// Stratum declared by the server
    pub stratum: u8,
}

/// Build a client request whose transmit timestamp is `local_now`.
///
/// The server echoes this value back as the origin timestamp.
#[must_use]
pub fn build_request(local_now: NtpTimestamp) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(PACKET_SIZE);
    buf.put_u8(LeapVersionMode::client().to_byte());
    buf.put_bytes(0, offsets::TRANSMIT - 1);
    buf.put_u64(local_now.to_raw());
    buf.to_vec()
}

/// Validate a server response and compute offset and delay.
///
/// `request_sent_at` is the transmit timestamp of the paired request and
/// `response_received_at` the local instant the response arrived.
///
/// # Errors
///
/// Returns `ProtocolError` if the packet is truncated, the server is
/// unsynchronized, the mode is not SERVER, the stratum is outside `1..16`, or
/// the transmit timestamp is zero.
pub fn parse_response(
    buf: &[u8],
    request_sent_at: NtpTimestamp,
    response_received_at: NtpTimestamp,
) -> Result<SntpSample, ProtocolError> {
    if buf.len() < PACKET_SIZE {
        return Err(ProtocolError::TooShort {
            needed: PACKET_SIZE,
            have: buf.len(),
        });
    }

    let lvm = LeapVersionMode::from_byte(buf[offsets::HEADER]);
    let stratum = buf[offsets::STRATUM];
    let origin = read_timestamp(buf, offsets::ORIGIN);
    let receive = read_timestamp(buf, offsets::RECEIVE);
    let transmit = read_timestamp(buf, offsets::TRANSMIT);

    if lvm.leap == LeapIndicator::Unsynchronized {
        return Err(ProtocolError::Unsynchronized);
    }
    if lvm.mode != Mode::Server {
        return Err(ProtocolError::UnexpectedMode(lvm.mode));
    }
    if stratum == 0 || stratum >= 16 {
        return Err(ProtocolError::InvalidStratum(stratum));
    }
    if transmit.is_zero() {
        return Err(ProtocolError::ZeroTransmit);
    }

    if origin != request_sent_at {
        tracing::trace!(
            %origin,
            %request_sent_at,
            "SNTP: origin timestamp does not echo our request"
        );
    }

    // offset = ((T2 - T1) - (T4 - T3)) / 2
    // delay  = (T4 - T1) - (T3 - T2)
    let offset_raw = receive.diff_raw(&origin) - response_received_at.diff_raw(&transmit);
    let delay_raw = response_received_at.diff_raw(&origin) - transmit.diff_raw(&receive);

    #[allow(clippy::cast_precision_loss)]
    Ok(SntpSample {
        offset_seconds: offset_raw as f64 / 2.0 / FRACTION_SCALE,
        delay_seconds: delay_raw as f64 / FRACTION_SCALE,
        stratum,
    })
}

fn read_timestamp(buf: &[u8], at: usize) -> NtpTimestamp {
    NtpTimestamp::decode(&buf[at..at + NtpTimestamp::SIZE]).unwrap_or_default()
}
