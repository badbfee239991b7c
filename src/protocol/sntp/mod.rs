//! Minimal SNTP (RFC 4330) client codec.
//!
//! Stateless: builds the 48-byte client request and validates the server's
//! reply, producing an offset/delay estimate from the four timestamps.
//!
//! ```text
//! Client                          Server
//!   |--- request (T1) ------------->|  (server records T2)
//!   |<-- response (T1, T2, T3) -----|  (server sends at T3)
//!   |  (client records T4)          |
//!   |                               |
//!   |  offset = ((T2-T1)-(T4-T3))/2 |
//!   |  delay  = (T4-T1) - (T3-T2)   |
//! ```

pub mod packet;
pub mod timestamp;


pub use packet::{
    LeapIndicator, LeapVersionMode, Mode, NTP_VERSION, PACKET_SIZE, SntpSample, build_request,
    parse_response,
};
pub use timestamp::{ERA_SECONDS, FRACTION_SCALE, NtpTimestamp};

/// Standard NTP server port
pub const NTP_PORT: u16 = 123;
