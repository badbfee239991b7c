//! NTP 64-bit fixed-point timestamps.
//!
//! The upper 32 bits hold whole seconds since 1900-01-01 00:00:00 UTC and the
//! lower 32 bits hold the fraction of a second in units of 2^-32 s. Seconds
//! wrap every 2^32 s (era boundaries, the next one in 2036); conversions from
//! [`SystemTime`] truncate to the current era.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Fixed-point units per second (2^32).
pub const FRACTION_SCALE: f64 = 4_294_967_296.0;

/// Length of one 32-bit seconds era, in seconds.
pub const ERA_SECONDS: u64 = 1 << 32;

/// NTP timestamp (64-bit, seconds since 1900-01-01)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NtpTimestamp {
    /// Seconds since NTP epoch
    pub seconds: u32,
    /// Fractional seconds (1/2^32 of a second)
    pub fraction: u32,
}

impl NtpTimestamp {
    /// NTP epoch offset from Unix epoch (70 years in seconds)
    pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

    /// Encoded size on the wire
    pub const SIZE: usize = 8;

    /// The all-zero timestamp, meaning "not set" on the wire
    pub const ZERO: Self = Self {
        seconds: 0,
        fraction: 0,
    };

    /// The NTP prime epoch (1900-01-01) as a `SystemTime`.
    ///
    /// Falls back to the Unix epoch on platforms that cannot represent
    /// instants before 1970.
    #[must_use]
    pub fn epoch() -> SystemTime {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(Self::NTP_UNIX_OFFSET))
            .unwrap_or(UNIX_EPOCH)
    }

    /// Create from the raw 64-bit representation
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self {
            seconds: (raw >> 32) as u32,
            fraction: raw as u32,
        }
    }

    /// Raw 64-bit representation
    #[must_use]
    pub fn to_raw(self) -> u64 {
        (u64::from(self.seconds) << 32) | u64::from(self.fraction)
    }

    /// Create from fractional seconds since the NTP epoch
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Callers pass non-negative values within one era"
    )]
    pub fn from_seconds_f64(seconds: f64) -> Self {
        Self::from_raw((seconds * FRACTION_SCALE).round() as u64)
    }

    /// Fractional seconds since the NTP epoch
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_seconds_f64(self) -> f64 {
        self.to_raw() as f64 / FRACTION_SCALE
    }

    /// Convert a wall-clock instant, truncating seconds to the current era
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_ntp = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d + Duration::from_secs(Self::NTP_UNIX_OFFSET),
            Err(e) => Duration::from_secs(Self::NTP_UNIX_OFFSET).saturating_sub(e.duration()),
        };
        let fraction = (u64::from(since_ntp.subsec_nanos()) << 32) / 1_000_000_000;

        Self {
            seconds: since_ntp.as_secs() as u32,
            fraction: fraction as u32,
        }
    }

    /// Create from current time
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Encode to 8 bytes (big-endian)
    #[must_use]
    pub fn encode(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.seconds.to_be_bytes());
        buf[4..8].copy_from_slice(&self.fraction.to_be_bytes());
        buf
    }

    /// Decode from the first 8 bytes of `buf`.
    ///
    /// Returns `None` if the slice is too short.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            seconds: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            fraction: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Whether this is the all-zero timestamp
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Signed difference `self - other` in raw fixed-point units.
    ///
    /// No era unwrapping is applied.
    #[must_use]
    pub fn diff_raw(&self, other: &Self) -> i128 {
        i128::from(self.to_raw()) - i128::from(other.to_raw())
    }
}

impl std::fmt::Display for NtpTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.9}", self.as_seconds_f64())
    }
}

impl From<SystemTime> for NtpTimestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}
