use std::io;
use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::sntp::Mode;

/// A time server response that is malformed or not usable for synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Response is shorter than a full SNTP packet
    #[error("response too short: need {needed} bytes, have {have}")]
    TooShort {
        /// Bytes required
        needed: usize,
        /// Bytes received
        have: usize,
    },

    /// Server flagged itself as unsynchronized
    #[error("server clock is unsynchronized")]
    Unsynchronized,

    /// Mode was not SERVER
    #[error("unexpected mode in response: {0:?}")]
    UnexpectedMode(Mode),

    /// Stratum outside `1..16`
    #[error("implausible stratum {0}")]
    InvalidStratum(u8),

    /// Transmit timestamp was zero
    #[error("transmit timestamp is zero")]
    ZeroTransmit,
}

/// Failure of a single request/response exchange with the time server
#[derive(Debug, Error)]
pub enum SyncError {
    /// The response failed validation
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No response within the exchange window
    #[error("no response within {duration:?}")]
    Timeout {
        /// The exchange timeout that elapsed
        duration: Duration,
    },

    /// Socket error while talking to the server
    #[error("network error: {0}")]
    Network(#[from] io::Error),
}

/// A presence datagram that cannot be classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Zero-length datagram
    #[error("empty payload")]
    Empty,

    /// Leading byte is neither the NVR nor the device magic
    #[error("unknown magic 0x{0:02x}")]
    UnknownMagic(u8),
}

/// The clock holds no valid offset sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not synchronized to time server {}", server_label(.server))]
pub struct NotSynchronized {
    /// The time server the clock was bound to, if any
    pub server: Option<IpAddr>,
}

fn server_label(server: &Option<IpAddr>) -> String {
    server.map_or_else(|| "<none>".to_string(), |s| s.to_string())
}

/// Errors surfaced by the agent
#[derive(Debug, Error)]
pub enum TwilightError {
    /// Clock queried without a valid offset
    #[error(transparent)]
    NotSynchronized(#[from] NotSynchronized),

    /// Presence datagram rejected
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Time exchange failed
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Socket setup or I/O error
    #[error("network error: {0}")]
    NetworkError(#[from] io::Error),

    /// Configuration could not be loaded
    #[error("configuration error: {message}")]
    Config {
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid parameter provided
    #[error("invalid parameter: {name} - {message}")]
    InvalidParameter {
        /// The name of the parameter
        name: String,
        /// Description of the error
        message: String,
    },
}

impl TwilightError {
    /// Check if this error is transient and the operation may succeed later
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotSynchronized(_) | Self::Decode(_) | Self::Sync(_)
        )
    }
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, TwilightError>;
