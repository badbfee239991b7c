//! One SNTP request/response exchange.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use super::local::LocalClock;
use crate::error::SyncError;
use crate::protocol::sntp::{NtpTimestamp, SntpSample, build_request, parse_response};

/// Measures the offset between the local clock and a time server
#[async_trait]
pub trait OffsetProbe: Send + Sync {
    /// Perform one exchange with `server`, timestamping with `local`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the exchange times out, the socket fails, or the
    /// response does not validate.
    async fn exchange(
        &self,
        server: SocketAddr,
        local: &dyn LocalClock,
    ) -> Result<SntpSample, SyncError>;
}

/// SNTP over a fresh UDP socket per exchange
#[derive(Debug, Clone, Copy)]
pub struct UdpProbe {
    timeout: Duration,
}

impl UdpProbe {
    /// Largest response read; anything beyond the base packet is ignored
    const RECV_BUFFER: usize = 1024;

    /// Create a probe whose exchanges give up after `timeout`
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Exchange timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn round_trip(
        server: SocketAddr,
        local: &dyn LocalClock,
    ) -> Result<SntpSample, SyncError> {
        let bind_addr: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server).await?;

        let sent_at = NtpTimestamp::from_system_time(local.now());
        socket.send(&build_request(sent_at)).await?;

        let mut buf = [0u8; Self::RECV_BUFFER];
        let len = socket.recv(&mut buf).await?;
        let received_at = NtpTimestamp::from_system_time(local.now());

        Ok(parse_response(&buf[..len], sent_at, received_at)?)
    }
}

#[async_trait]
impl OffsetProbe for UdpProbe {
    async fn exchange(
        &self,
        server: SocketAddr,
        local: &dyn LocalClock,
    ) -> Result<SntpSample, SyncError> {
        tokio::time::timeout(self.timeout, Self::round_trip(server, local))
            .await
            .map_err(|_| SyncError::Timeout {
                duration: self.timeout,
            })?
    }
}
