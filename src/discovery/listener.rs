//! UDP socket receiving presence broadcasts.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::types::DiscoveryConfig;

/// Largest datagram read; appliance announcements are well below this
const RECV_BUFFER: usize = 1024;

/// Receives raw presence datagrams with a bounded wait
#[derive(Debug)]
pub struct PresenceListener {
    socket: UdpSocket,
    receive_timeout: Duration,
    buf: Vec<u8>,
}

impl PresenceListener {
    /// Bind `0.0.0.0:<port>` with broadcast reception enabled
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn bind(config: &DiscoveryConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.port)).await?;
        socket.set_broadcast(true)?;
        tracing::info!(addr = %socket.local_addr()?, "Listening for presence broadcasts");
        Ok(Self::from_socket(socket, config.receive_timeout))
    }

    /// Wrap an already bound socket
    #[must_use]
    pub fn from_socket(socket: UdpSocket, receive_timeout: Duration) -> Self {
        Self {
            socket,
            receive_timeout,
            buf: vec![0u8; RECV_BUFFER],
        }
    }

    /// Local address of the socket
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be queried.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait up to the receive timeout for one datagram.
    ///
    /// Returns `None` on timeout.
    ///
    /// # Errors
    ///
    /// Returns socket errors other than the timeout.
    pub async fn recv(&mut self) -> io::Result<Option<(Vec<u8>, SocketAddr)>> {
        match tokio::time::timeout(self.receive_timeout, self.socket.recv_from(&mut self.buf)).await {
            Ok(Ok((len, source))) => Ok(Some((self.buf[..len].to_vec(), source))),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }
}
