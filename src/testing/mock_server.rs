//! Mock SNTP server for testing purposes.
//!
//! Answers client requests on a loopback UDP socket with a configurable
//! offset from the host clock, and can be told to misbehave (stay silent or
//! send invalid headers) to exercise the clock's failure handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::net::UdpSocket;
use tokio::sync::{RwLock, mpsc};

use super::packets::sntp_response;
use crate::protocol::sntp::{LeapIndicator, LeapVersionMode, Mode, NTP_VERSION, NtpTimestamp, PACKET_SIZE};

/// Configuration for the mock time server.
#[derive(Debug, Clone)]
pub struct MockTimeServerConfig {
    /// Port to listen on (0 picks an ephemeral port).
    pub port: u16,
    /// How far the server clock is ahead of the host clock, in seconds.
    pub offset_seconds: f64,
    /// Stratum sent in responses.
    pub stratum: u8,
    /// Leap indicator sent in responses.
    pub leap: LeapIndicator,
    /// Mode sent in responses.
    pub mode: Mode,
}

impl Default for MockTimeServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            offset_seconds: 0.0,
            stratum: 2,
            leap: LeapIndicator::None,
            mode: Mode::Server,
        }
    }
}

/// Internal state of the mock server.
struct ServerState {
    /// Current configuration (mutable while running).
    config: MockTimeServerConfig,
    /// Whether requests are ignored.
    silent: bool,
    /// Requests answered so far.
    answered: usize,
    /// Requests received so far, answered or not.
    received: usize,
}

/// A mock SNTP server.
pub struct MockTimeServer {
    /// Shared server state.
    state: Arc<RwLock<ServerState>>,
    /// Channel to signal shutdown to the server task.
    shutdown: Option<mpsc::Sender<()>>,
    /// The local address the server is listening on.
    address: Option<SocketAddr>,
}

impl MockTimeServer {
    /// Creates a new `MockTimeServer` with the specified configuration.
    #[must_use]
    pub fn new(config: MockTimeServerConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(ServerState {
                config,
                silent: false,
                answered: 0,
                received: 0,
            })),
            shutdown: None,
            address: None,
        }
    }

    /// Creates a server whose clock is `offset_seconds` ahead of the host.
    #[must_use]
    pub fn with_offset(offset_seconds: f64) -> Self {
        Self::new(MockTimeServerConfig {
            offset_seconds,
            ..MockTimeServerConfig::default()
        })
    }

    /// Starts the server on `127.0.0.1`.
    ///
    /// Returns the socket address the server is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the UDP socket cannot be bound.
    pub async fn start(&mut self) -> Result<SocketAddr, std::io::Error> {
        let port = self.state.read().await.config.port;
        let socket = UdpSocket::bind(("127.0.0.1", port)).await?;
        let addr = socket.local_addr()?;
        self.address = Some(addr);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        self.shutdown = Some(shutdown_tx);

        let state = self.state.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                let received = tokio::select! {
                    result = socket.recv_from(&mut buf) => result,
                    _ = shutdown_rx.recv() => break,
                };
                match received {
                    Ok((len, peer)) => {
                        if let Some(reply) = Self::answer(&state, &buf[..len]).await {
                            if let Err(e) = socket.send_to(&reply, peer).await {
                                tracing::error!("Mock time server send error: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Mock time server receive error: {}", e);
                    }
                }
            }
        });

        Ok(addr)
    }

    /// Stops the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(()).await;
        }
    }

    /// Returns the address the server is listening on.
    #[must_use]
    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    /// Ignore (or resume answering) requests.
    pub async fn set_silent(&self, silent: bool) {
        self.state.write().await.silent = silent;
    }

    /// Change the server clock offset.
    pub async fn set_offset(&self, offset_seconds: f64) {
        self.state.write().await.config.offset_seconds = offset_seconds;
    }

    /// Change the leap indicator sent in responses.
    pub async fn set_leap(&self, leap: LeapIndicator) {
        self.state.write().await.config.leap = leap;
    }

    /// Returns the number of requests answered.
    pub async fn answered(&self) -> usize {
        self.state.read().await.answered
    }

    /// Returns the number of requests received.
    pub async fn received(&self) -> usize {
        self.state.read().await.received
    }

    async fn answer(state: &RwLock<ServerState>, request: &[u8]) -> Option<Vec<u8>> {
        let mut state = state.write().await;
        state.received += 1;
        if state.silent || request.len() < PACKET_SIZE {
            return None;
        }
        state.answered += 1;

        let origin = NtpTimestamp::decode(&request[40..]).unwrap_or_default();
        let receive = NtpTimestamp::from_system_time(shifted(SystemTime::now(), state.config.offset_seconds));
        let transmit = NtpTimestamp::from_system_time(shifted(SystemTime::now(), state.config.offset_seconds));
        let header = LeapVersionMode {
            leap: state.config.leap,
            version: NTP_VERSION,
            mode: state.config.mode,
        }
        .to_byte();

        Some(sntp_response(header, state.config.stratum, origin, receive, transmit))
    }
}

fn shifted(time: SystemTime, offset_seconds: f64) -> SystemTime {
    let magnitude = Duration::from_secs_f64(offset_seconds.abs());
    if offset_seconds >= 0.0 {
        time + magnitude
    } else {
        time - magnitude
    }
}
