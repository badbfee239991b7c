//! Centralized controller state

use std::fmt;
use std::net::IpAddr;

use tokio::sync::{RwLock, watch};

/// Phase of the receive-side state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ControllerState {
    /// Waiting for a recorder announcement to bind the clock to
    #[default]
    Uninitialized,
    /// Clock valid; announcements are being registered
    Running,
    /// Clock validity was lost; the registry is about to be cleared
    ClockLost,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Running => f.write_str("running"),
            Self::ClockLost => f.write_str("clock lost"),
        }
    }
}

/// Observable summary of the controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerStatus {
    /// Current phase
    pub state: ControllerState,
    /// Time server the clock was bound to on entering `Running`
    pub time_source: Option<IpAddr>,
    /// Registry size after the last step
    pub registered: usize,
    /// Number of registry resets so far
    pub resets: u64,
}

/// State container with change notifications
pub struct StateContainer {
    /// Current state
    state: RwLock<ControllerStatus>,
    /// State change sender
    tx: watch::Sender<ControllerStatus>,
    /// State change receiver (clone for subscribers)
    rx: watch::Receiver<ControllerStatus>,
}

impl StateContainer {
    /// Create a new state container
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ControllerStatus::default());
        Self {
            state: RwLock::new(ControllerStatus::default()),
            tx,
            rx,
        }
    }

    /// Get current status
    pub async fn get(&self) -> ControllerStatus {
        self.state.read().await.clone()
    }

    /// Subscribe to status changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.rx.clone()
    }

    /// Update status with a function; subscribers are only woken on change
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut ControllerStatus),
    {
        let mut state = self.state.write().await;
        let before = state.clone();
        f(&mut state);
        if *state != before {
            let _ = self.tx.send(state.clone());
        }
    }

    /// Set phase
    pub async fn set_state(&self, phase: ControllerState) {
        self.update(|s| s.state = phase).await;
    }
}

impl Default for StateContainer {
    fn default() -> Self {
        Self::new()
    }
}
