//! Event bus for controller events

use std::net::{IpAddr, SocketAddr};

use tokio::sync::broadcast;

use super::container::ControllerState;
use crate::error::DecodeError;
use crate::types::DeviceKind;

/// Controller events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    // State machine events
    /// Phase changed
    StateChanged {
        /// Previous phase
        old: ControllerState,
        /// New phase
        new: ControllerState,
    },

    // Clock events
    /// Clock bound to a recorder and valid
    ClockAcquired {
        /// The recorder serving time
        source: IpAddr,
    },
    /// Clock has no valid sample left
    ClockLost {
        /// The recorder the clock was bound to
        source: Option<IpAddr>,
    },

    // Registry events
    /// Announcement registered
    DeviceRegistered {
        /// Originating host
        host: IpAddr,
        /// Record kind
        kind: DeviceKind,
        /// Announced or derived hostname
        hostname: String,
    },
    /// Entries aged out
    DevicesEvicted {
        /// Hosts removed
        hosts: Vec<IpAddr>,
    },
    /// Registry cleared after clock loss
    RegistryReset {
        /// Entries dropped
        cleared: usize,
    },
    /// Roster handed to the consumer
    RosterDispatched {
        /// Camera records in the roster
        devices: usize,
    },

    // Error events
    /// A datagram could not be decoded
    DecodeFailed {
        /// Sender of the datagram
        source: SocketAddr,
        /// Why it was rejected
        error: DecodeError,
    },
}

/// Event bus for distributing events
pub struct EventBus {
    /// Broadcast sender
    tx: broadcast::Sender<ControllerEvent>,
}

impl EventBus {
    /// Create a new event bus
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    /// Subscribe to events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    pub fn emit(&self, event: ControllerEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    /// Get subscriber count
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
pub struct EventFilter {
    rx: broadcast::Receiver<ControllerEvent>,
    filter: Box<dyn Fn(&ControllerEvent) -> bool + Send>,
}

impl EventFilter {
    /// Create a filtered event receiver
    pub fn new<F>(bus: &EventBus, filter: F) -> Self
    where
        F: Fn(&ControllerEvent) -> bool + Send + 'static,
    {
        Self {
            rx: bus.subscribe(),
            filter: Box::new(filter),
        }
    }

    /// Receive next matching event
    pub async fn recv(&mut self) -> Option<ControllerEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already queued, without waiting
    pub fn try_recv(&mut self) -> Option<ControllerEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

/// Helper functions for common filters
impl EventFilter {
    /// Filter for state machine and clock events only
    #[must_use]
    pub fn state_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                ControllerEvent::StateChanged { .. }
                    | ControllerEvent::ClockAcquired { .. }
                    | ControllerEvent::ClockLost { .. }
            )
        })
    }

    /// Filter for registry events only
    #[must_use]
    pub fn registry_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                ControllerEvent::DeviceRegistered { .. }
                    | ControllerEvent::DevicesEvicted { .. }
                    | ControllerEvent::RegistryReset { .. }
                    | ControllerEvent::RosterDispatched { .. }
            )
        })
    }

    /// Filter for error events only
    #[must_use]
    pub fn error_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| matches!(e, ControllerEvent::DecodeFailed { .. }))
    }
}
