//! Downstream consumer of the device roster.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::PresenceRecord;

/// Cameras known at one scheduled run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    /// Synchronized time the roster was taken
    pub taken_at: DateTime<Utc>,
    /// Live camera records
    pub devices: Vec<PresenceRecord>,
}

/// Acts on the roster at each scheduled run
#[async_trait]
pub trait RosterConsumer: Send + Sync {
    /// Handle one roster
    async fn consume(&self, roster: Roster);
}
