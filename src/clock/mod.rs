//! Synchronized clock.
//!
//! The host running the agent has no trustworthy clock of its own. Time is
//! derived from the local clock plus an offset measured against a recorder
//! found on the network, and every reading is gated on having at least one
//! recent valid measurement.

mod local;
mod probe;
mod synced;


use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use local::{LocalClock, SystemClock};
pub use probe::{OffsetProbe, UdpProbe};
pub use synced::SyncedClock;

/// 2024-11-01 00:00:00 UTC, as an offset from the Unix epoch.
///
/// Synchronized readings are never earlier than this instant; results that
/// land before it are moved forward by whole 2^32-second eras.
pub const OWN_EPOCH: Duration = Duration::from_secs(1_730_419_200);

/// [`OWN_EPOCH`] as a wall-clock instant
#[must_use]
pub fn own_epoch() -> SystemTime {
    UNIX_EPOCH + OWN_EPOCH
}
