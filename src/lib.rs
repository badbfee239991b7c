//! # twilight
//!
//! An unattended agent for a network of surveillance appliances. It keeps a
//! wall clock synchronized to a recorder over SNTP and a roster of the
//! cameras and recorders announcing themselves by UDP broadcast.
//!
//! ## Features
//!
//! - Presence datagram decoding for recorders (NVR) and cameras
//! - SNTP client with a rolling offset history
//! - Time-gated device registry with max-age eviction
//! - Scheduled hand-off of the camera roster to a consumer
//!
//! ## Example
//!
//! ```rust,no_run
//! use twilight::{Controller, PresenceListener, RunSchedule, TwilightConfig};
//!
//! # async fn example() -> Result<(), twilight::TwilightError> {
//! let config = TwilightConfig::default();
//! let listener = PresenceListener::bind(&config.discovery).await?;
//! let controller = Controller::system(config);
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! controller.run_receiver(listener, shutdown_rx).await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Controller**: `Controller` - state machine tying clock health to the registry
//! - **Services**: `SyncedClock`, `DeviceRegistry`, `PresenceListener`
//! - **Low-level**: protocol modules - presence and SNTP wire formats

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// State management
pub mod state;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

/// Synchronized clock
pub mod clock;
/// Agent state machine and loops
pub mod controller;
/// Presence listener and device registry
pub mod discovery;
/// Wire formats
pub mod protocol;

// Re-exports
pub use clock::{LocalClock, OffsetProbe, SyncedClock, SystemClock, UdpProbe};
pub use controller::{Controller, Roster, RosterConsumer, RunSchedule};
pub use discovery::{DeviceRegistry, PresenceListener};
pub use error::{DecodeError, NotSynchronized, TwilightError};
pub use state::{ControllerEvent, ControllerState, ControllerStatus};
pub use types::{
    DeviceKind, DeviceRecord, DeviceSelector, NvrRecord, PresenceRecord, TwilightConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        Controller, ControllerEvent, ControllerState, DeviceKind, DeviceSelector, PresenceListener,
        PresenceRecord, Roster, RosterConsumer, RunSchedule, SyncedClock, TwilightConfig,
        TwilightError,
    };
}
