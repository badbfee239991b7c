//! Passive discovery of announcing appliances
//!
//! [`PresenceListener`] receives the raw broadcasts and [`DeviceRegistry`]
//! keeps the decoded records with their last-seen time.

mod listener;
mod registry;


pub use listener::PresenceListener;
pub use registry::{DeviceRegistry, RegistryEntry};
