//! Core types: configuration and decoded presence records

mod config;
mod device;

#[cfg(test)]
mod tests;

pub use config::{
    ClockConfig, DiscoveryConfig, ScheduleConfig, TwilightConfig, TwilightConfigBuilder,
};
pub use device::{
    DeviceKind, DeviceRecord, DeviceSelector, NvrRecord, PresenceRecord, RecordHeader, Trailer,
    trailer_keys,
};
