use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;

use super::device::DeviceSelector;
use crate::error::TwilightError;

/// Presence listener settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// UDP port the appliances broadcast to (default: 5050)
    pub port: u16,

    /// How long one receive waits before counting as "no record" (default: 10 seconds)
    #[serde(with = "secs")]
    pub receive_timeout: Duration,

    /// Registry entries older than this are evicted (default: 128 seconds)
    #[serde(with = "secs")]
    pub max_age: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: 5050,
            receive_timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(128),
        }
    }
}

/// Synchronized clock settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// SNTP port on the recorder (default: 123)
    pub server_port: u16,

    /// Timeout for one request/response exchange (default: 5 seconds)
    #[serde(with = "secs")]
    pub server_timeout: Duration,

    /// Number of offset samples kept, including failed ones (default: 8)
    pub offset_history: usize,

    /// Minimum spacing between sync attempts (default: 64 seconds)
    #[serde(with = "secs")]
    pub max_sync_age: Duration,

    /// Tick used by synchronized sleeps (default: 1 second)
    #[serde(with = "secs")]
    pub sleep_resolution: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            server_port: crate::protocol::sntp::NTP_PORT,
            server_timeout: Duration::from_secs(5),
            offset_history: 8,
            max_sync_age: Duration::from_secs(64),
            sleep_resolution: Duration::from_secs(1),
        }
    }
}

/// When the roster consumer runs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// UTC time of day of the first run, as `HH:MM[:SS]` (default: 00:00:00)
    #[serde(with = "time_of_day")]
    pub start_time: NaiveTime,

    /// Interval between runs (default: 1 hour)
    #[serde(with = "secs")]
    pub repeat: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start_time: NaiveTime::MIN,
            repeat: Duration::from_secs(3600),
        }
    }
}

/// Configuration for the agent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TwilightConfig {
    /// Presence listener
    pub discovery: DiscoveryConfig,
    /// Synchronized clock
    pub clock: ClockConfig,
    /// Consumer schedule
    pub schedule: ScheduleConfig,
    /// Cameras the downstream consumer is responsible for
    pub devices: Vec<DeviceSelector>,
}

impl TwilightConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> TwilightConfigBuilder {
        TwilightConfigBuilder::default()
    }

    /// Parse and validate a JSON document
    ///
    /// # Errors
    ///
    /// Returns `TwilightError::Config` if the document is malformed, or
    /// `TwilightError::InvalidParameter` if a value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self, TwilightError> {
        let config: Self = serde_json::from_str(json).map_err(|e| TwilightError::Config {
            message: format!("invalid configuration: {e}"),
            source: Some(Box::new(e)),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    ///
    /// # Errors
    ///
    /// Returns `TwilightError::Config` if the file cannot be read or parsed, or
    /// `TwilightError::InvalidParameter` if a value is out of range.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TwilightError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| TwilightError::Config {
            message: format!("cannot read {}: {e}", path.display()),
            source: Some(Box::new(e)),
        })?;
        Self::from_json_str(&json)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `TwilightError::InvalidParameter` naming the first bad value.
    pub fn validate(&self) -> Result<(), TwilightError> {
        if self.clock.offset_history == 0 {
            return Err(invalid("clock.offset_history", "must be at least 1"));
        }
        if self.clock.sleep_resolution.is_zero() {
            return Err(invalid("clock.sleep_resolution", "must be positive"));
        }
        if self.schedule.repeat.is_zero() {
            return Err(invalid("schedule.repeat", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(name: &str, message: &str) -> TwilightError {
    TwilightError::InvalidParameter {
        name: name.to_string(),
        message: message.to_string(),
    }
}

/// Builder for `TwilightConfig`
#[derive(Debug, Clone, Default)]
pub struct TwilightConfigBuilder {
    config: TwilightConfig,
}

impl TwilightConfigBuilder {
    /// Set the presence listener port
    #[must_use]
    pub fn discovery_port(mut self, port: u16) -> Self {
        self.config.discovery.port = port;
        self
    }

    /// Set the presence receive timeout
    #[must_use]
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.config.discovery.receive_timeout = timeout;
        self
    }

    /// Set the registry max age
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.discovery.max_age = max_age;
        self
    }

    /// Set the SNTP server port
    #[must_use]
    pub fn server_port(mut self, port: u16) -> Self {
        self.config.clock.server_port = port;
        self
    }

    /// Set the SNTP exchange timeout
    #[must_use]
    pub fn server_timeout(mut self, timeout: Duration) -> Self {
        self.config.clock.server_timeout = timeout;
        self
    }

    /// Set the offset history size
    #[must_use]
    pub fn offset_history(mut self, size: usize) -> Self {
        self.config.clock.offset_history = size;
        self
    }

    /// Set the minimum spacing between sync attempts
    #[must_use]
    pub fn max_sync_age(mut self, age: Duration) -> Self {
        self.config.clock.max_sync_age = age;
        self
    }

    /// Set the synchronized sleep tick
    #[must_use]
    pub fn sleep_resolution(mut self, resolution: Duration) -> Self {
        self.config.clock.sleep_resolution = resolution;
        self
    }

    /// Set the consumer's first run time of each UTC day
    #[must_use]
    pub fn start_time(mut self, start_time: NaiveTime) -> Self {
        self.config.schedule.start_time = start_time;
        self
    }

    /// Set the consumer's repeat interval
    #[must_use]
    pub fn repeat(mut self, repeat: Duration) -> Self {
        self.config.schedule.repeat = repeat;
        self
    }

    /// Add a device selector
    #[must_use]
    pub fn device(mut self, selector: DeviceSelector) -> Self {
        self.config.devices.push(selector);
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> TwilightConfig {
        self.config
    }
}

/// Durations as (fractional) seconds
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// `HH:MM` or `HH:MM:SS`
mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer};

    const FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FORMATS
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(s.trim(), format).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {s:?}")))
    }
}
