//! Last-seen table of announcing devices.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use crate::types::{DeviceKind, PresenceRecord};

/// A record and when it was last heard, on the synchronized clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Synchronized time of the latest announcement
    pub last_seen: SystemTime,
    /// The latest announcement
    pub record: PresenceRecord,
}

/// In-memory table of live devices keyed by originating host.
///
/// Not synchronized; the controller guards it together with the clock
/// validity check.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    entries: HashMap<IpAddr, RegistryEntry>,
}

impl DeviceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an announcement from `host`, replacing any previous entry.
    ///
    /// Returns the replaced entry.
    pub fn register(
        &mut self,
        host: IpAddr,
        record: PresenceRecord,
        now: SystemTime,
    ) -> Option<RegistryEntry> {
        self.entries.insert(
            host,
            RegistryEntry {
                last_seen: now,
                record,
            },
        )
    }

    /// Remove every entry last seen more than `max_age` before `now`.
    ///
    /// Entries seen after `now` are kept. Returns the evicted hosts.
    pub fn evict_older_than(&mut self, max_age: Duration, now: SystemTime) -> Vec<IpAddr> {
        let mut evicted = Vec::new();
        self.entries.retain(|host, entry| {
            let expired = now
                .duration_since(entry.last_seen)
                .is_ok_and(|age| age > max_age);
            if expired {
                evicted.push(*host);
            }
            !expired
        });
        evicted
    }

    /// Point-in-time copy of the records of one kind
    #[must_use]
    pub fn snapshot_by_kind(&self, kind: DeviceKind) -> Vec<PresenceRecord> {
        self.entries
            .values()
            .filter(|e| e.record.kind() == kind)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Drop every entry, returning how many there were
    pub fn reset(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Entry for `host`
    #[must_use]
    pub fn get(&self, host: &IpAddr) -> Option<&RegistryEntry> {
        self.entries.get(host)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
