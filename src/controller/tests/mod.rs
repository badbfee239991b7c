mod state_machine;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::clock::{SyncedClock, own_epoch};
use crate::controller::Controller;
use crate::testing::packets::{device_record, nvr_record};
use crate::testing::{ManualClock, ScriptedProbe};
use crate::types::{PresenceRecord, Trailer, TwilightConfig};

const RECORDER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 108));

struct Harness {
    controller: Controller,
    probe: Arc<ScriptedProbe>,
    local: Arc<ManualClock>,
}

/// Midnight UTC, ten days after the application epoch
fn start() -> SystemTime {
    own_epoch() + Duration::from_secs(10 * 86_400)
}

/// [`start`] as a calendar time
fn start_utc() -> DateTime<Utc> {
    start().into()
}

fn harness(history: usize, probe: ScriptedProbe) -> Harness {
    let config = TwilightConfig::builder()
        .offset_history(history)
        .max_sync_age(Duration::from_secs(64))
        .max_age(Duration::from_secs(128))
        .sleep_resolution(Duration::from_secs(1))
        .build();
    let probe = Arc::new(probe);
    let local = Arc::new(ManualClock::new(start()));
    let clock = Arc::new(SyncedClock::new(config.clock.clone(), probe.clone(), local.clone()));
    Harness {
        controller: Controller::new(config, clock),
        probe,
        local,
    }
}

fn recorder() -> PresenceRecord {
    nvr_record(SocketAddr::new(RECORDER, 37810))
}

fn camera(last: u8, hostname: &str) -> PresenceRecord {
    device_record(
        SocketAddr::from(([192, 168, 1, last], 37810)),
        hostname,
        "3c:ef:8c:01:02:03",
        Trailer::new(),
    )
}
