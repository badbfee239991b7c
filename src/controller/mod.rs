//! The agent's core: ties clock health to the device registry.
//!
//! A receive loop feeds every presence datagram (or receive timeout) through
//! [`Controller::step`]; a consumer loop periodically takes a validated
//! roster snapshot. Both share one [`Controller`] handle.
//!
//! ```text
//!                 NVR record, bind ok
//!  Uninitialized ------------------------> Running
//!        ^                                    |
//!        |  registry reset                    | clock invalid
//!        +------------- ClockLost <-----------+
//! ```

mod consumer;
mod schedule;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, watch};

pub use consumer::{Roster, RosterConsumer};
pub use schedule::RunSchedule;

use crate::clock::SyncedClock;
use crate::discovery::{DeviceRegistry, PresenceListener};
use crate::error::NotSynchronized;
use crate::protocol::presence;
use crate::state::{ControllerEvent, ControllerState, ControllerStatus, EventBus, StateContainer};
use crate::types::{DeviceKind, PresenceRecord, TwilightConfig};

/// State guarded by the controller lock. The phase and the registry are
/// only ever changed together with a clock validity reading taken under it.
#[derive(Debug, Default)]
struct Core {
    state: ControllerState,
    registry: DeviceRegistry,
}

struct Shared {
    config: TwilightConfig,
    clock: Arc<SyncedClock>,
    core: Mutex<Core>,
    status: StateContainer,
    events: EventBus,
}

/// Cloneable handle to the controller
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("clock", &self.shared.clock)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Create a controller around an existing clock
    #[must_use]
    pub fn new(config: TwilightConfig, clock: Arc<SyncedClock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                clock,
                core: Mutex::new(Core::default()),
                status: StateContainer::new(),
                events: EventBus::new(),
            }),
        }
    }

    /// Controller with a system-clock, UDP-backed synchronized clock
    #[must_use]
    pub fn system(config: TwilightConfig) -> Self {
        let clock = Arc::new(SyncedClock::system(config.clock.clone()));
        Self::new(config, clock)
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &TwilightConfig {
        &self.shared.config
    }

    /// The synchronized clock
    #[must_use]
    pub fn clock(&self) -> &Arc<SyncedClock> {
        &self.shared.clock
    }

    /// Event bus
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Current phase
    pub async fn state(&self) -> ControllerState {
        self.shared.core.lock().await.state
    }

    /// Current status summary
    pub async fn status(&self) -> ControllerStatus {
        self.shared.status.get().await
    }

    /// Watch status changes
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ControllerStatus> {
        self.shared.status.subscribe()
    }

    /// Whether the clock currently has a valid sample (may resync)
    pub async fn is_clock_valid(&self) -> bool {
        self.shared.clock.is_valid().await
    }

    /// Synchronized time (may resync)
    ///
    /// # Errors
    ///
    /// Returns `NotSynchronized` without a valid sample.
    pub async fn now(&self) -> Result<SystemTime, NotSynchronized> {
        self.shared.clock.now().await
    }

    /// Registered records of one kind.
    ///
    /// Empty unless the controller is running and the clock is valid.
    pub async fn snapshot_by_kind(&self, kind: DeviceKind) -> Vec<PresenceRecord> {
        self.shared.clock.try_sync().await;

        let core = self.shared.core.lock().await;
        if core.state != ControllerState::Running || self.shared.clock.estimate().is_err() {
            return Vec::new();
        }
        core.registry.snapshot_by_kind(kind)
    }

    /// Number of registered records
    pub async fn registry_len(&self) -> usize {
        self.shared.core.lock().await.registry.len()
    }

    /// Decode one datagram and drive the state machine with it.
    ///
    /// An undecodable datagram drives the machine as if nothing was received.
    pub async fn handle_datagram(&self, payload: &[u8], source: SocketAddr) -> ControllerState {
        let record = match presence::decode(payload, source) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::debug!(%source, %error, "Dropping presence datagram");
                self.shared
                    .events
                    .emit(ControllerEvent::DecodeFailed { source, error });
                None
            }
        };
        self.step(record).await
    }

    /// Drive the state machine once; `None` means the receive timed out.
    ///
    /// Returns the phase after the step.
    pub async fn step(&self, record: Option<PresenceRecord>) -> ControllerState {
        let state = self.state().await;
        match state {
            ControllerState::Uninitialized => self.step_uninitialized(record).await,
            ControllerState::Running => self.step_running(record).await,
            ControllerState::ClockLost => self.recover_clock_lost().await,
        }
    }

    async fn step_uninitialized(&self, record: Option<PresenceRecord>) -> ControllerState {
        let Some(PresenceRecord::Nvr(nvr)) = record else {
            return ControllerState::Uninitialized;
        };
        let source = nvr.source.ip();

        let clock = &self.shared.clock;
        if !clock.bind(source).await || !clock.is_valid().await {
            tracing::debug!(%source, "Recorder did not provide a usable clock");
            return ControllerState::Uninitialized;
        }

        let mut core = self.shared.core.lock().await;
        core.state = ControllerState::Running;
        let registered = core.registry.len();
        drop(core);

        tracing::info!(%source, "Clock is initialized");
        self.shared
            .status
            .update(|s| {
                s.state = ControllerState::Running;
                s.time_source = Some(source);
                s.registered = registered;
            })
            .await;
        self.shared
            .events
            .emit(ControllerEvent::ClockAcquired { source });
        self.emit_transition(ControllerState::Uninitialized, ControllerState::Running);
        ControllerState::Running
    }

    async fn step_running(&self, record: Option<PresenceRecord>) -> ControllerState {
        let clock = &self.shared.clock;
        clock.try_sync().await;

        let mut core = self.shared.core.lock().await;
        let now = match clock.estimate() {
            Ok(now) => now,
            Err(NotSynchronized { server }) => {
                core.state = ControllerState::ClockLost;
                drop(core);

                tracing::warn!(server = ?server, "Clock lost");
                self.shared.status.set_state(ControllerState::ClockLost).await;
                self.shared
                    .events
                    .emit(ControllerEvent::ClockLost { source: server });
                self.emit_transition(ControllerState::Running, ControllerState::ClockLost);
                return self.recover_clock_lost().await;
            }
        };

        if let Some(record) = record {
            let host = record.host();
            let kind = record.kind();
            let hostname = record.hostname();
            core.registry.register(host, record, now);
            tracing::debug!(%host, %hostname, %kind, "Gossip");
            self.shared.events.emit(ControllerEvent::DeviceRegistered {
                host,
                kind,
                hostname,
            });
        }

        let evicted = core
            .registry
            .evict_older_than(self.shared.config.discovery.max_age, now);
        let registered = core.registry.len();
        drop(core);

        if !evicted.is_empty() {
            tracing::info!(hosts = ?evicted, "Evicted stale devices");
            self.shared
                .events
                .emit(ControllerEvent::DevicesEvicted { hosts: evicted });
        }
        self.shared.status.update(|s| s.registered = registered).await;
        ControllerState::Running
    }

    async fn recover_clock_lost(&self) -> ControllerState {
        let mut core = self.shared.core.lock().await;
        let cleared = core.registry.reset();
        core.state = ControllerState::Uninitialized;
        drop(core);

        tracing::info!(cleared, "Registry reset, waiting for a recorder");
        self.shared
            .status
            .update(|s| {
                s.state = ControllerState::Uninitialized;
                s.time_source = None;
                s.registered = 0;
                s.resets += 1;
            })
            .await;
        self.shared
            .events
            .emit(ControllerEvent::RegistryReset { cleared });
        self.emit_transition(ControllerState::ClockLost, ControllerState::Uninitialized);
        ControllerState::Uninitialized
    }

    fn emit_transition(&self, old: ControllerState, new: ControllerState) {
        tracing::debug!(%old, %new, "State transition");
        self.shared
            .events
            .emit(ControllerEvent::StateChanged { old, new });
    }

    /// Receive loop: one step per datagram or receive timeout, until
    /// `shutdown` turns true or its sender is dropped.
    pub async fn run_receiver(&self, mut listener: PresenceListener, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Receive loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                received = listener.recv() => received,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match received {
                Ok(Some((payload, source))) => {
                    self.handle_datagram(&payload, source).await;
                }
                Ok(None) => {
                    self.step(None).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Presence receive failed");
                    self.step(None).await;
                    let timeout = self.shared.config.discovery.receive_timeout;
                    let pause = self.shared.clock.local().sleep(timeout);
                    tokio::select! {
                        () = pause => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
        tracing::info!("Receive loop stopped");
    }

    /// Consumer loop: hand the camera roster to `consumer` on `schedule`,
    /// until `shutdown` turns true or its sender is dropped.
    ///
    /// Waits use the synchronized clock one sleep-resolution tick at a time;
    /// shutdown is checked between ticks.
    pub async fn run_consumer<C>(&self, consumer: &C, schedule: RunSchedule, shutdown: watch::Receiver<bool>)
    where
        C: RosterConsumer + ?Sized,
    {
        let clock = &self.shared.clock;
        let tick = self.shared.config.clock.sleep_resolution;
        let mut next_run: Option<DateTime<Utc>> = None;
        let mut last_run: Option<DateTime<Utc>> = None;

        tracing::info!("Waiting for a recorder to provide the clock");
        loop {
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            let now: DateTime<Utc> = match clock.now().await {
                Ok(now) => now.into(),
                Err(_) => {
                    clock.local().sleep(tick).await;
                    continue;
                }
            };

            let next = *next_run.get_or_insert_with(|| {
                let after = last_run.map_or(now, |last| now.max(last + TimeDelta::nanoseconds(1)));
                let next = schedule.next_run_after(after);
                tracing::info!(next_run = %next, "Next run scheduled");
                next
            });

            if next > now {
                clock.sleep_until_elapsed(tick, None).await;
                continue;
            }
            next_run = None;
            last_run = Some(next);

            let devices = self.snapshot_by_kind(DeviceKind::Device).await;
            tracing::info!(devices = devices.len(), "Running roster consumer");
            self.shared.events.emit(ControllerEvent::RosterDispatched {
                devices: devices.len(),
            });
            consumer
                .consume(Roster {
                    taken_at: now,
                    devices,
                })
                .await;
        }
        tracing::info!("Consumer loop stopped");
    }
}
