//! Offset-corrected wall clock.

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::OWN_EPOCH;
use super::local::{LocalClock, SystemClock};
use super::probe::{OffsetProbe, UdpProbe};
use crate::error::NotSynchronized;
use crate::protocol::sntp::{ERA_SECONDS, NtpTimestamp};
use crate::types::ClockConfig;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Mutable part of the clock, guarded by one lock
#[derive(Debug)]
struct ClockInner {
    /// Bound time server
    source: Option<IpAddr>,
    /// Local reading at the last sync attempt
    last_refresh: SystemTime,
    /// Offsets in seconds, newest first; `None` marks a failed attempt.
    /// Always exactly `offset_history` long.
    history: VecDeque<Option<f64>>,
}

impl ClockInner {
    fn new(source: Option<IpAddr>, size: usize) -> Self {
        Self {
            source,
            last_refresh: NtpTimestamp::epoch(),
            history: std::iter::repeat_n(None, size).collect(),
        }
    }

    fn push(&mut self, sample: Option<f64>) {
        self.history.pop_back();
        self.history.push_front(sample);
    }

    fn present(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().filter_map(|s| *s)
    }

    fn valid_count(&self) -> usize {
        self.present().count()
    }

    fn is_valid(&self) -> bool {
        self.history.iter().any(Option::is_some)
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean_offset(&self) -> Option<f64> {
        let count = self.valid_count();
        (count > 0).then(|| self.present().sum::<f64>() / count as f64)
    }
}

/// Wall clock corrected by the mean of recent SNTP offsets.
///
/// The clock is bound to at most one time server. Every query first gives the
/// clock a chance to resynchronize (at most once per `max_sync_age`); a failed
/// exchange pushes an empty slot, so validity survives `offset_history - 1`
/// consecutive failures.
///
/// Internal state sits behind a short-held lock that is never held across the
/// network exchange. A sync attempt is claimed by stamping `last_refresh`
/// before the exchange starts, so concurrent callers never sync twice and
/// readers never wait on the network.
pub struct SyncedClock {
    config: ClockConfig,
    probe: Arc<dyn OffsetProbe>,
    local: Arc<dyn LocalClock>,
    inner: Mutex<ClockInner>,
}

impl std::fmt::Debug for SyncedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedClock")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SyncedClock {
    /// Create an unbound clock
    #[must_use]
    pub fn new(config: ClockConfig, probe: Arc<dyn OffsetProbe>, local: Arc<dyn LocalClock>) -> Self {
        let size = config.offset_history.max(1);
        Self {
            config,
            probe,
            local,
            inner: Mutex::new(ClockInner::new(None, size)),
        }
    }

    /// Clock using the system time and SNTP over UDP
    #[must_use]
    pub fn system(config: ClockConfig) -> Self {
        let probe = Arc::new(UdpProbe::new(config.server_timeout));
        Self::new(config, probe, Arc::new(SystemClock))
    }

    /// Clock configuration
    #[must_use]
    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Local clock the offsets are applied to
    #[must_use]
    pub fn local(&self) -> &Arc<dyn LocalClock> {
        &self.local
    }

    /// Bind to `source`.
    ///
    /// A new source resets the history and syncs immediately; if that yields
    /// no valid sample the clock is left unbound. Binding the current source
    /// again keeps the history. Returns whether the clock is bound and valid.
    pub async fn bind(&self, source: IpAddr) -> bool {
        let rebinding = {
            let mut inner = self.lock();
            let rebinding = inner.source == Some(source);
            if !rebinding {
                *inner = ClockInner::new(Some(source), self.history_size());
                inner.last_refresh = self.local.now();
            }
            rebinding
        };
        if rebinding {
            return self.is_valid().await;
        }

        self.exchange(source).await;

        let mut inner = self.lock();
        if inner.source != Some(source) {
            return false;
        }
        if inner.is_valid() {
            tracing::info!(%source, "Bound to time server");
            return true;
        }

        tracing::warn!(%source, "Time server gave no usable sample, unbinding");
        *inner = ClockInner::new(None, self.history_size());
        false
    }

    /// Resync if bound and the last attempt is older than `max_sync_age`
    pub async fn try_sync(&self) {
        if let Some(server) = self.claim_sync() {
            self.exchange(server).await;
        }
    }

    /// Resync if due, then report whether any sample is present
    pub async fn is_valid(&self) -> bool {
        self.try_sync().await;
        self.lock().is_valid()
    }

    /// Synchronized wall-clock time, resyncing first if due.
    ///
    /// # Errors
    ///
    /// Returns `NotSynchronized` if no valid sample is present.
    pub async fn now(&self) -> Result<SystemTime, NotSynchronized> {
        self.try_sync().await;
        self.estimate()
    }

    /// Synchronized wall-clock time from the current history, without
    /// attempting a resync. Never waits on the network.
    ///
    /// # Errors
    ///
    /// Returns `NotSynchronized` if no valid sample is present.
    pub fn estimate(&self) -> Result<SystemTime, NotSynchronized> {
        let inner = self.lock();
        let not_synchronized = NotSynchronized {
            server: inner.source,
        };
        let offset = inner.mean_offset().ok_or(not_synchronized)?;
        corrected(self.local.now(), offset).ok_or(not_synchronized)
    }

    /// Bound time server
    #[must_use]
    pub fn source(&self) -> Option<IpAddr> {
        self.lock().source
    }

    /// Offset history, newest first
    #[must_use]
    pub fn history(&self) -> Vec<Option<f64>> {
        self.lock().history.iter().copied().collect()
    }

    /// Number of present samples
    #[must_use]
    pub fn valid_samples(&self) -> usize {
        self.lock().valid_count()
    }

    /// Mean of present samples, in seconds
    #[must_use]
    pub fn mean_offset(&self) -> Option<f64> {
        self.lock().mean_offset()
    }

    /// Wait until `duration` has elapsed on the synchronized clock.
    ///
    /// Polls every `resolution` (or the configured default). Without a valid
    /// clock this is a plain local wait; if synchronization is lost midway the
    /// remaining estimated time is waited out locally.
    pub async fn sleep_until_elapsed(&self, duration: Duration, resolution: Option<Duration>) {
        let resolution = resolution.unwrap_or(self.config.sleep_resolution);

        let target = match self.now().await {
            Ok(now) => now + duration,
            Err(_) => {
                self.local.sleep(duration).await;
                return;
            }
        };

        let mut remaining = duration;
        loop {
            match self.now().await {
                Ok(now) if now < target => {
                    self.local.sleep(resolution).await;
                    remaining = remaining.saturating_sub(resolution);
                }
                Ok(_) => return,
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        remaining = ?remaining,
                        "Lost synchronization during sleep, finishing on local clock"
                    );
                    self.local.sleep(remaining).await;
                    return;
                }
            }
        }
    }

    /// One exchange with `server`, run without holding the lock; the outcome
    /// is recorded only if the clock is still bound to `server`.
    async fn exchange(&self, server: IpAddr) {
        let addr = SocketAddr::new(server, self.config.server_port);
        let result = self.probe.exchange(addr, self.local.as_ref()).await;

        let mut inner = self.lock();
        if inner.source != Some(server) {
            tracing::debug!(%server, "Time server changed during exchange, dropping sample");
            return;
        }
        match result {
            Ok(sample) => {
                inner.push(Some(sample.offset_seconds));
                tracing::info!(
                    %server,
                    offset = sample.offset_seconds,
                    delay = sample.delay_seconds,
                    stratum = sample.stratum,
                    valid = inner.valid_count(),
                    "New SNTP offset"
                );
            }
            Err(e) => {
                inner.push(None);
                tracing::warn!(%server, error = %e, valid = inner.valid_count(), "SNTP exchange failed");
            }
        }
    }

    fn history_size(&self) -> usize {
        self.config.offset_history.max(1)
    }

    fn lock(&self) -> MutexGuard<'_, ClockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp `last_refresh` and return the server if a sync is due.
    ///
    /// A local clock that went backwards past `last_refresh` counts as due.
    fn claim_sync(&self) -> Option<IpAddr> {
        let mut inner = self.lock();
        let server = inner.source?;

        let local_now = self.local.now();
        if let Ok(age) = local_now.duration_since(inner.last_refresh) {
            if age <= self.config.max_sync_age {
                return None;
            }
        }
        inner.last_refresh = local_now;
        Some(server)
    }
}

/// `local + offset`, moved forward by whole eras until it is not before
/// [`OWN_EPOCH`]
#[allow(clippy::cast_possible_truncation)]
fn corrected(local: SystemTime, offset_seconds: f64) -> Option<SystemTime> {
    let local_nanos = match local.duration_since(UNIX_EPOCH) {
        Ok(d) => i128::try_from(d.as_nanos()).ok()?,
        Err(e) => -i128::try_from(e.duration().as_nanos()).ok()?,
    };
    let offset_nanos = (offset_seconds * 1e9).round() as i128;
    let own_epoch_nanos = i128::try_from(OWN_EPOCH.as_nanos()).ok()?;
    let era_nanos = i128::from(ERA_SECONDS) * NANOS_PER_SEC;

    let mut nanos = local_nanos + offset_nanos;
    if nanos < own_epoch_nanos {
        let eras = (own_epoch_nanos - nanos + era_nanos - 1) / era_nanos;
        nanos += eras * era_nanos;
    }

    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    let subsec = u32::try_from(nanos % NANOS_PER_SEC).ok()?;
    UNIX_EPOCH.checked_add(Duration::new(secs, subsec))
}
