//! Offset probe with scripted outcomes.

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::clock::{LocalClock, OffsetProbe};
use crate::error::SyncError;
use crate::protocol::sntp::SntpSample;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Probe that answers from a queue of outcomes.
///
/// `Some(offset)` answers with that offset, `None` fails with a timeout. Once
/// the queue is empty the fallback outcome repeats. Servers marked
/// unreachable always time out without consuming the queue.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Option<f64>>>,
    fallback: Mutex<Option<f64>>,
    unreachable: Mutex<Vec<IpAddr>>,
    calls: Mutex<Vec<SocketAddr>>,
}

impl ScriptedProbe {
    /// Probe that always returns `fallback`
    #[must_use]
    pub fn new(fallback: Option<f64>) -> Self {
        Self {
            fallback: Mutex::new(fallback),
            ..Self::default()
        }
    }

    /// Probe that plays `script` and then returns `fallback`
    #[must_use]
    pub fn with_script(script: impl IntoIterator<Item = Option<f64>>, fallback: Option<f64>) -> Self {
        let probe = Self::new(fallback);
        lock(&probe.script).extend(script);
        probe
    }

    /// Queue one more outcome
    pub fn push(&self, outcome: Option<f64>) {
        lock(&self.script).push_back(outcome);
    }

    /// Replace the outcome used once the queue is empty
    pub fn set_fallback(&self, outcome: Option<f64>) {
        *lock(&self.fallback) = outcome;
    }

    /// Make every exchange with `host` time out
    pub fn set_unreachable(&self, host: IpAddr) {
        lock(&self.unreachable).push(host);
    }

    /// Servers contacted so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<SocketAddr> {
        lock(&self.calls).clone()
    }

    /// Number of exchanges attempted
    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl OffsetProbe for ScriptedProbe {
    async fn exchange(
        &self,
        server: SocketAddr,
        _local: &dyn LocalClock,
    ) -> Result<SntpSample, SyncError> {
        lock(&self.calls).push(server);

        let timeout = SyncError::Timeout {
            duration: Duration::from_secs(5),
        };
        if lock(&self.unreachable).contains(&server.ip()) {
            return Err(timeout);
        }

        let outcome = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| *lock(&self.fallback));

        outcome
            .map(|offset_seconds| SntpSample {
                offset_seconds,
                delay_seconds: 0.002,
                stratum: 2,
            })
            .ok_or(timeout)
    }
}
