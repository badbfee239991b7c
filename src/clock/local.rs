//! The machine's own, untrusted, notion of time.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;

/// Source of local wall-clock readings and plain waits.
///
/// The synchronized clock never trusts the absolute value returned here; it
/// only adds the estimated server offset to it.
#[async_trait]
pub trait LocalClock: Send + Sync {
    /// Current local wall-clock reading
    fn now(&self) -> SystemTime;

    /// Wait for `duration` without consulting any time server
    async fn sleep(&self, duration: Duration);
}

/// The operating system clock, with waits on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl LocalClock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
