//! Rate gate: the single point every mutation call passes through.
//!
//! The gate spaces call *starts* at least `min_interval` apart and admits
//! one caller at a time. A caller holds its [`GatePermit`] for the duration
//! of the call, so there is never more than one mutation in flight even when
//! several tasks share the gate. API latency counts toward the interval:
//! a call slower than the floor lets the next one start immediately.
//!
//! Time comes from `tokio::time`, so tests drive the gate with a paused
//! clock instead of real sleeps.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::trace;

pub struct RateGate {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

/// Exclusive right to issue one call. Dropping it admits the next caller.
pub struct GatePermit<'a> {
    _guard: MutexGuard<'a, Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    /// Gate admitting at most `calls_per_second` call starts per second.
    pub fn per_second(calls_per_second: u32) -> Self {
        Self::new(Duration::from_secs(1) / calls_per_second.max(1))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the gate. Waits at most one interval once the previous
    /// holder has released it.
    pub async fn acquire(&self) -> GatePermit<'_> {
        let mut last_start = self.last_start.lock().await;

        if let Some(prev) = *last_start {
            let ready_at = prev + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                trace!(wait_ms = (ready_at - now).as_millis() as u64, "rate gate waiting");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last_start = Some(Instant::now());
        GatePermit {
            _guard: last_start,
        }
    }
}
