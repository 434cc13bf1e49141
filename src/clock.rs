//! Time source used for latency, uptime and event timestamps.
//!
//! Timers themselves run on the tokio time driver, so tests can pause and
//! advance virtual time. [`Clock`] covers the remaining reads of "now".

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Source of monotonic instants and wall-clock timestamps.
pub trait Clock: Send + Sync + 'static {
    /// Monotonic now, used for latency and uptime.
    fn now(&self) -> Instant;

    /// Wall-clock unix milliseconds, used in lifecycle payloads and pings.
    fn unix_millis(&self) -> u64;
}

/// Default clock: tokio's `Instant` and the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}
