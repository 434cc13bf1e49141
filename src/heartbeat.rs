//! Latency probe for the live connection.
//!
//! Purely observational: a missing pong never forces a disconnect, the
//! transport's own liveness detection is trusted for that. The monitor is
//! active exactly while the client is Connected; the connection driver owns
//! the interval timer and consults [`HeartbeatMonitor::is_active`] before
//! every ping.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    active: bool,
    last_ping: Option<Instant>,
    latency: Option<Duration>,
}

impl HeartbeatMonitor {
    /// Intervals below one millisecond are clamped (tokio rejects zero periods).
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            active: false,
            last_ping: None,
            latency: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn start(&mut self) {
        self.active = true;
        self.last_ping = None;
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.last_ping = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn record_ping(&mut self, at: Instant) {
        self.last_ping = Some(at);
    }

    /// Compute latency from the outstanding ping. Pongs with no ping in
    /// flight are ignored.
    pub fn record_pong(&mut self, at: Instant) -> Option<Duration> {
        let sent = self.last_ping.take()?;
        let latency = at.saturating_duration_since(sent);
        self.latency = Some(latency);
        Some(latency)
    }

    /// Most recent measured round trip.
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}
