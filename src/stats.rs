//! Connection statistics. Observational only; no control decision reads them.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Running counters kept by the client.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub total_connections: u64,
    pub total_disconnections: u64,
    pub total_reconnections: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors: u64,
    /// Unix milliseconds of the most recent successful connection.
    pub connect_time: Option<u64>,
    /// Monotonic start of the current connection, cleared when it ends.
    pub connected_since: Option<Instant>,
}

impl Statistics {
    pub fn record_connected(&mut self, unix_millis: u64, now: Instant, is_reconnection: bool) {
        self.total_connections += 1;
        if is_reconnection {
            self.total_reconnections += 1;
        }
        self.connect_time = Some(unix_millis);
        self.connected_since = Some(now);
    }

    pub fn record_disconnected(&mut self) {
        self.total_disconnections += 1;
        self.connected_since = None;
    }

    /// Time spent in the current connection, zero while offline.
    pub fn uptime(&self, now: Instant) -> Duration {
        self.connected_since
            .map_or(Duration::ZERO, |since| now.saturating_duration_since(since))
    }
}

/// Snapshot returned by `RealtimeClient::stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    pub connect_time: Option<u64>,
    pub total_connections: u64,
    pub total_disconnections: u64,
    pub total_reconnections: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors: u64,
    pub uptime: Duration,
    pub latency: Option<Duration>,
    pub queue_size: usize,
    pub room_count: usize,
}
