//! Event names and lifecycle payloads.
//!
//! Server-pushed events are addressed by [`EventName`]: a closed set of
//! names the grading backend is known to emit plus an [`EventName::Other`]
//! bucket for anything else. Lifecycle notifications (connect, disconnect,
//! error, reconnect scheduling) are delivered to dedicated observer lists
//! with the typed payloads defined here.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

/// Name of a server-pushed event.
///
/// Conversions from strings normalize known names, so
/// `EventName::from("grading_progress")` and [`EventName::GradingProgress`]
/// address the same handler list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Incremental progress of a grading session.
    GradingProgress,
    /// A grading session finished.
    GradingComplete,
    /// A grading session failed.
    GradingError,
    /// Free-form notification for the current user.
    Notification,
    /// Any other server-defined event name.
    Other(String),
}

impl EventName {
    /// The wire name of this event.
    pub fn as_str(&self) -> &str {
        match self {
            Self::GradingProgress => "grading_progress",
            Self::GradingComplete => "grading_complete",
            Self::GradingError => "grading_error",
            Self::Notification => "notification",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "grading_progress" => Self::GradingProgress,
            "grading_complete" => Self::GradingComplete,
            "grading_error" => Self::GradingError,
            "notification" => Self::Notification,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<&EventName> for EventName {
    fn from(name: &EventName) -> Self {
        name.clone()
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Lifecycle payloads ──────────────────────────────────────────────

/// Delivered to `on_connect` observers on every transition into Connected.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectInfo {
    /// Client-side id of this connection.
    pub session_id: Uuid,
    /// Unix milliseconds.
    pub timestamp: u64,
    /// `true` when this connection replaced a lost one.
    pub is_reconnection: bool,
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The consumer called `disconnect()` or `destroy()`. Never reconnects.
    ClientDisconnect,
    /// The server closed the connection cleanly.
    ServerClosed,
    /// The transport failed while sending or receiving.
    TransportError(String),
}

impl DisconnectReason {
    /// Whether this disconnect was requested locally.
    pub fn is_deliberate(&self) -> bool {
        matches!(self, Self::ClientDisconnect)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientDisconnect => f.write_str("client disconnect"),
            Self::ServerClosed => f.write_str("server closed connection"),
            Self::TransportError(detail) => write!(f, "transport error: {detail}"),
        }
    }
}

/// Delivered to `on_disconnect` observers.
#[derive(Debug, Clone, Serialize)]
pub struct DisconnectInfo {
    pub reason: DisconnectReason,
    /// Unix milliseconds.
    pub timestamp: u64,
    /// `false` when the client was merely connecting or waiting to reconnect.
    pub was_connected: bool,
}

/// Delivered to `on_error` observers for connection and transport errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    /// Unix milliseconds.
    pub timestamp: u64,
}

/// Delivered to `on_reconnect` observers before the reconnection timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconnectScheduled {
    /// 1-based attempt number.
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}
