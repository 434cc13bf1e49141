//! # Realtime Client
//!
//! Resilient, transport-agnostic client for a real-time event server.
//!
//! The client keeps one logical connection alive across network failures:
//! it reconnects with exponential backoff, replays room subscriptions and
//! events emitted while offline, measures latency with a periodic heartbeat,
//! and routes server-pushed events to registered handlers.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend
//! - **Self-healing**: bounded exponential backoff after unexpected drops
//! - **Offline-tolerant**: rooms and emits made while offline are replayed on connect
//! - **WebSocket built-in**: default `transport-websocket` feature provides [`WebSocketConnector`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), realtime_client::RealtimeError> {
//! use realtime_client::{RealtimeClient, RealtimeConfig, WebSocketConnector};
//!
//! let config = RealtimeConfig::new("ws://localhost:8000/ws").with_auto_connect(false);
//! let client = RealtimeClient::new(config, WebSocketConnector::new());
//!
//! client.subscribe_to_progress("session-42", |payload| {
//!     println!("progress: {payload}");
//! });
//! client.connect().await?;
//! client.emit("notification", serde_json::json!({"text": "hello"}));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod clock;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod protocol;
pub mod queue;
pub mod reconnect;
pub mod rooms;
pub mod router;
pub mod stats;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{ClientSnapshot, ConnectionState, RealtimeClient, RealtimeConfig};
pub use clock::{Clock, SystemClock};
pub use error::RealtimeError;
pub use event::{
    ConnectInfo, DisconnectInfo, DisconnectReason, ErrorInfo, EventName, ReconnectScheduled,
};
pub use protocol::{ClientFrame, ServerFrame};
pub use router::HandlerId;
pub use stats::ClientStats;
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
