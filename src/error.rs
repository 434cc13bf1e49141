//! Error types for the realtime client.

use thiserror::Error;

/// Errors that can occur when using the realtime client.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// The connector could not produce a transport (endpoint unreachable,
    /// handshake refused, transport capability unavailable).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Failed to serialize or deserialize a wire frame.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A connection attempt did not complete within the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// A pending `connect()` was superseded by `disconnect()` or `destroy()`
    /// before it settled.
    #[error("connection attempt aborted")]
    ConnectAborted,

    /// The client has been destroyed and can no longer connect.
    #[error("client destroyed")]
    Destroyed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for realtime client operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;
