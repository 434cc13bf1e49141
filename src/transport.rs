//! Transport abstraction for the realtime client.
//!
//! The [`Transport`] trait defines a bidirectional text frame channel between
//! the client and server. Frames are JSON text, so every transport
//! implementation must handle message framing internally (WebSocket frames,
//! length-prefixed TCP, in-process channels in tests).
//!
//! # Connection Setup
//!
//! Unlike a one-shot client, the realtime client has to open *new*
//! transports on its own whenever it reconnects. Connection setup therefore
//! lives in a second trait, [`Connector`], which turns a URL into a fresh
//! connected transport. The client owns exactly one transport at a time and
//! never hands the raw handle to anything else.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use realtime_client::error::RealtimeError;
//! use realtime_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), RealtimeError> {
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, RealtimeError>> {
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), RealtimeError> {
//!         todo!()
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, RealtimeError> {
//!         Ok(Box::new(MyTransport { /* dial `url` */ }))
//!     }
//! }
//! ```

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RealtimeError;
use crate::protocol::ClientFrame;

/// A bidirectional text message transport.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON frame.
/// Each call to [`recv`](Transport::recv) returns one complete JSON frame.
///
/// # Object Safety
///
/// This trait is object-safe; the client stores transports as
/// `Box<dyn Transport>` so a [`Connector`] may return any implementation.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is
/// used inside `tokio::select!`. If `recv` is cancelled before completion,
/// calling it again must not lose data. Channel-based implementations (e.g.
/// wrapping `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::TransportSend`] if the frame could not be sent.
    async fn send(&mut self, message: String) -> Result<(), RealtimeError>;

    /// Receive the next JSON text frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed cleanly by the server
    async fn recv(&mut self) -> Option<Result<String, RealtimeError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), RealtimeError>;
}

/// Opens new transports on demand.
///
/// Called once for the initial connection and again for every reconnection
/// attempt. A returned error counts as a connection error for that attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establish a new connected transport to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Connect`] (or any other variant) when the
    /// endpoint cannot be reached or the transport is unavailable.
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, RealtimeError>;
}

/// Send-only capability onto the live connection.
///
/// The room registry and message queue receive this instead of the transport
/// itself. Dropping the last `Outbox` tells the connection driver to close
/// its transport.
#[derive(Debug)]
pub(crate) struct Outbox {
    tx: mpsc::UnboundedSender<ClientFrame>,
}

impl Outbox {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<ClientFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Hand a frame to the connection driver. Returns `false` if the driver
    /// has already gone away.
    pub(crate) fn send(&self, frame: ClientFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}
