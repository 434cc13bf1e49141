//! WebSocket transport built on `tokio-tungstenite`.
//!
//! [`WebSocketConnector`] is the default [`Connector`]: every connection and
//! reconnection attempt dials a fresh [`WebSocketTransport`]. Both `ws://` and
//! `wss://` URLs are accepted; TLS is negotiated by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), realtime_client::RealtimeError> {
//! use realtime_client::{RealtimeClient, RealtimeConfig, WebSocketConnector};
//!
//! let config = RealtimeConfig::new("wss://grading.example.com/ws").with_auto_connect(false);
//! let client = RealtimeClient::new(config, WebSocketConnector::new());
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::RealtimeError;
use crate::transport::{Connector, Transport};

/// Stream type produced by `tokio_tungstenite::connect_async`.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// One WebSocket connection carrying JSON frames as text messages.
///
/// Control frames are left to tungstenite (it answers pings itself) and
/// binary messages are skipped. [`recv`](Transport::recv) only awaits the
/// stream's `next()`, so it is cancel-safe inside `tokio::select!`.
///
/// Use [`from_stream`](Self::from_stream) when the handshake needs custom
/// TLS, proxy or header setup.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Dial `url` (`ws://` or `wss://`) and complete the handshake.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::Io`] when the socket cannot be opened (the
    /// [`ErrorKind`](std::io::ErrorKind) is preserved), and
    /// [`RealtimeError::Connect`] when the URL is invalid or the server
    /// refuses the upgrade.
    pub async fn connect(url: &str) -> Result<Self, RealtimeError> {
        tracing::debug!(url = %url, "dialing websocket");

        let (stream, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| match e {
                    tokio_tungstenite::tungstenite::Error::Io(io) => RealtimeError::Io(io),
                    other => RealtimeError::Connect(other.to_string()),
                })?;

        tracing::info!(url = %url, "websocket handshake complete");
        Ok(Self::from_stream(stream))
    }

    /// Wrap a stream whose handshake has already been done.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), RealtimeError> {
        if self.closed {
            return Err(RealtimeError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| RealtimeError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, RealtimeError>> {
        while let Some(next) = self.stream.next().await {
            match next {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "websocket close frame");
                    return None;
                }
                Ok(Message::Binary(bytes)) => {
                    tracing::warn!(len = bytes.len(), "skipping binary websocket message");
                }
                // Ping/pong are answered by tungstenite; raw frames never reach the read half.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(RealtimeError::TransportReceive(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), RealtimeError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.stream
            .close(None)
            .await
            .map_err(|e| RealtimeError::TransportSend(e.to_string()))
    }
}

/// [`Connector`] that dials a new [`WebSocketTransport`] per attempt.
///
/// The client applies its own connect timeout around [`Connector::connect`],
/// so none is configured here.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, RealtimeError> {
        let transport = WebSocketTransport::connect(url).await?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn websocket_types_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
        assert_send::<WebSocketConnector>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let result = WebSocketTransport::connect("not-a-valid-url").await;
        let err = result.unwrap_err();
        assert!(matches!(err, RealtimeError::Connect(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let result = WebSocketTransport::connect("ws://127.0.0.1:1").await;
        let err = result.unwrap_err();
        assert!(matches!(err, RealtimeError::Io(_)));
    }

    // ── Mock-stream helpers ──────────────────────────────────────────────

    use tokio::net::TcpListener;

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    // ── Mock-stream tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn recv_receives_text_messages() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("hello".into())).await.unwrap();
            ws.send(Message::Text("world".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();

        let msg1 = transport.recv().await.unwrap().unwrap();
        assert_eq!(msg1, "hello");

        let msg2 = transport.recv().await.unwrap().unwrap();
        assert_eq!(msg2, "world");
    }

    #[tokio::test]
    async fn recv_returns_none_on_close_frame() {
        let url = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let result = transport.recv().await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();

        // The binary frame should be silently skipped.
        let msg = transport.recv().await.unwrap().unwrap();
        assert_eq!(msg, "after_binary");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = start_mock_server(|mut ws| async move {
            // Read until the client closes.
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("oops".to_string()).await.unwrap_err();
        assert!(matches!(err, RealtimeError::TransportClosed));
    }

    #[tokio::test]
    async fn double_close_is_idempotent() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        // Second close should also succeed.
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn connector_yields_working_transport() {
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new().connect(&url).await.unwrap();
        let ping = r#"{"type":"Ping","data":{"timestamp":1}}"#;
        transport.send(ping.to_string()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), ping);
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn connector_reports_unreachable_host() {
        let result = WebSocketConnector::new().connect("ws://127.0.0.1:1").await;
        assert!(matches!(result, Err(RealtimeError::Io(_))));
    }
}
