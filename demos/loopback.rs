//! # Loopback Connector Demo
//!
//! Drives a [`RealtimeClient`] against an in-process "server" built from
//! channels. Shows how to implement [`Connector`] and [`Transport`], and walks
//! through the offline queue, room replay, progress subscriptions and an
//! automatic reconnection.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback
//! ```

use std::time::Duration;

use async_trait::async_trait;
use realtime_client::{Connector, RealtimeClient, RealtimeConfig, RealtimeError, Transport};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: A channel-based transport and its server half
// ─────────────────────────────────────────────────────────────────────

/// Client half of the loopback.
pub struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Server half: read what the client sent, push frames back.
pub struct LoopbackServer {
    pub rx: mpsc::UnboundedReceiver<String>,
    pub tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        LoopbackServer {
            rx: server_rx,
            tx: server_tx,
        },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), RealtimeError> {
        self.tx
            .send(message)
            .map_err(|e| RealtimeError::TransportSend(e.to_string()))
    }

    /// `None` once the server half is dropped. Cancel-safe because
    /// `mpsc::UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, RealtimeError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), RealtimeError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: A connector that hands each new server half to `main`
// ─────────────────────────────────────────────────────────────────────

struct LoopbackConnector {
    servers: mpsc::UnboundedSender<LoopbackServer>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, RealtimeError> {
        tracing::info!(url, "loopback connect");
        let (transport, server) = loopback_pair();
        self.servers
            .send(server)
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        Ok(Box::new(transport))
    }
}

async fn read_frames(server: &mut LoopbackServer, count: usize) -> Vec<String> {
    let mut frames = Vec::with_capacity(count);
    while frames.len() < count {
        match server.rx.recv().await {
            Some(frame) => frames.push(frame),
            None => break,
        }
    }
    frames
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Wire it together
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (servers_tx, mut servers) = mpsc::unbounded_channel();
    let config = RealtimeConfig::new("loopback://demo")
        .with_auto_connect(false)
        .with_reconnect_delay(Duration::from_millis(200))
        .with_debug(true);
    let client = RealtimeClient::new(config, LoopbackConnector { servers: servers_tx });

    client.on_connect(|info| {
        tracing::info!(session = %info.session_id, reconnection = info.is_reconnection, "online");
    });
    client.on_disconnect(|info| tracing::info!(reason = %info.reason, "offline"));
    client.on_reconnect(|s| {
        tracing::info!(attempt = s.attempt, delay = ?s.delay, "reconnect scheduled");
    });
    client.subscribe_to_progress("demo-session", |payload| {
        tracing::info!(%payload, "grading progress");
    });

    // Emitted before connecting: queued, flushed on connect.
    client.emit("notification", serde_json::json!({"text": "queued while offline"}));

    client.connect().await?;
    let Some(mut server) = servers.recv().await else {
        return Err("connector dropped before the first connection".into());
    };
    for frame in read_frames(&mut server, 2).await {
        tracing::info!("server received: {frame}");
    }

    let progress = serde_json::json!({
        "type": "Event",
        "data": {
            "event": "grading_progress",
            "data": {"session_id": "demo-session", "progress": 60}
        }
    });
    server.tx.send(progress.to_string())?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Drop the server half: the client sees a clean close and reconnects.
    drop(server);
    let Some(mut server) = servers.recv().await else {
        return Err("connector dropped before reconnecting".into());
    };
    for frame in read_frames(&mut server, 1).await {
        tracing::info!("server received after reconnect: {frame}");
    }

    let stats = client.stats();
    tracing::info!(
        connections = stats.total_connections,
        reconnections = stats.total_reconnections,
        sent = stats.messages_sent,
        received = stats.messages_received,
        "statistics"
    );
    println!("{}", serde_json::to_string_pretty(&client.state())?);

    client.destroy();
    tracing::info!("done");
    Ok(())
}
