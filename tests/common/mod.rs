#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for realtime client integration tests.
//!
//! Provides a scripted [`MockConnector`] whose accepted connections are
//! handed to the test as [`MockServer`]s, plus small helpers for building
//! server frames and recording callback invocations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use realtime_client::protocol::{ClientFrame, ServerFrame};
use realtime_client::{Connector, RealtimeConfig, RealtimeError, Transport};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Generous upper bound for waits; virtual under paused time.
const WAIT: Duration = Duration::from_secs(120);

// ── MockConnector ───────────────────────────────────────────────────

/// What the next connection attempt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    Refuse,
    /// Never completes; exercises the connect timeout.
    Hang,
}

struct ConnectorInner {
    script: StdMutex<VecDeque<Outcome>>,
    attempts: StdMutex<Vec<Instant>>,
    servers: mpsc::UnboundedSender<MockServer>,
}

/// Connector handed to the client. Attempts follow the script and fall back
/// to [`Outcome::Accept`] once it runs out.
pub struct MockConnector {
    inner: Arc<ConnectorInner>,
}

/// Test-side view of a [`MockConnector`].
pub struct ConnectorHandle {
    inner: Arc<ConnectorInner>,
    servers: mpsc::UnboundedReceiver<MockServer>,
}

impl MockConnector {
    pub fn new() -> (Self, ConnectorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ConnectorInner {
            script: StdMutex::new(VecDeque::new()),
            attempts: StdMutex::new(Vec::new()),
            servers: tx,
        });
        let handle = ConnectorHandle {
            inner: Arc::clone(&inner),
            servers: rx,
        };
        (Self { inner }, handle)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>, RealtimeError> {
        self.inner.attempts.lock().unwrap().push(Instant::now());
        let outcome = self
            .inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Accept);
        match outcome {
            Outcome::Refuse => Err(RealtimeError::Connect("connection refused".into())),
            Outcome::Hang => std::future::pending().await,
            Outcome::Accept => {
                let (transport, server) = mock_pair();
                let _ = self.inner.servers.send(server);
                Ok(Box::new(transport))
            }
        }
    }
}

impl ConnectorHandle {
    /// Queue outcomes for the next attempts.
    pub fn script(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.inner.script.lock().unwrap().extend(outcomes);
    }

    /// Instants at which `connect` was called, oldest first.
    pub fn attempts(&self) -> Vec<Instant> {
        self.inner.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.inner.attempts.lock().unwrap().len()
    }

    /// Wait for the next accepted connection.
    pub async fn next_server(&mut self) -> MockServer {
        tokio::time::timeout(WAIT, self.servers.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    pub fn try_next_server(&mut self) -> Option<MockServer> {
        self.servers.try_recv().ok()
    }
}

// ── MockTransport / MockServer ──────────────────────────────────────

/// Client half of an in-memory connection.
pub struct MockTransport {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<Result<String, RealtimeError>>,
    closed: Arc<AtomicBool>,
}

/// Server half of an in-memory connection, driven by the test.
pub struct MockServer {
    received: mpsc::UnboundedReceiver<String>,
    push: Option<mpsc::UnboundedSender<Result<String, RealtimeError>>>,
    closed: Arc<AtomicBool>,
}

fn mock_pair() -> (MockTransport, MockServer) {
    let (to_server, received) = mpsc::unbounded_channel();
    let (push, incoming) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let transport = MockTransport {
        outgoing: to_server,
        incoming,
        closed: Arc::clone(&closed),
    };
    let server = MockServer {
        received,
        push: Some(push),
        closed,
    };
    (transport, server)
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), RealtimeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RealtimeError::TransportClosed);
        }
        self.outgoing
            .send(message)
            .map_err(|_| RealtimeError::TransportSend("server gone".into()))
    }

    async fn recv(&mut self) -> Option<Result<String, RealtimeError>> {
        self.incoming.recv().await
    }

    async fn close(&mut self) -> Result<(), RealtimeError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl MockServer {
    /// Every frame the client has sent so far, without waiting.
    pub fn frames(&mut self) -> Vec<ClientFrame> {
        let mut frames = Vec::new();
        while let Ok(text) = self.received.try_recv() {
            frames.push(serde_json::from_str(&text).expect("client sent invalid frame"));
        }
        frames
    }

    /// Wait for the next frame from the client.
    pub async fn next_frame(&mut self) -> ClientFrame {
        let text = tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client transport dropped");
        serde_json::from_str(&text).expect("client sent invalid frame")
    }

    pub fn push(&self, frame: ServerFrame) {
        self.push_raw(&serde_json::to_string(&frame).unwrap());
    }

    pub fn push_raw(&self, text: &str) {
        if let Some(push) = &self.push {
            let _ = push.send(Ok(text.to_string()));
        }
    }

    /// Deliver a transport error to the client.
    pub fn fail(&self, message: &str) {
        if let Some(push) = &self.push {
            let _ = push.send(Err(RealtimeError::TransportReceive(message.to_string())));
        }
    }

    /// Close the connection from the server side.
    pub fn close(&mut self) {
        self.push = None;
    }

    /// Whether the client closed its transport.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Let spawned client tasks run without advancing time.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

pub fn manual_config() -> RealtimeConfig {
    RealtimeConfig::new("ws://mock.test/ws").with_auto_connect(false)
}

pub fn server_event(name: &str, data: Value) -> ServerFrame {
    ServerFrame::Event {
        event: name.to_string(),
        data,
    }
}

/// Names of the application events in `frames`, in order.
pub fn event_names(frames: &[ClientFrame]) -> Vec<String> {
    frames
        .iter()
        .filter_map(|frame| match frame {
            ClientFrame::Event { event, .. } => Some(event.clone()),
            _ => None,
        })
        .collect()
}

pub fn join(room: &str) -> ClientFrame {
    ClientFrame::JoinRoom {
        room: room.to_string(),
    }
}

/// Shared log for callback invocations.
pub type Recorder<T> = Arc<StdMutex<Vec<T>>>;

pub fn recorder<T>() -> Recorder<T> {
    Arc::new(StdMutex::new(Vec::new()))
}

pub fn recorded<T: Clone>(log: &Recorder<T>) -> Vec<T> {
    log.lock().unwrap().clone()
}
