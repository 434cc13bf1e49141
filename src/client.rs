//! Resilient real-time client.
//!
//! [`RealtimeClient`] owns a single logical connection to one server
//! endpoint. It opens transports through a [`Connector`], keeps the
//! connection-state machine, replays room subscriptions and queued events on
//! every (re)connection, and reconnects with exponential backoff after
//! unexpected drops.
//!
//! While connected, a background *connection driver* task owns the
//! transport and multiplexes outbound frames, inbound frames and heartbeat
//! ticks via `tokio::select!`. Everything else talks to it through an
//! [`Outbox`]; dropping the outbox is how the driver is told to close.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = RealtimeConfig::new("wss://grading.example.com/ws")
//!     .with_auto_connect(false)
//!     .with_reconnect_attempts(5);
//! let client = RealtimeClient::new(config, WebSocketConnector::new());
//!
//! client.on_connect(|info| tracing::info!(session = %info.session_id, "online"));
//! client.on("notification", |payload| println!("{payload}"));
//! client.join_room("course_42");
//! client.connect().await?;
//!
//! client.emit("submit_answer", serde_json::json!({"question": 3, "answer": "B"}));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{RealtimeError, Result};
use crate::event::{
    ConnectInfo, DisconnectInfo, DisconnectReason, ErrorInfo, EventName, ReconnectScheduled,
};
use crate::heartbeat::HeartbeatMonitor;
use crate::protocol::{AckId, ClientFrame, ServerFrame};
use crate::queue::{AckCallback, MessageQueue, QueuedMessage};
use crate::reconnect::ReconnectPolicy;
use crate::rooms::RoomRegistry;
use crate::router::{invoke_guarded, EventHandler, EventRouter, HandlerId, Observer, Observers};
use crate::stats::{ClientStats, Statistics};
use crate::transport::{Connector, Outbox, Transport};

const DEFAULT_URL: &str = "ws://localhost:8000/ws";
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_millis(30_000);
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);
const DEFAULT_MESSAGE_QUEUE_SIZE: usize = 100;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(20_000);
const MIN_DURATION: Duration = Duration::from_millis(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`RealtimeClient`].
///
/// Every field has a default; only the URL usually needs changing.
///
/// ```
/// use realtime_client::RealtimeConfig;
/// use std::time::Duration;
///
/// let config = RealtimeConfig::new("wss://grading.example.com/ws")
///     .with_reconnect_attempts(3)
///     .with_reconnect_delay(Duration::from_millis(500))
///     .with_message_queue_size(20);
/// assert!(config.auto_connect);
/// assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Endpoint handed to the [`Connector`].
    pub url: String,
    /// Start connecting as soon as the client is constructed.
    ///
    /// Defaults to **true**. Requires a tokio runtime at construction time.
    pub auto_connect: bool,
    /// Maximum number of automatic reconnection attempts. Defaults to **10**.
    pub reconnect_attempts: u32,
    /// Base backoff delay. Defaults to **1 second**.
    pub reconnect_delay: Duration,
    /// Backoff ceiling. Defaults to **30 seconds**.
    pub max_reconnect_delay: Duration,
    /// Period of the latency probe. Defaults to **30 seconds**.
    pub heartbeat_interval: Duration,
    /// Capacity of the offline message queue. Defaults to **100**.
    pub message_queue_size: usize,
    /// Whether events emitted while offline are queued. Defaults to **true**.
    pub queue_enabled: bool,
    /// How long a single connection attempt may take. Defaults to **20 seconds**.
    pub connect_timeout: Duration,
    /// Trace every inbound and outbound frame at `debug` level.
    pub debug: bool,
}

impl RealtimeConfig {
    /// Create a configuration for `url` with default values.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auto_connect: true,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            message_queue_size: DEFAULT_MESSAGE_QUEUE_SIZE,
            queue_enabled: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            debug: false,
        }
    }

    /// Connect on construction.
    #[must_use]
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Cap on automatic reconnection attempts.
    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Values below 1 ms are clamped to 1 ms.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay.max(MIN_DURATION);
        self
    }

    /// A ceiling below the base delay behaves as if it equalled the base.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Values below 1 ms are clamped to 1 ms.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval.max(MIN_DURATION);
        self
    }

    /// A size of 0 drops every offline emit.
    #[must_use]
    pub fn with_message_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = size;
        self
    }

    /// Queue events emitted while offline.
    #[must_use]
    pub fn with_queue_enabled(mut self, enabled: bool) -> Self {
        self.queue_enabled = enabled;
        self
    }

    /// Values below 1 ms are clamped to 1 ms.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout.max(MIN_DURATION);
        self
    }

    /// Log every frame at `debug` level.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

// ── Public state types ──────────────────────────────────────────────

/// Connection-state machine. Only the client itself transitions it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    /// A manual connection attempt is in flight.
    Connecting,
    Connected,
    /// A reconnection timer is armed or an automatic attempt is in flight.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Point-in-time view returned by [`RealtimeClient::state`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    pub connection_state: ConnectionState,
    pub session_id: Option<Uuid>,
    pub reconnect_attempt: u32,
    pub joined_rooms: Vec<String>,
    pub latency: Option<Duration>,
    pub queue_size: usize,
    pub heartbeat_active: bool,
}

// ── Shared state ────────────────────────────────────────────────────

/// Mutable client state. Guarded by one mutex that is never held across an
/// `.await` or while consumer callbacks run.
struct Core {
    state: ConnectionState,
    /// Bumped on every attempt and teardown; work tagged with an older epoch
    /// is stale and discarded.
    epoch: u64,
    destroyed: bool,
    session_id: Option<Uuid>,
    outbox: Option<Outbox>,
    /// In-flight attempt or live connection driver.
    connection_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    pending_connect: Option<oneshot::Sender<Result<()>>>,
    reconnect: ReconnectPolicy,
    heartbeat: HeartbeatMonitor,
    rooms: RoomRegistry,
    queue: MessageQueue,
    pending_acks: HashMap<AckId, AckCallback>,
    next_ack: AckId,
    router: EventRouter,
    progress: HashMap<String, Vec<HandlerId>>,
    on_connect: Observers<ConnectInfo>,
    on_disconnect: Observers<DisconnectInfo>,
    on_error: Observers<ErrorInfo>,
    on_reconnect: Observers<ReconnectScheduled>,
    stats: Statistics,
}

impl Core {
    fn new(config: &RealtimeConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            epoch: 0,
            destroyed: false,
            session_id: None,
            outbox: None,
            connection_task: None,
            reconnect_timer: None,
            pending_connect: None,
            reconnect: ReconnectPolicy::new(
                config.reconnect_delay,
                config.max_reconnect_delay,
                config.reconnect_attempts,
            ),
            heartbeat: HeartbeatMonitor::new(config.heartbeat_interval),
            rooms: RoomRegistry::new(),
            queue: MessageQueue::new(config.message_queue_size, config.queue_enabled),
            pending_acks: HashMap::new(),
            next_ack: 0,
            router: EventRouter::new(),
            progress: HashMap::new(),
            on_connect: Observers::new(),
            on_disconnect: Observers::new(),
            on_error: Observers::new(),
            on_reconnect: Observers::new(),
            stats: Statistics::default(),
        }
    }

    /// Send an event on the live connection. Returns `false` when offline.
    fn send_event(
        &mut self,
        event: &EventName,
        data: Value,
        ack: Option<AckCallback>,
        trace: bool,
    ) -> bool {
        if self.outbox.is_none() {
            return false;
        }
        let ack_id = ack.map(|callback| {
            self.next_ack += 1;
            self.pending_acks.insert(self.next_ack, callback);
            self.next_ack
        });
        let frame = ClientFrame::Event {
            event: event.as_str().to_string(),
            data,
            ack: ack_id,
        };
        if trace {
            debug!(event = %event, ?ack_id, "emitting event");
        }
        let sent = self.outbox.as_ref().is_some_and(|outbox| outbox.send(frame));
        if sent {
            self.stats.messages_sent += 1;
        } else if let Some(id) = ack_id {
            self.pending_acks.remove(&id);
        }
        sent
    }

    /// Replay the queued events over the live connection, oldest first.
    fn flush_queue(&mut self, trace: bool) -> usize {
        let snapshot = self.queue.drain();
        let mut flushed = 0;
        for message in snapshot {
            if self.send_event(&message.event, message.data, message.ack, trace) {
                flushed += 1;
            }
        }
        flushed
    }

    /// Drop everything tied to the current connection.
    fn teardown_connection(&mut self) {
        if self.state == ConnectionState::Connected {
            self.stats.record_disconnected();
        }
        self.outbox = None;
        self.session_id = None;
        self.heartbeat.stop();
        self.rooms.mark_offline();
        self.pending_acks.clear();
    }
}

struct Shared {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    core: Mutex<Core>,
}

type Notify<T> = Option<(T, Vec<Observer<T>>)>;

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn a connection attempt. `state` is `Connecting` for manual
    /// attempts and `Reconnecting` for automatic ones.
    fn start_attempt(self: &Arc<Self>, core: &mut Core, state: ConnectionState) {
        core.epoch += 1;
        core.state = state;
        let epoch = core.epoch;
        debug!(%state, epoch, url = %self.config.url, "starting connection attempt");
        let task = tokio::spawn(run_connection(Arc::clone(self), epoch));
        if let Some(previous) = core.connection_task.replace(task) {
            previous.abort();
        }
    }

    /// Count a reconnection attempt and arm its timer, or settle in
    /// Disconnected once the budget is spent.
    fn schedule_reconnect(self: &Arc<Self>, core: &mut Core) -> Notify<ReconnectScheduled> {
        let Some(scheduled) = core.reconnect.next_attempt() else {
            warn!(
                attempts = core.reconnect.attempt(),
                "reconnection attempts exhausted; staying disconnected"
            );
            core.state = ConnectionState::Disconnected;
            return None;
        };
        core.state = ConnectionState::Reconnecting;
        let epoch = core.epoch;
        let shared = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(scheduled.delay).await;
            shared.fire_reconnect(epoch);
        });
        if let Some(previous) = core.reconnect_timer.replace(timer) {
            previous.abort();
        }
        info!(
            attempt = scheduled.attempt,
            max_attempts = scheduled.max_attempts,
            delay_ms = u64::try_from(scheduled.delay.as_millis()).unwrap_or(u64::MAX),
            "reconnection scheduled"
        );
        Some((scheduled, core.on_reconnect.snapshot()))
    }

    fn fire_reconnect(self: &Arc<Self>, epoch: u64) {
        let mut core = self.lock();
        if core.destroyed || core.epoch != epoch || core.state != ConnectionState::Reconnecting {
            return;
        }
        core.reconnect_timer = None;
        debug!(attempt = core.reconnect.attempt(), "reconnection timer fired");
        self.start_attempt(&mut core, ConnectionState::Reconnecting);
    }

    /// Transition into Connected. Returns the outbound frame stream for the
    /// driver, or `None` if this attempt has been superseded.
    fn on_connected(&self, epoch: u64) -> Option<mpsc::UnboundedReceiver<ClientFrame>> {
        let (info, observers, outbound) = {
            let mut core = self.lock();
            if core.destroyed || core.epoch != epoch {
                return None;
            }
            let is_reconnection = core.reconnect.attempt() > 0;
            core.reconnect.reset();
            if let Some(timer) = core.reconnect_timer.take() {
                timer.abort();
            }

            let session_id = Uuid::new_v4();
            core.state = ConnectionState::Connected;
            core.session_id = Some(session_id);
            let (timestamp, now) = (self.clock.unix_millis(), self.clock.now());
            core.stats.record_connected(timestamp, now, is_reconnection);
            core.heartbeat.start();

            // Rooms first, then the queue, all before any caller can emit.
            let (outbox, outbound) = Outbox::channel();
            let rejoined = core.rooms.replay(&outbox);
            core.outbox = Some(outbox);
            let flushed = core.flush_queue(self.config.debug);

            if let Some(tx) = core.pending_connect.take() {
                let _ = tx.send(Ok(()));
            }
            info!(%session_id, is_reconnection, rejoined, flushed, "connected");

            let info = ConnectInfo {
                session_id,
                timestamp,
                is_reconnection,
            };
            (info, core.on_connect.snapshot(), outbound)
        };
        invoke_guarded("on_connect", &observers, &info);
        Some(outbound)
    }

    fn on_connect_error(self: &Arc<Self>, epoch: u64, err: RealtimeError) {
        let (info, observers, scheduled) = {
            let mut core = self.lock();
            if core.destroyed || core.epoch != epoch {
                return;
            }
            core.stats.errors += 1;
            core.connection_task = None;
            let message = err.to_string();
            let scheduled = if core.state == ConnectionState::Reconnecting {
                warn!(attempt = core.reconnect.attempt(), error = %message, "reconnection attempt failed");
                self.schedule_reconnect(&mut core)
            } else {
                error!(error = %message, "connect failed");
                core.state = ConnectionState::Disconnected;
                None
            };
            if let Some(tx) = core.pending_connect.take() {
                let _ = tx.send(Err(err));
            }
            let info = ErrorInfo {
                message,
                timestamp: self.clock.unix_millis(),
            };
            (info, core.on_error.snapshot(), scheduled)
        };
        invoke_guarded("on_error", &observers, &info);
        if let Some((scheduled, observers)) = scheduled {
            invoke_guarded("on_reconnect", &observers, &scheduled);
        }
    }

    /// Steady-state transport error: counted and reported, never fatal.
    fn report_error(&self, epoch: u64, err: &RealtimeError) {
        let (info, observers) = {
            let mut core = self.lock();
            if core.epoch != epoch {
                return;
            }
            core.stats.errors += 1;
            let info = ErrorInfo {
                message: err.to_string(),
                timestamp: self.clock.unix_millis(),
            };
            (info, core.on_error.snapshot())
        };
        invoke_guarded("on_error", &observers, &info);
    }

    fn on_connection_lost(self: &Arc<Self>, epoch: u64, reason: DisconnectReason) {
        let (info, observers, scheduled) = {
            let mut core = self.lock();
            if core.destroyed || core.epoch != epoch {
                return;
            }
            let was_connected = core.state == ConnectionState::Connected;
            core.teardown_connection();
            core.connection_task = None;
            core.state = ConnectionState::Disconnected;
            warn!(%reason, "connection lost");

            let scheduled = if reason.is_deliberate() {
                None
            } else {
                self.schedule_reconnect(&mut core)
            };
            let info = DisconnectInfo {
                reason,
                timestamp: self.clock.unix_millis(),
                was_connected,
            };
            (info, core.on_disconnect.snapshot(), scheduled)
        };
        invoke_guarded("on_disconnect", &observers, &info);
        if let Some((scheduled, observers)) = scheduled {
            invoke_guarded("on_reconnect", &observers, &scheduled);
        }
    }

    /// Local teardown shared by `disconnect()` and `destroy()`.
    fn teardown(&self, core: &mut Core) -> Notify<DisconnectInfo> {
        let previous = core.state;
        core.epoch += 1;
        if let Some(timer) = core.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(task) = core.connection_task.take() {
            // A live driver closes its transport once the outbox drops.
            if core.outbox.is_none() {
                task.abort();
            }
        }
        core.teardown_connection();
        core.state = ConnectionState::Disconnected;
        if let Some(tx) = core.pending_connect.take() {
            let _ = tx.send(Err(RealtimeError::ConnectAborted));
        }
        if previous == ConnectionState::Disconnected {
            return None;
        }
        info!(from = %previous, "disconnected by client");
        let info = DisconnectInfo {
            reason: DisconnectReason::ClientDisconnect,
            timestamp: self.clock.unix_millis(),
            was_connected: previous == ConnectionState::Connected,
        };
        Some((info, core.on_disconnect.snapshot()))
    }

    /// Record a heartbeat probe. Returns the ping timestamp, or `None` if the
    /// heartbeat is not running for this connection.
    fn heartbeat_due(&self, epoch: u64) -> Option<u64> {
        let mut core = self.lock();
        if core.epoch != epoch || !core.heartbeat.is_active() {
            return None;
        }
        core.heartbeat.record_ping(self.clock.now());
        Some(self.clock.unix_millis())
    }

    fn handle_inbound(&self, epoch: u64, text: &str) {
        let frame = match serde_json::from_str::<ServerFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("failed to deserialize server frame: {e} (raw: {text})");
                return;
            }
        };
        if self.config.debug {
            debug!(?frame, "inbound frame");
        }

        match frame {
            ServerFrame::Pong { .. } => {
                let mut core = self.lock();
                if core.epoch != epoch {
                    return;
                }
                if let Some(latency) = core.heartbeat.record_pong(self.clock.now()) {
                    debug!(latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX), "heartbeat pong");
                }
            }
            ServerFrame::Ack { id, data } => {
                let callback = {
                    let mut core = self.lock();
                    if core.epoch != epoch {
                        return;
                    }
                    core.pending_acks.remove(&id)
                };
                match callback {
                    Some(callback) => {
                        if catch_unwind(AssertUnwindSafe(move || callback(data))).is_err() {
                            error!(ack_id = id, "ack callback panicked");
                        }
                    }
                    None => debug!(ack_id = id, "ack for unknown id"),
                }
            }
            ServerFrame::Event { event, data } => {
                let name = EventName::from(event);
                let handlers = {
                    let mut core = self.lock();
                    if core.epoch != epoch {
                        return;
                    }
                    core.stats.messages_received += 1;
                    core.router.handlers(&name)
                };
                if handlers.is_empty() {
                    debug!(event = %name, "no handlers registered");
                }
                invoke_guarded(name.as_str(), &handlers, &data);
            }
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a resilient real-time connection.
///
/// Construct one per server endpoint and share it (e.g. behind an `Arc`)
/// with whatever needs it. Apart from [`connect`](Self::connect), every
/// method is synchronous and returns immediately.
///
/// Dropping the handle destroys the client: timers are cancelled and the
/// transport is closed.
pub struct RealtimeClient {
    shared: Arc<Shared>,
}

impl RealtimeClient {
    /// Create a client that opens transports through `connector`.
    ///
    /// With `auto_connect` enabled a first connection attempt starts right
    /// away; this needs a tokio runtime, otherwise the attempt is skipped
    /// with a warning and [`connect`](Self::connect) must be called later.
    pub fn new(config: RealtimeConfig, connector: impl Connector) -> Self {
        Self::with_clock(config, connector, SystemClock)
    }

    /// Like [`new`](Self::new) with an explicit time source.
    pub fn with_clock(
        config: RealtimeConfig,
        connector: impl Connector,
        clock: impl Clock,
    ) -> Self {
        let auto_connect = config.auto_connect;
        let shared = Arc::new(Shared {
            core: Mutex::new(Core::new(&config)),
            config,
            connector: Arc::new(connector),
            clock: Arc::new(clock),
        });

        if auto_connect {
            if tokio::runtime::Handle::try_current().is_ok() {
                let mut core = shared.lock();
                shared.start_attempt(&mut core, ConnectionState::Connecting);
            } else {
                warn!("auto_connect requested outside a tokio runtime; call connect() manually");
            }
        }

        Self { shared }
    }

    // ── Connection control ──────────────────────────────────────────

    /// Connect to the configured endpoint.
    ///
    /// Resolves immediately if the client is already connecting or
    /// connected. A pending reconnection timer is cancelled in favour of an
    /// immediate attempt. Failure is terminal for this call: it does not
    /// start the automatic reconnection chain.
    ///
    /// # Errors
    ///
    /// Returns the connector's error (or [`RealtimeError::Timeout`]) if the
    /// attempt fails, [`RealtimeError::ConnectAborted`] if `disconnect()` or
    /// `destroy()` intervenes, and [`RealtimeError::Destroyed`] after
    /// `destroy()`.
    pub async fn connect(&self) -> Result<()> {
        let settled = {
            let mut core = self.shared.lock();
            if core.destroyed {
                return Err(RealtimeError::Destroyed);
            }
            match core.state {
                ConnectionState::Connecting | ConnectionState::Connected => return Ok(()),
                ConnectionState::Reconnecting => {
                    if let Some(timer) = core.reconnect_timer.take() {
                        timer.abort();
                    }
                    debug!("manual connect supersedes pending reconnection");
                }
                ConnectionState::Disconnected => {}
            }
            let (tx, rx) = oneshot::channel();
            core.pending_connect = Some(tx);
            self.shared
                .start_attempt(&mut core, ConnectionState::Connecting);
            rx
        };
        settled.await.unwrap_or(Err(RealtimeError::ConnectAborted))
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Recorded rooms are kept and replayed by the next successful
    /// [`connect`](Self::connect); queued events stay queued.
    pub fn disconnect(&self) {
        let notify = {
            let mut core = self.shared.lock();
            self.shared.teardown(&mut core)
        };
        if let Some((info, observers)) = notify {
            invoke_guarded("on_disconnect", &observers, &info);
        }
    }

    /// Tear the client down for good: close the connection, cancel timers,
    /// and clear handlers, rooms, queue and statistics. Safe to call from any
    /// state, any number of times.
    pub fn destroy(&self) {
        let mut core = self.shared.lock();
        if core.destroyed {
            return;
        }
        core.router.clear();
        core.progress.clear();
        core.on_connect.clear();
        core.on_disconnect.clear();
        core.on_error.clear();
        core.on_reconnect.clear();
        // Nobody is left to notify.
        let _ = self.shared.teardown(&mut core);
        core.queue.clear();
        core.rooms.clear();
        core.stats = Statistics::default();
        core.destroyed = true;
        info!("client destroyed");
    }

    // ── Messaging ───────────────────────────────────────────────────

    /// Emit an event.
    ///
    /// Returns `true` if it was handed to the live connection. While offline
    /// it is queued (if the queue is enabled and has room) and `false` is
    /// returned; a full or disabled queue drops it, also returning `false`.
    pub fn emit(&self, event: impl Into<EventName>, data: Value) -> bool {
        self.emit_inner(event.into(), data, None)
    }

    /// Like [`emit`](Self::emit), running `ack` once when the server
    /// acknowledges the event. The callback survives queuing, but is dropped
    /// if the connection ends before the acknowledgement arrives.
    pub fn emit_with_ack(
        &self,
        event: impl Into<EventName>,
        data: Value,
        ack: impl FnOnce(Value) + Send + 'static,
    ) -> bool {
        self.emit_inner(event.into(), data, Some(Box::new(ack)))
    }

    fn emit_inner(&self, event: EventName, data: Value, ack: Option<AckCallback>) -> bool {
        let mut core = self.shared.lock();
        if core.destroyed {
            warn!(event = %event, "emit on destroyed client ignored");
            return false;
        }
        if core.state == ConnectionState::Connected {
            return core.send_event(&event, data, ack, self.shared.config.debug);
        }
        match core.queue.push(QueuedMessage { event, data, ack }) {
            Ok(()) => {
                debug!(queue_size = core.queue.len(), "not connected; event queued");
            }
            Err(dropped) => {
                warn!(
                    event = %dropped.event,
                    queue_size = core.queue.len(),
                    capacity = core.queue.capacity(),
                    enabled = core.queue.is_enabled(),
                    "not connected and queue unavailable; event dropped"
                );
            }
        }
        false
    }

    // ── Rooms ───────────────────────────────────────────────────────

    /// Join `room`, now if connected, otherwise on the next connection.
    ///
    /// Returns `true` when the room is joined on the live connection or was
    /// already recorded; a first join while offline returns `false`.
    pub fn join_room(&self, room: &str) -> bool {
        let mut guard = self.shared.lock();
        if guard.destroyed {
            return false;
        }
        let core = &mut *guard;
        core.rooms.join(room, core.outbox.as_ref())
    }

    /// Leave `room`. Always succeeds; a leave frame is only sent when the
    /// room is joined on the live connection.
    pub fn leave_room(&self, room: &str) -> bool {
        let mut guard = self.shared.lock();
        let core = &mut *guard;
        core.rooms.leave(room, core.outbox.as_ref())
    }

    /// Follow a grading session: joins its room and runs `callback` for every
    /// `grading_progress` and `grading_complete` event whose payload carries
    /// the same `session_id`.
    pub fn subscribe_to_progress(
        &self,
        session_id: impl Into<String>,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> HandlerId {
        let session_id = session_id.into();
        let filter = session_id.clone();
        let handler: EventHandler = Arc::new(move |payload: &Value| {
            if payload_matches_session(payload, &filter) {
                callback(payload);
            }
        });

        let mut guard = self.shared.lock();
        let core = &mut *guard;
        let id = core.router.allocate_id();
        if core.destroyed {
            warn!(session_id = %session_id, "progress subscription on destroyed client ignored");
            return id;
        }
        core.router
            .insert(&EventName::GradingProgress, id, Arc::clone(&handler));
        core.router.insert(&EventName::GradingComplete, id, handler);
        core.rooms.join(&progress_room(&session_id), core.outbox.as_ref());
        core.progress.entry(session_id).or_default().push(id);
        id
    }

    /// Drop one progress subscription (`Some(id)`) or all of them (`None`)
    /// for `session_id`. The session's room is left once none remain.
    /// Returns how many subscriptions were removed.
    pub fn unsubscribe_from_progress(&self, session_id: &str, id: Option<HandlerId>) -> usize {
        let mut guard = self.shared.lock();
        let core = &mut *guard;
        let Some(ids) = core.progress.get_mut(session_id) else {
            return 0;
        };
        let targets: Vec<HandlerId> = ids
            .iter()
            .copied()
            .filter(|existing| id.is_none_or(|wanted| wanted == *existing))
            .collect();
        ids.retain(|existing| !targets.contains(existing));
        let exhausted = ids.is_empty();

        for target in &targets {
            core.router.off(&EventName::GradingProgress, *target);
            core.router.off(&EventName::GradingComplete, *target);
        }
        if exhausted {
            core.progress.remove(session_id);
            core.rooms
                .leave(&progress_room(session_id), core.outbox.as_ref());
        }
        targets.len()
    }

    // ── Handlers ────────────────────────────────────────────────────

    /// Register `handler` for a server event. Handlers for the same event run
    /// in registration order.
    pub fn on(
        &self,
        event: impl Into<EventName>,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> HandlerId {
        let event = event.into();
        self.shared.lock().router.on(&event, Arc::new(handler))
    }

    /// Remove one handler. Returns whether it was registered.
    pub fn off(&self, event: impl Into<EventName>, id: HandlerId) -> bool {
        self.shared.lock().router.off(&event.into(), id)
    }

    /// Remove every handler for `event`. Returns how many were removed.
    pub fn off_all(&self, event: impl Into<EventName>) -> usize {
        self.shared.lock().router.off_all(&event.into())
    }

    /// Observe every transition into Connected.
    pub fn on_connect(&self, observer: impl Fn(&ConnectInfo) + Send + Sync + 'static) -> HandlerId {
        let mut core = self.shared.lock();
        let id = core.router.allocate_id();
        core.on_connect.add(id, Arc::new(observer));
        id
    }

    /// Observe every disconnection.
    pub fn on_disconnect(
        &self,
        observer: impl Fn(&DisconnectInfo) + Send + Sync + 'static,
    ) -> HandlerId {
        let mut core = self.shared.lock();
        let id = core.router.allocate_id();
        core.on_disconnect.add(id, Arc::new(observer));
        id
    }

    /// Observe connection errors and transport failures.
    pub fn on_error(&self, observer: impl Fn(&ErrorInfo) + Send + Sync + 'static) -> HandlerId {
        let mut core = self.shared.lock();
        let id = core.router.allocate_id();
        core.on_error.add(id, Arc::new(observer));
        id
    }

    /// Observe scheduled reconnections; runs before the timer fires.
    pub fn on_reconnect(
        &self,
        observer: impl Fn(&ReconnectScheduled) + Send + Sync + 'static,
    ) -> HandlerId {
        let mut core = self.shared.lock();
        let id = core.router.allocate_id();
        core.on_reconnect.add(id, Arc::new(observer));
        id
    }

    /// Remove a lifecycle observer registered with any `on_*` method.
    pub fn remove_observer(&self, id: HandlerId) -> bool {
        let mut core = self.shared.lock();
        core.on_connect.remove(id)
            | core.on_disconnect.remove(id)
            | core.on_error.remove(id)
            | core.on_reconnect.remove(id)
    }

    // ── Queue ───────────────────────────────────────────────────────

    /// Enable or disable offline queuing. Already queued events are kept.
    pub fn set_queue_enabled(&self, enabled: bool) {
        self.shared.lock().queue.set_enabled(enabled);
    }

    /// Discard all queued events.
    pub fn clear_queue(&self) {
        let mut core = self.shared.lock();
        let dropped = core.queue.len();
        core.queue.clear();
        debug!(dropped, "message queue cleared");
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Current state of the connection state machine.
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Returns `true` while a transport is live.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Returns `true` while a manual attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        self.connection_state() == ConnectionState::Connecting
    }

    /// Returns `true` while a reconnection is scheduled or running.
    pub fn is_reconnecting(&self) -> bool {
        self.connection_state() == ConnectionState::Reconnecting
    }

    /// Returns `true` once [`destroy`](Self::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().destroyed
    }

    /// Serializable snapshot of the connection.
    pub fn state(&self) -> ClientSnapshot {
        let core = self.shared.lock();
        ClientSnapshot {
            connection_state: core.state,
            session_id: core.session_id,
            reconnect_attempt: core.reconnect.attempt(),
            joined_rooms: core.rooms.rooms(),
            latency: core.heartbeat.latency(),
            queue_size: core.queue.len(),
            heartbeat_active: core.heartbeat.is_active(),
        }
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> ClientStats {
        let core = self.shared.lock();
        ClientStats {
            connect_time: core.stats.connect_time,
            total_connections: core.stats.total_connections,
            total_disconnections: core.stats.total_disconnections,
            total_reconnections: core.stats.total_reconnections,
            messages_sent: core.stats.messages_sent,
            messages_received: core.stats.messages_received,
            errors: core.stats.errors,
            uptime: core.stats.uptime(self.shared.clock.now()),
            latency: core.heartbeat.latency(),
            queue_size: core.queue.len(),
            room_count: core.rooms.len(),
        }
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.lock();
        f.debug_struct("RealtimeClient")
            .field("url", &self.shared.config.url)
            .field("state", &core.state)
            .field("rooms", &core.rooms.len())
            .field("queued", &core.queue.len())
            .field("destroyed", &core.destroyed)
            .finish()
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn progress_room(session_id: &str) -> String {
    format!("grading_{session_id}")
}

fn payload_matches_session(payload: &Value, session_id: &str) -> bool {
    match payload.get("session_id") {
        Some(Value::String(s)) => s == session_id,
        Some(Value::Number(n)) => n.to_string() == session_id,
        _ => false,
    }
}

// ── Connection driver ───────────────────────────────────────────────

/// Open a transport and, if this attempt is still current, drive it.
async fn run_connection(shared: Arc<Shared>, epoch: u64) {
    let attempt = tokio::time::timeout(
        shared.config.connect_timeout,
        shared.connector.connect(&shared.config.url),
    )
    .await;
    let mut transport = match attempt {
        Ok(Ok(transport)) => transport,
        Ok(Err(e)) => return shared.on_connect_error(epoch, e),
        Err(_) => return shared.on_connect_error(epoch, RealtimeError::Timeout),
    };

    let Some(outbound) = shared.on_connected(epoch) else {
        debug!("connection attempt superseded; closing transport");
        if let Err(e) = transport.close().await {
            debug!("closing superseded transport failed: {e}");
        }
        return;
    };
    drive(shared, epoch, transport, outbound).await;
}

/// Multiplex outbound frames, inbound frames and heartbeat ticks until the
/// connection ends.
///
/// Exits when:
/// - The outbox is dropped (`disconnect()`/`destroy()`): closes quietly
/// - The transport returns `None` (server closed the connection)
/// - A transport error occurs
async fn drive(
    shared: Arc<Shared>,
    epoch: u64,
    mut transport: Box<dyn Transport>,
    mut outbound: mpsc::UnboundedReceiver<ClientFrame>,
) {
    debug!(epoch, "connection driver started");
    let trace = shared.config.debug;
    let period = shared.lock().heartbeat.interval();
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = send_frame(transport.as_mut(), &frame, trace).await {
                            error!("transport send error: {e}");
                            shared.report_error(epoch, &e);
                            break DisconnectReason::TransportError(e.to_string());
                        }
                    }
                    None => {
                        debug!("outbox dropped, closing transport");
                        if let Err(e) = transport.close().await {
                            debug!("transport close failed: {e}");
                        }
                        return;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if let Some(timestamp) = shared.heartbeat_due(epoch) {
                    let ping = ClientFrame::Ping { timestamp };
                    if let Err(e) = send_frame(transport.as_mut(), &ping, trace).await {
                        error!("heartbeat send error: {e}");
                        shared.report_error(epoch, &e);
                        break DisconnectReason::TransportError(e.to_string());
                    }
                }
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => shared.handle_inbound(epoch, &text),
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        shared.report_error(epoch, &e);
                        break DisconnectReason::TransportError(e.to_string());
                    }
                    None => {
                        debug!("transport closed by server");
                        break DisconnectReason::ServerClosed;
                    }
                }
            }
        }
    };

    if let Err(e) = transport.close().await {
        debug!("transport close after failure: {e}");
    }
    shared.on_connection_lost(epoch, reason);
    debug!(epoch, "connection driver exited");
}

async fn send_frame(transport: &mut dyn Transport, frame: &ClientFrame, trace: bool) -> Result<()> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            // Serialization errors are programming bugs; don't kill the connection.
            error!(kind = frame.kind(), "failed to serialize frame: {e}");
            return Ok(());
        }
    };
    if trace {
        debug!(kind = frame.kind(), %json, "outbound frame");
    }
    transport.send(json).await
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
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
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Connector whose transports record sent frames and never yield input.
    struct RecordingConnector {
        sent: Arc<StdMutex<Vec<String>>>,
        attempts: Arc<AtomicUsize>,
        refuse: bool,
    }

    struct RecordingTransport {
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&mut self, message: String) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for RecordingConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(RealtimeError::Connect("refused".into()));
            }
            Ok(Box::new(RecordingTransport {
                sent: Arc::clone(&self.sent),
            }))
        }
    }

    fn recording(refuse: bool) -> (RecordingConnector, Arc<StdMutex<Vec<String>>>, Arc<AtomicUsize>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let attempts = Arc::new(AtomicUsize::new(0));
        let connector = RecordingConnector {
            sent: Arc::clone(&sent),
            attempts: Arc::clone(&attempts),
            refuse,
        };
        (connector, sent, attempts)
    }

    fn manual() -> RealtimeConfig {
        RealtimeConfig::default().with_auto_connect(false)
    }

    #[test]
    fn config_defaults() {
        let config = RealtimeConfig::default();
        assert!(config.auto_connect);
        assert_eq!(config.reconnect_attempts, 10);
        assert_eq!(config.reconnect_delay, Duration::from_millis(1000));
        assert_eq!(config.max_reconnect_delay, Duration::from_millis(30_000));
        assert_eq!(config.heartbeat_interval, Duration::from_millis(30_000));
        assert_eq!(config.message_queue_size, 100);
        assert!(config.queue_enabled);
        assert!(!config.debug);
    }

    #[test]
    fn config_builders_clamp_zero_durations() {
        let config = RealtimeConfig::new("ws://x")
            .with_heartbeat_interval(Duration::ZERO)
            .with_reconnect_delay(Duration::ZERO)
            .with_connect_timeout(Duration::ZERO);
        assert_eq!(config.heartbeat_interval, MIN_DURATION);
        assert_eq!(config.reconnect_delay, MIN_DURATION);
        assert_eq!(config.connect_timeout, MIN_DURATION);
    }

    #[test]
    fn construction_outside_runtime_does_not_panic() {
        let (connector, _sent, attempts) = recording(false);
        let client = RealtimeClient::new(RealtimeConfig::default(), connector);
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auto_connect_connects_without_explicit_call() {
        let (connector, _sent, attempts) = recording(false);
        let client = RealtimeClient::new(RealtimeConfig::default(), connector);
        assert!(client.is_connecting());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(client.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_is_a_no_op_when_connected() {
        let (connector, _sent, attempts) = recording(false);
        let client = RealtimeClient::new(manual(), connector);
        client.connect().await.unwrap();
        client.connect().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(client.state().session_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_connect_failure_is_terminal() {
        let (connector, _sent, attempts) = recording(true);
        let client = RealtimeClient::new(manual(), connector);
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        client.on_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, RealtimeError::Connect(_)));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(client.stats().errors, 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn emit_while_connected_sends_in_call_order() {
        let (connector, sent, _attempts) = recording(false);
        let client = RealtimeClient::new(manual(), connector);
        client.connect().await.unwrap();

        assert!(client.emit("first", json!(1)));
        assert!(client.emit("second", json!(2)));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let frames: Vec<ClientFrame> = sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect();
        let events: Vec<_> = frames
            .iter()
            .filter_map(|f| match f {
                ClientFrame::Event { event, .. } => Some(event.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(events, vec!["first", "second"]);
        assert_eq!(client.stats().messages_sent, 2);
    }

    #[tokio::test]
    async fn destroy_is_idempotent_and_blocks_further_use() {
        let (connector, _sent, _attempts) = recording(false);
        let client = RealtimeClient::new(manual(), connector);
        client.connect().await.unwrap();
        client.join_room("A");
        client.emit("x", json!(null));

        client.destroy();
        client.destroy();

        assert!(client.is_destroyed());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(client.state().joined_rooms.is_empty());
        assert_eq!(client.stats(), ClientStats {
            connect_time: None,
            total_connections: 0,
            total_disconnections: 0,
            total_reconnections: 0,
            messages_sent: 0,
            messages_received: 0,
            errors: 0,
            uptime: Duration::ZERO,
            latency: None,
            queue_size: 0,
            room_count: 0,
        });
        assert!(!client.emit("y", json!(null)));
        assert!(matches!(client.connect().await, Err(RealtimeError::Destroyed)));
    }

    #[test]
    fn payload_session_filter() {
        assert!(payload_matches_session(&json!({"session_id": "s1"}), "s1"));
        assert!(payload_matches_session(&json!({"session_id": 17}), "17"));
        assert!(!payload_matches_session(&json!({"session_id": "s2"}), "s1"));
        assert!(!payload_matches_session(&json!({"progress": 10}), "s1"));
    }

    #[test]
    fn connection_state_display() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }

    #[test]
    fn debug_impl_for_client() {
        let (connector, _sent, _attempts) = recording(false);
        let client = RealtimeClient::new(manual(), connector);
        let debug = format!("{client:?}");
        assert!(debug.contains("RealtimeClient"));
        assert!(debug.contains("Disconnected"));
    }
}
