//! # Channel Manager
//!
//! Owns the single real-time connection of a client.
//!
//! ## Lifecycle
//!
//! ```text
//!            connect()                 handshake ok
//!  Closed ──────────────> Connecting ───────────────> Open
//!    ^                      │    ^                     │
//!    │ ceiling reached      │    │ retry timer fires   │ peer close / error
//!    │                      v    │                     v
//!    └──────────────────── Reconnecting <──────────────┘
//! ```
//!
//! `disconnect()` moves any state to `Closed` and cancels pending work
//! before returning.
//!
//! ## Tasks
//!
//! Each connection runs a reader (inside the connect task) and a writer fed
//! by an unbounded queue, so `send` never awaits and frames leave in call
//! order. Every connection belongs to a generation; work from an older
//! generation finds the generation changed and does nothing.
//!
//! ## Dispatch
//!
//! One handler per [`ServerMessageKind`]. Handlers run on the reader task in
//! receipt order and must not block.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::transport::{
    SocketConnection, SocketConnector, SocketFrame, SocketSink, SocketStream,
};
use core_async::sync::{mpsc, watch};
use core_async::task::{spawn_abortable, TaskHandle};
use core_runtime::config::Origin;
use core_runtime::events::{ChannelEvent, ChannelState, CoreEvent, EventBus};
use core_runtime::logging::preview;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ChannelConfig;
use crate::protocol::{ClientMessage, ServerMessage, ServerMessageKind};

/// Callback for one inbound message type.
#[cfg(not(target_arch = "wasm32"))]
pub type MessageHandler = Arc<dyn Fn(&ServerMessage) + Send + Sync>;
#[cfg(target_arch = "wasm32")]
pub type MessageHandler = Arc<dyn Fn(&ServerMessage)>;

const FRAME_PREVIEW_CHARS: usize = 120;

struct Connection {
    state: ChannelState,
    attempt: u32,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reader: Option<TaskHandle>,
    retry_timer: Option<TaskHandle>,
}

impl Connection {
    fn cancel_tasks(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        // The writer drains what is queued, closes the socket and exits.
        self.outbound = None;
    }
}

struct Inner {
    config: ChannelConfig,
    endpoint: String,
    connector: Arc<dyn SocketConnector>,
    events: EventBus,
    connection: Mutex<Connection>,
    handlers: Mutex<HashMap<ServerMessageKind, MessageHandler>>,
    state_tx: watch::Sender<ChannelState>,
}

/// Real-time channel with automatic reconnection.
///
/// Cloning is cheap; clones drive the same connection.
#[derive(Clone)]
pub struct ChannelManager {
    inner: Arc<Inner>,
}

impl ChannelManager {
    /// The endpoint is `config.endpoint_path` on `origin`, over `wss` when the
    /// origin is secure.
    pub fn new(
        config: ChannelConfig,
        origin: &Origin,
        connector: Arc<dyn SocketConnector>,
        events: EventBus,
    ) -> Self {
        let endpoint = origin.websocket_url(&config.endpoint_path);
        let (state_tx, _) = watch::channel(ChannelState::Closed);
        Self {
            inner: Arc::new(Inner {
                config,
                endpoint,
                connector,
                events,
                connection: Mutex::new(Connection {
                    state: ChannelState::Closed,
                    attempt: 0,
                    generation: 0,
                    outbound: None,
                    reader: None,
                    retry_timer: None,
                }),
                handlers: Mutex::new(HashMap::new()),
                state_tx,
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Opens the connection. A no-op while `Connecting` or `Open`; while
    /// `Reconnecting` the pending retry is replaced by an immediate attempt.
    ///
    /// Returns once the attempt has started, not when it completes; observe
    /// [`state_changes`](Self::state_changes) for the outcome.
    pub fn connect(&self) {
        let mut conn = self.inner.connection.lock();
        match conn.state {
            ChannelState::Connecting | ChannelState::Open => {
                debug!(state = %conn.state, "connect() ignored, channel already active");
                return;
            }
            ChannelState::Reconnecting => {
                debug!(attempt = conn.attempt, "connect() skips pending retry timer");
            }
            ChannelState::Closed => {
                conn.attempt = 0;
            }
        }
        Inner::start_connect(&self.inner, &mut conn);
    }

    /// Closes the connection and cancels any scheduled retry. No automatic
    /// reconnection happens until the next [`connect`](Self::connect).
    pub fn disconnect(&self) {
        let mut conn = self.inner.connection.lock();
        conn.generation += 1;
        conn.cancel_tasks();
        conn.attempt = 0;
        if conn.state != ChannelState::Closed {
            info!(endpoint = %self.inner.endpoint, "Channel disconnected");
            self.inner.set_state(&mut conn, ChannelState::Closed);
        }
    }

    /// Queues `message` for transmission. Returns `false` if the channel is
    /// not open; nothing is buffered for later.
    pub fn send(&self, message: &ClientMessage) -> bool {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound message");
                return false;
            }
        };

        let conn = self.inner.connection.lock();
        if conn.state != ChannelState::Open {
            warn!(state = %conn.state, "send() while channel is not open, message dropped");
            return false;
        }
        match &conn.outbound {
            Some(outbound) => outbound.send(text).is_ok(),
            None => false,
        }
    }

    /// Registers the handler for `kind`, replacing any previous one.
    /// Returns `true` if a handler was replaced.
    pub fn on_message<F>(&self, kind: ServerMessageKind, handler: F) -> bool
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        let replaced = self
            .inner
            .handlers
            .lock()
            .insert(kind, Arc::new(handler))
            .is_some();
        if replaced {
            info!(%kind, "Replaced message handler");
        } else {
            debug!(%kind, "Registered message handler");
        }
        replaced
    }

    /// Removes the handler for `kind`. Returns whether one was registered.
    pub fn off_message(&self, kind: ServerMessageKind) -> bool {
        let removed = self.inner.handlers.lock().remove(&kind).is_some();
        if removed {
            debug!(%kind, "Removed message handler");
        }
        removed
    }

    pub fn state(&self) -> ChannelState {
        self.inner.connection.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Consecutive failed attempts since the channel was last open.
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.connection.lock().attempt
    }

    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// Disconnects and drops every handler.
    pub fn dispose(&self) {
        self.disconnect();
        self.inner.handlers.lock().clear();
    }
}

impl Inner {
    fn set_state(&self, conn: &mut Connection, state: ChannelState) {
        if conn.state == state {
            return;
        }
        conn.state = state;
        self.state_tx.send_replace(state);
        self.events
            .publish(CoreEvent::Channel(ChannelEvent::StateChanged { state }));
    }

    fn start_connect(inner: &Arc<Inner>, conn: &mut Connection) {
        conn.generation += 1;
        conn.cancel_tasks();
        inner.set_state(conn, ChannelState::Connecting);

        let generation = conn.generation;
        let task_inner = Arc::clone(inner);
        conn.reader = Some(spawn_abortable(async move {
            Inner::run(task_inner, generation).await;
        }));
    }

    async fn run(inner: Arc<Inner>, generation: u64) {
        info!(endpoint = %inner.endpoint, generation, "Connecting channel");

        let connection = inner.connector.connect(&inner.endpoint).await;
        let SocketConnection { sink, stream } = match connection {
            Ok(connection) => connection,
            Err(e) => {
                inner.connection_lost(generation, e.to_string());
                return;
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let stale = {
            let mut conn = inner.connection.lock();
            if conn.generation != generation {
                true
            } else {
                conn.attempt = 0;
                conn.outbound = Some(outbound_tx);
                inner.set_state(&mut conn, ChannelState::Open);
                false
            }
        };

        // Dropping the sender makes the writer close the socket.
        spawn_abortable(write_loop(sink, outbound_rx));
        if stale {
            debug!(generation, "Discarding connection from a superseded attempt");
            return;
        }
        info!(endpoint = %inner.endpoint, "Channel open");

        let reason = inner.read_loop(stream, generation).await;
        inner.connection_lost(generation, reason);
    }

    async fn read_loop(&self, mut stream: Box<dyn SocketStream>, generation: u64) -> String {
        loop {
            match stream.next_frame().await {
                Some(Ok(SocketFrame::Text(text))) => {
                    // A handler may have disconnected while frames were
                    // already buffered; abort only lands at the next await.
                    if self.connection.lock().generation != generation {
                        return "superseded".to_string();
                    }
                    self.dispatch(&text);
                }
                Some(Ok(SocketFrame::Binary(data))) => {
                    debug!(bytes = data.len(), "Ignoring binary frame");
                }
                Some(Ok(SocketFrame::Close { code, reason })) => {
                    return format!("closed by peer (code {}) {}", code, reason);
                }
                Some(Err(e)) => return e.to_string(),
                None => return "transport ended".to_string(),
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let message = match ServerMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    error = %e,
                    frame = %preview(text, FRAME_PREVIEW_CHARS),
                    "Dropping malformed frame"
                );
                self.events
                    .publish(CoreEvent::Channel(ChannelEvent::FrameRejected {
                        reason: e.to_string(),
                    }));
                return;
            }
        };

        let kind = message.kind();
        if let ServerMessage::Unknown { kind: wire_kind, .. } = &message {
            debug!(%wire_kind, "Unrecognized message type");
        }

        // Invoked outside the lock so handlers may (un)register handlers.
        let handler = self.handlers.lock().get(&kind).cloned();
        match handler {
            Some(handler) => handler(&message),
            None => debug!(%kind, "No handler registered, message dropped"),
        }
    }

    fn connection_lost(self: &Arc<Self>, generation: u64, reason: String) {
        let mut conn = self.connection.lock();
        if conn.generation != generation {
            return;
        }
        conn.outbound = None;
        conn.reader = None;
        conn.attempt += 1;
        let attempt = conn.attempt;
        let policy = self.config.reconnect;

        if !policy.allows(attempt) {
            error!(
                endpoint = %self.endpoint,
                attempts = policy.max_attempts,
                reason = %reason,
                "Channel reconnect abandoned"
            );
            self.set_state(&mut conn, ChannelState::Closed);
            self.events
                .publish(CoreEvent::Channel(ChannelEvent::ReconnectAbandoned {
                    attempts: policy.max_attempts,
                }));
            return;
        }

        let delay = policy.delay_for(attempt);
        warn!(
            reason = %reason,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Channel lost, scheduling reconnect"
        );
        self.set_state(&mut conn, ChannelState::Reconnecting);
        self.events
            .publish(CoreEvent::Channel(ChannelEvent::ReconnectScheduled {
                attempt,
                delay_ms: delay.as_millis() as u64,
            }));

        if let Some(previous) = conn.retry_timer.take() {
            previous.abort();
        }
        let inner = Arc::clone(self);
        conn.retry_timer = Some(spawn_abortable(async move {
            core_async::time::sleep(delay).await;
            let mut conn = inner.connection.lock();
            if conn.generation == generation && conn.state == ChannelState::Reconnecting {
                conn.retry_timer = None;
                Inner::start_connect(&inner, &mut conn);
            }
        }));
    }
}

async fn write_loop(
    mut sink: Box<dyn SocketSink>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    while let Some(text) = outbound.recv().await {
        if let Err(e) = sink.send_text(&text).await {
            warn!(error = %e, "Outbound frame failed, closing writer");
            break;
        }
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "Socket close failed");
    }
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let conn = self.inner.connection.lock();
        f.debug_struct("ChannelManager")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &conn.state)
            .field("attempt", &conn.attempt)
            .finish()
    }
}
