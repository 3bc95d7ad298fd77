//! # Event Bus System
//!
//! Typed notifications from the live core, published over
//! `tokio::sync::broadcast`. UIs subscribe to drive their "disconnected"
//! indicator, placeholder media and live-session badge without polling the
//! services.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ ChannelManager ├────────>│           ├────────────>│ Subscriber │
//! └────────────────┘         │ EventBus  │             └────────────┘
//! ┌────────────────┐  emit   │ (broadcast│  subscribe  ┌────────────┐
//! │ Media services ├────────>│  channel) ├────────────>│ Subscriber │
//! └────────────────┘         │           │             └────────────┘
//! ┌────────────────┐  emit   │           │
//! │ Session store  ├────────>│           │
//! └────────────────┘         └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{ChannelEvent, ChannelState, CoreEvent, EventBus};
//!
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.publish(CoreEvent::Channel(ChannelEvent::StateChanged {
//!     state: ChannelState::Open,
//! }));
//! assert!(matches!(rx.try_recv(), Ok(CoreEvent::Channel(_))));
//! ```
//!
//! ## Delivery
//!
//! Publishing never blocks and never fails the caller: with no subscribers
//! the event is dropped. A subscriber that falls more than the buffer size
//! behind receives `RecvError::Lagged(n)` and continues with newer events.

use serde::{Deserialize, Serialize};
use std::fmt;

use core_async::sync::broadcast;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Channel(ChannelEvent),
    Media(MediaEvent),
    Session(SessionEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Channel(e) => e.description(),
            CoreEvent::Media(e) => e.description(),
            CoreEvent::Session(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Channel(ChannelEvent::ReconnectAbandoned { .. }) => EventSeverity::Error,
            CoreEvent::Media(MediaEvent::Unavailable { .. }) => EventSeverity::Warning,
            CoreEvent::Channel(ChannelEvent::ReconnectScheduled { .. })
            | CoreEvent::Channel(ChannelEvent::FrameRejected { .. }) => EventSeverity::Warning,
            CoreEvent::Channel(ChannelEvent::StateChanged { .. })
            | CoreEvent::Session(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Channel
// ============================================================================

/// Lifecycle of the real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    #[default]
    Closed,
    Connecting,
    Open,
    /// A retry timer is pending.
    Reconnecting,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelState::Closed => "closed",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Reconnecting => "reconnecting",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ChannelEvent {
    StateChanged {
        state: ChannelState,
    },
    /// A retry timer was armed.
    ReconnectScheduled {
        attempt: u32,
        delay_ms: u64,
    },
    /// The retry ceiling was reached; the channel stays closed until the
    /// next explicit connect.
    ReconnectAbandoned {
        attempts: u32,
    },
    /// An inbound frame could not be decoded. The connection is unaffected.
    FrameRejected {
        reason: String,
    },
}

impl ChannelEvent {
    fn description(&self) -> &str {
        match self {
            ChannelEvent::StateChanged { .. } => "Channel state changed",
            ChannelEvent::ReconnectScheduled { .. } => "Reconnect scheduled",
            ChannelEvent::ReconnectAbandoned { .. } => "Reconnect abandoned",
            ChannelEvent::FrameRejected { .. } => "Inbound frame rejected",
        }
    }
}

// ============================================================================
// Media
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MediaEvent {
    /// One fallback candidate failed to load.
    CandidateFailed {
        url: String,
        cursor: usize,
    },
    /// Every candidate for a reference failed.
    Unavailable {
        stored_path: String,
    },
    /// A retained handle was dropped to make room.
    Evicted {
        url: String,
    },
    VersionChanged {
        category: String,
        tag: String,
    },
}

impl MediaEvent {
    fn description(&self) -> &str {
        match self {
            MediaEvent::CandidateFailed { .. } => "Media candidate failed",
            MediaEvent::Unavailable { .. } => "Media unavailable",
            MediaEvent::Evicted { .. } => "Cached media evicted",
            MediaEvent::VersionChanged { .. } => "Cache version changed",
        }
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    Activated { id: String, title: String },
    Deactivated,
    /// A persisted session was too old (or unreadable) and was purged.
    Expired { id: Option<String> },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Activated { .. } => "Live session started",
            SessionEvent::Deactivated => "Live session ended",
            SessionEvent::Expired { .. } => "Stale live session purged",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast hub for [`CoreEvent`]s. Cloning shares the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends to current subscribers; `Err` when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Fire-and-forget variant of [`emit`](Self::emit).
    pub fn publish(&self, event: CoreEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver that skips events rejected by a predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only channel events.
    pub fn channel(self) -> Self {
        self.filter(|event| matches!(event, CoreEvent::Channel(_)))
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event already buffered, if any.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
