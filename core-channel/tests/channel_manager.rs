//! Channel manager behavior against a scripted in-memory transport.
//!
//! Timers run on a paused Tokio clock, so backoff delays are exact.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::transport::{
    SocketConnection, SocketConnector, SocketFrame, SocketSink, SocketStream,
};
use bytes::Bytes;
use core_channel::{
    ChannelConfig, ChannelManager, ChannelState, ClientMessage, ServerMessage, ServerMessageKind,
};
use core_runtime::config::Origin;
use core_runtime::events::{ChannelEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Server side of one accepted connection.
struct Peer {
    inbound: mpsc::UnboundedSender<BridgeResult<SocketFrame>>,
    outbound: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl Peer {
    fn push_text(&self, text: &str) {
        self.inbound
            .send(Ok(SocketFrame::Text(text.to_string())))
            .unwrap();
    }

    fn close(&self) {
        self.inbound
            .send(Ok(SocketFrame::Close {
                code: 1006,
                reason: "going away".into(),
            }))
            .unwrap();
    }

    fn sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

struct FakeSink {
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl SocketSink for FakeSink {
    async fn send_text(&mut self, text: &str) -> BridgeResult<()> {
        self.outbound
            .send(text.to_string())
            .map_err(|_| BridgeError::ConnectionClosed("peer gone".into()))
    }

    async fn close(&mut self) -> BridgeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeStream {
    inbound: mpsc::UnboundedReceiver<BridgeResult<SocketFrame>>,
}

#[async_trait]
impl SocketStream for FakeStream {
    async fn next_frame(&mut self) -> Option<BridgeResult<SocketFrame>> {
        self.inbound.recv().await
    }
}

/// Accepts or refuses connections according to a script; once the script
/// runs out every attempt is accepted (or refused, if `refuse_rest`).
#[derive(Default)]
struct ScriptedConnector {
    script: Mutex<VecDeque<bool>>,
    refuse_rest: bool,
    attempts: AtomicUsize,
    urls: Mutex<Vec<String>>,
    peers: Mutex<VecDeque<Peer>>,
}

impl ScriptedConnector {
    fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn refusing() -> Arc<Self> {
        Arc::new(Self {
            refuse_rest: true,
            ..Self::default()
        })
    }

    fn scripted(script: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            ..Self::default()
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn take_peer(&self) -> Peer {
        self.peers.lock().pop_front().expect("no accepted connection")
    }
}

#[async_trait]
impl SocketConnector for ScriptedConnector {
    async fn connect(&self, url: &str) -> BridgeResult<SocketConnection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());
        tokio::task::yield_now().await;

        let accept = self.script.lock().pop_front().unwrap_or(!self.refuse_rest);
        if !accept {
            return Err(BridgeError::ConnectionFailed("connection refused".into()));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        self.peers.lock().push_back(Peer {
            inbound: inbound_tx,
            outbound: outbound_rx,
            closed: Arc::clone(&closed),
        });

        Ok(SocketConnection::new(
            Box::new(FakeSink {
                outbound: outbound_tx,
                closed,
            }),
            Box::new(FakeStream {
                inbound: inbound_rx,
            }),
        ))
    }
}

fn manager(connector: Arc<ScriptedConnector>, bus: EventBus) -> ChannelManager {
    let origin = Origin::parse("https://live.example.com").unwrap();
    ChannelManager::new(ChannelConfig::default(), &origin, connector, bus)
}

/// Lets spawned tasks run without advancing the clock.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<CoreEvent>) -> Vec<ChannelEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Channel(event) = event {
            events.push(event);
        }
    }
    events
}

#[tokio::test(start_paused = true)]
async fn endpoint_follows_page_origin() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());
    assert_eq!(channel.endpoint(), "wss://live.example.com/ws");

    channel.connect();
    settle().await;
    assert_eq!(*connector.urls.lock(), vec!["wss://live.example.com/ws"]);
}

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());

    channel.connect();
    channel.connect();
    assert_eq!(channel.state(), ChannelState::Connecting);
    settle().await;
    assert!(channel.is_open());

    channel.connect();
    settle().await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn send_requires_open_channel() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());

    assert!(!channel.send(&ClientMessage::join_stream("42")));

    channel.connect();
    settle().await;
    let mut peer = connector.take_peer();

    assert!(channel.send(&ClientMessage::join_stream("42")));
    assert!(channel.send(&ClientMessage::chat("42", "first")));
    assert!(channel.send(&ClientMessage::chat("42", "second")));
    settle().await;

    let sent = peer.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0], r#"{"type":"join_stream","streamId":"42"}"#);
    assert!(sent[1].contains("first"));
    assert!(sent[2].contains("second"));
}

#[tokio::test(start_paused = true)]
async fn dispatch_goes_to_latest_handler_in_receipt_order() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());

    let stale = Arc::new(AtomicUsize::new(0));
    let counts = Arc::new(Mutex::new(Vec::new()));
    {
        let stale = Arc::clone(&stale);
        assert!(!channel.on_message(ServerMessageKind::ViewerCountUpdate, move |_| {
            stale.fetch_add(1, Ordering::SeqCst);
        }));
    }
    {
        let counts = Arc::clone(&counts);
        assert!(channel.on_message(ServerMessageKind::ViewerCountUpdate, move |message| {
            if let ServerMessage::ViewerCountUpdate(update) = message {
                counts.lock().push(update.count);
            }
        }));
    }

    channel.connect();
    settle().await;
    let peer = connector.take_peer();
    for count in [3, 5, 4] {
        peer.push_text(&format!(
            r#"{{"type":"viewer_count_update","streamId":"42","count":{}}}"#,
            count
        ));
    }
    // No handler: dropped quietly.
    peer.push_text(r#"{"type":"gift_sent","streamId":"42","senderName":"a","giftName":"rose"}"#);
    settle().await;

    assert_eq!(*counts.lock(), vec![3, 5, 4]);
    assert_eq!(stale.load(Ordering::SeqCst), 0);

    assert!(channel.off_message(ServerMessageKind::ViewerCountUpdate));
    peer.push_text(r#"{"type":"viewer_count_update","streamId":"42","count":9}"#);
    settle().await;
    assert_eq!(counts.lock().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn unknown_types_reach_the_default_handler() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        channel.on_message(ServerMessageKind::Unknown, move |message| {
            if let ServerMessage::Unknown { kind, .. } = message {
                seen.lock().push(kind.clone());
            }
        });
    }

    channel.connect();
    settle().await;
    connector
        .take_peer()
        .push_text(r#"{"type":"poll_started","streamId":"42"}"#);
    settle().await;

    assert_eq!(*seen.lock(), vec!["poll_started"]);
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_do_not_close_the_connection() {
    let bus = EventBus::new(32);
    let mut rx = bus.subscribe();
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), bus);
    let chats = Arc::new(AtomicUsize::new(0));
    {
        let chats = Arc::clone(&chats);
        channel.on_message(ServerMessageKind::ChatMessage, move |_| {
            chats.fetch_add(1, Ordering::SeqCst);
        });
    }

    channel.connect();
    settle().await;
    let peer = connector.take_peer();
    peer.push_text("{not json");
    peer.push_text(r#"{"streamId":"42"}"#);
    peer.push_text(r#"{"type":"chat_message","streamId":"42","username":"bo","message":"hi"}"#);
    settle().await;

    assert!(channel.is_open());
    assert_eq!(chats.load(Ordering::SeqCst), 1);
    let rejected = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ChannelEvent::FrameRejected { .. }))
        .count();
    assert_eq!(rejected, 2);
}

#[tokio::test(start_paused = true)]
async fn binary_frames_are_ignored() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());
    let counts = Arc::new(Mutex::new(Vec::new()));
    {
        let counts = Arc::clone(&counts);
        channel.on_message(ServerMessageKind::ViewerCountUpdate, move |message| {
            if let ServerMessage::ViewerCountUpdate(update) = message {
                counts.lock().push(update.count);
            }
        });
    }

    channel.connect();
    settle().await;
    let peer = connector.take_peer();
    peer.inbound
        .send(Ok(SocketFrame::Binary(Bytes::from_static(&[0x89, 0x00]))))
        .unwrap();
    peer.push_text(r#"{"type":"viewer_count_update","streamId":"42","count":7}"#);
    settle().await;

    assert!(channel.is_open());
    assert_eq!(*counts.lock(), vec![7]);
}

#[tokio::test(start_paused = true)]
async fn disconnect_from_a_handler_stops_buffered_dispatch() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());
    let chats = Arc::new(AtomicUsize::new(0));
    {
        let chats = Arc::clone(&chats);
        let handle = channel.clone();
        channel.on_message(ServerMessageKind::ChatMessage, move |_| {
            chats.fetch_add(1, Ordering::SeqCst);
            handle.disconnect();
        });
    }

    channel.connect();
    settle().await;
    let peer = connector.take_peer();
    for text in ["one", "two", "three"] {
        peer.push_text(&format!(
            r#"{{"type":"chat_message","streamId":"42","username":"bo","message":"{}"}}"#,
            text
        ));
    }
    settle().await;

    assert_eq!(chats.load(Ordering::SeqCst), 1);
    assert_eq!(channel.state(), ChannelState::Closed);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts(), 1);
    channel.dispose();
}

#[tokio::test(start_paused = true)]
async fn peer_close_reconnects_after_backoff() {
    let bus = EventBus::new(32);
    let mut rx = bus.subscribe();
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), bus);

    channel.connect();
    settle().await;
    connector.take_peer().close();
    settle().await;

    assert_eq!(channel.state(), ChannelState::Reconnecting);
    assert_eq!(channel.reconnect_attempt(), 1);
    assert!(!channel.send(&ClientMessage::join_stream("42")));

    tokio::time::sleep(Duration::from_millis(1999)).await;
    assert_eq!(connector.attempts(), 1);

    tokio::time::sleep(Duration::from_millis(2)).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);
    assert!(channel.is_open());
    assert_eq!(channel.reconnect_attempt(), 0);

    let events = drain(&mut rx);
    assert!(events.contains(&ChannelEvent::ReconnectScheduled {
        attempt: 1,
        delay_ms: 2000
    }));
    assert_eq!(
        events.last(),
        Some(&ChannelEvent::StateChanged {
            state: ChannelState::Open
        })
    );
}

#[tokio::test(start_paused = true)]
async fn transport_end_without_close_frame_reconnects() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());

    channel.connect();
    settle().await;
    drop(connector.take_peer());
    settle().await;

    assert_eq!(channel.state(), ChannelState::Reconnecting);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_at_the_ceiling() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let connector = ScriptedConnector::refusing();
    let channel = manager(connector.clone(), bus);

    channel.connect();
    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;

    // Initial attempt plus five retries.
    assert_eq!(connector.attempts(), 6);
    assert_eq!(channel.state(), ChannelState::Closed);

    let events = drain(&mut rx);
    let delays: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            ChannelEvent::ReconnectScheduled { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000]);
    assert!(events.contains(&ChannelEvent::ReconnectAbandoned { attempts: 5 }));

    // An explicit connect starts a fresh cycle.
    channel.connect();
    settle().await;
    assert_eq!(connector.attempts(), 7);
    assert_eq!(channel.state(), ChannelState::Reconnecting);
    assert_eq!(channel.reconnect_attempt(), 1);
}

#[tokio::test(start_paused = true)]
async fn successful_connect_resets_attempts() {
    let connector = ScriptedConnector::scripted(&[false, false, true]);
    let channel = manager(connector.clone(), EventBus::default());

    channel.connect();
    settle().await;
    assert_eq!(channel.reconnect_attempt(), 1);

    // 2s then 4s.
    tokio::time::sleep(Duration::from_millis(2001)).await;
    settle().await;
    assert_eq!(channel.reconnect_attempt(), 2);
    tokio::time::sleep(Duration::from_millis(4001)).await;
    settle().await;

    assert!(channel.is_open());
    assert_eq!(channel.reconnect_attempt(), 0);
    assert_eq!(connector.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_retry() {
    let connector = ScriptedConnector::refusing();
    let channel = manager(connector.clone(), EventBus::default());

    channel.connect();
    settle().await;
    assert_eq!(channel.state(), ChannelState::Reconnecting);

    channel.disconnect();
    assert_eq!(channel.state(), ChannelState::Closed);

    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[tokio::test(start_paused = true)]
async fn disconnect_closes_socket_without_reconnecting() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());
    let mut states = channel.state_changes();

    channel.connect();
    settle().await;
    let peer = connector.take_peer();
    states.wait_for(|s| *s == ChannelState::Open).await.unwrap();

    channel.disconnect();
    settle().await;

    assert!(peer.closed.load(Ordering::SeqCst));
    assert_eq!(*states.borrow(), ChannelState::Closed);
    assert!(!channel.send(&ClientMessage::leave_stream("42")));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_during_backoff_skips_the_timer() {
    let connector = ScriptedConnector::scripted(&[false, true]);
    let channel = manager(connector.clone(), EventBus::default());

    channel.connect();
    settle().await;
    assert_eq!(channel.state(), ChannelState::Reconnecting);

    channel.connect();
    settle().await;
    assert!(channel.is_open());
    assert_eq!(connector.attempts(), 2);

    // The superseded timer must not open a second socket.
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn dispose_drops_handlers() {
    let connector = ScriptedConnector::accepting();
    let channel = manager(connector.clone(), EventBus::default());
    channel.on_message(ServerMessageKind::GiftSent, |_| {});

    channel.connect();
    settle().await;
    channel.dispose();

    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(!channel.off_message(ServerMessageKind::GiftSent));
}
