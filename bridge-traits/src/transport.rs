//! Real-time socket transport.
//!
//! A connector opens one bidirectional text-frame connection and hands back
//! independent write and read halves, so the channel layer can run a writer
//! task and a reader task side by side. Desktop uses tokio-tungstenite; the
//! browser wraps `WebSocket`.

use bytes::Bytes;

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};

/// Inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketFrame {
    Text(String),
    Binary(Bytes),
    /// Peer closed the connection. `code` is 1005 when no status was sent.
    Close { code: u16, reason: String },
}

/// Write half of a connection.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait SocketSink: PlatformSend {
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Sends a close frame and releases the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a connection.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait SocketStream: PlatformSend {
    /// Waits for the next frame. `None` means the transport ended without a
    /// close frame (reset, dropped TCP connection).
    async fn next_frame(&mut self) -> Option<Result<SocketFrame>>;
}

/// A freshly opened connection, split into halves.
pub struct SocketConnection {
    pub sink: Box<dyn SocketSink>,
    pub stream: Box<dyn SocketStream>,
}

impl SocketConnection {
    pub fn new(sink: Box<dyn SocketSink>, stream: Box<dyn SocketStream>) -> Self {
        Self { sink, stream }
    }
}

impl std::fmt::Debug for SocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketConnection").finish_non_exhaustive()
    }
}

/// Opens socket connections.
///
/// `connect` resolves once the handshake completes; a failed handshake is a
/// [`BridgeError::ConnectionFailed`](crate::error::BridgeError::ConnectionFailed).
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait SocketConnector: PlatformSendSync {
    async fn connect(&self, url: &str) -> Result<SocketConnection>;
}

/// Rewrites an `http(s)` URL to the matching `ws(s)` scheme.
///
/// `ws://` and `wss://` pass through unchanged.
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}
