//! WebSocket transport using tokio-tungstenite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    transport::{SocketConnection, SocketConnector, SocketFrame, SocketSink, SocketStream},
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::CloseFrame, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the peer's close frame carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Opens `ws://` and `wss://` connections with rustls.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SocketConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<SocketConnection> {
        debug!(url, "Opening socket");

        let (ws, _response) = connect_async(url).await.map_err(|e| {
            warn!(url, error = %e, "Socket handshake failed");
            BridgeError::ConnectionFailed(e.to_string())
        })?;

        info!(url, "Socket connected");

        let (write, read) = ws.split();
        Ok(SocketConnection::new(
            Box::new(TungsteniteSink { inner: write }),
            Box::new(TungsteniteStream { inner: read }),
        ))
    }
}

struct TungsteniteSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl SocketSink for TungsteniteSink {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.inner
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| BridgeError::ConnectionClosed(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        // The peer may already be gone; a failed close frame is not an error.
        let _ = self.inner.send(Message::Close(None)).await;
        self.inner
            .close()
            .await
            .map_err(|e| BridgeError::ConnectionClosed(e.to_string()))
    }
}

struct TungsteniteStream {
    inner: SplitStream<WsStream>,
}

fn close_frame(frame: Option<CloseFrame<'_>>) -> SocketFrame {
    match frame {
        Some(frame) => SocketFrame::Close {
            code: u16::from(frame.code),
            reason: frame.reason.into_owned(),
        },
        None => SocketFrame::Close {
            code: NO_STATUS_RECEIVED,
            reason: String::new(),
        },
    }
}

#[async_trait]
impl SocketStream for TungsteniteStream {
    async fn next_frame(&mut self) -> Option<Result<SocketFrame>> {
        loop {
            let message = match self.inner.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(BridgeError::ConnectionClosed(e.to_string()))),
            };

            let frame = match message {
                Message::Text(text) => SocketFrame::Text(text),
                Message::Binary(data) => SocketFrame::Binary(data.into()),
                Message::Close(frame) => close_frame(frame),
                // tungstenite answers pings itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }
}
