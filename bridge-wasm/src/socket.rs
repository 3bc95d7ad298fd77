//! `SocketConnector` over the browser `WebSocket`.
//!
//! Browser sockets are callback driven. The connector installs `onopen`,
//! `onmessage`, `onerror` and `onclose` handlers that feed a oneshot (for the
//! handshake) and an unbounded frame queue (for everything after it), which
//! the read half drains. The handlers live as long as either half.

use std::{cell::RefCell, rc::Rc};

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    transport::{SocketConnection, SocketConnector, SocketFrame, SocketSink, SocketStream},
};
use futures::{
    channel::{mpsc, oneshot},
    StreamExt,
};
use js_sys::{ArrayBuffer, Uint8Array};
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{BinaryType, CloseEvent, Event, MessageEvent, WebSocket};

use crate::error::js_message;

type FrameSender = mpsc::UnboundedSender<BridgeResult<SocketFrame>>;
type OpenSender = Rc<RefCell<Option<oneshot::Sender<BridgeResult<()>>>>>;

/// Connector for `ws://` / `wss://` endpoints using the page's WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSocketConnector;

impl BrowserSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Keeps the JS callbacks alive and detaches them when both halves are gone.
struct Callbacks {
    socket: WebSocket,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl Drop for Callbacks {
    fn drop(&mut self) {
        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onerror(None);
        self.socket.set_onclose(None);
        let _ = self.socket.close();
    }
}

fn message_frame(event: &MessageEvent) -> Option<SocketFrame> {
    let data = event.data();
    if let Some(text) = data.as_string() {
        return Some(SocketFrame::Text(text));
    }
    data.dyn_into::<ArrayBuffer>()
        .ok()
        .map(|buffer| SocketFrame::Binary(Uint8Array::new(&buffer).to_vec().into()))
}

fn resolve_open(open: &OpenSender, result: BridgeResult<()>) -> bool {
    match open.borrow_mut().take() {
        Some(sender) => {
            let _ = sender.send(result);
            true
        }
        None => false,
    }
}

fn install_callbacks(socket: &WebSocket, open: OpenSender, frames: FrameSender) -> Callbacks {
    let on_open = {
        let open = open.clone();
        Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            resolve_open(&open, Ok(()));
        })
    };

    let on_message = {
        let frames = frames.clone();
        Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(frame) = message_frame(&event) {
                let _ = frames.unbounded_send(Ok(frame));
            }
        })
    };

    // Browsers always follow an error with a close event, which ends the
    // stream. Only a handshake in flight needs failing here.
    let on_error = {
        let open = open.clone();
        Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            if !resolve_open(
                &open,
                Err(BridgeError::ConnectionFailed("WebSocket error".into())),
            ) {
                tracing::debug!("WebSocket error after open");
            }
        })
    };

    let on_close = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
        let code = event.code();
        let reason = event.reason();
        if !resolve_open(
            &open,
            Err(BridgeError::ConnectionFailed(format!(
                "closed during handshake (code {code})"
            ))),
        ) {
            let _ = frames.unbounded_send(Ok(SocketFrame::Close { code, reason }));
        }
        frames.close_channel();
    });

    socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
    socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
    socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

    Callbacks {
        socket: socket.clone(),
        _on_open: on_open,
        _on_message: on_message,
        _on_error: on_error,
        _on_close: on_close,
    }
}

#[async_trait(?Send)]
impl SocketConnector for BrowserSocketConnector {
    async fn connect(&self, url: &str) -> BridgeResult<SocketConnection> {
        let socket =
            WebSocket::new(url).map_err(|err| BridgeError::ConnectionFailed(js_message(&err)))?;
        socket.set_binary_type(BinaryType::Arraybuffer);

        let (open_tx, open_rx) = oneshot::channel();
        let (frame_tx, frame_rx) = mpsc::unbounded();
        let callbacks = Rc::new(install_callbacks(
            &socket,
            Rc::new(RefCell::new(Some(open_tx))),
            frame_tx,
        ));

        open_rx
            .await
            .map_err(|_| BridgeError::ConnectionFailed("handshake abandoned".into()))??;
        tracing::info!(url, "WebSocket connected");

        Ok(SocketConnection::new(
            Box::new(BrowserSocketSink {
                socket,
                _callbacks: callbacks.clone(),
            }),
            Box::new(BrowserSocketStream {
                frames: frame_rx,
                _callbacks: callbacks,
            }),
        ))
    }
}

struct BrowserSocketSink {
    socket: WebSocket,
    _callbacks: Rc<Callbacks>,
}

#[async_trait(?Send)]
impl SocketSink for BrowserSocketSink {
    async fn send_text(&mut self, text: &str) -> BridgeResult<()> {
        if self.socket.ready_state() != WebSocket::OPEN {
            return Err(BridgeError::ConnectionClosed("socket not open".into()));
        }
        self.socket
            .send_with_str(text)
            .map_err(|err| BridgeError::ConnectionClosed(js_message(&err)))
    }

    async fn close(&mut self) -> BridgeResult<()> {
        self.socket
            .close()
            .map_err(|err| BridgeError::OperationFailed(js_message(&err)))
    }
}

struct BrowserSocketStream {
    frames: mpsc::UnboundedReceiver<BridgeResult<SocketFrame>>,
    _callbacks: Rc<Callbacks>,
}

#[async_trait(?Send)]
impl SocketStream for BrowserSocketStream {
    async fn next_frame(&mut self) -> Option<BridgeResult<SocketFrame>> {
        self.frames.next().await
    }
}
