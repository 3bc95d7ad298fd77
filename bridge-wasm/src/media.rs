//! `MediaLoader` over DOM media elements.
//!
//! Images load into an `<img>`, audio into an `<audio>` and everything else
//! into a `<video>`. Hidden requests attach the element off-screen while it
//! buffers and detach it afterwards. The loader resolves on `load` (images)
//! or `canplaythrough` (audio and video) and fails on `error` or when the
//! timeout elapses first.
//!
//! The element travels inside the returned handle, so the browser keeps the
//! buffered data for as long as the handle is retained.

use std::{cell::RefCell, rc::Rc, time::Duration};

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    media::{LoadRequest, MediaElement, MediaHandle, MediaKind, MediaLoader},
};
use bytes::Bytes;
use futures::{
    channel::oneshot,
    future::{select, Either},
    pin_mut,
};
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Document, Event, EventTarget, HtmlElement, HtmlImageElement, HtmlMediaElement};

use crate::error::{js_error, window};

const OFF_SCREEN_STYLE: &str =
    "position:absolute;left:-9999px;top:0;width:1px;height:1px;opacity:0;pointer-events:none";

/// Loader that creates one detached element per request.
pub struct ElementMediaLoader {
    document: Document,
    timeout: Duration,
}

impl ElementMediaLoader {
    pub fn new() -> BridgeResult<Self> {
        let document = window()?
            .document()
            .ok_or_else(|| BridgeError::NotAvailable("document".into()))?;
        Ok(Self {
            document,
            timeout: Duration::from_secs(20),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn create(&self, tag: &str) -> BridgeResult<HtmlElement> {
        self.document
            .create_element(tag)
            .map_err(|err| js_error("createElement", err))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| BridgeError::OperationFailed(format!("<{tag}> is not an HTML element")))
    }

    fn element_for(&self, request: &LoadRequest, kind: MediaKind) -> BridgeResult<HtmlElement> {
        if kind == MediaKind::Image {
            let element = self.create("img")?;
            if let Some(image) = element.dyn_ref::<HtmlImageElement>() {
                image.set_src(&request.url);
            }
            return Ok(element);
        }

        let element = self.create(if kind == MediaKind::Audio { "audio" } else { "video" })?;
        if let Some(media) = element.dyn_ref::<HtmlMediaElement>() {
            media.set_muted(request.muted);
            media.set_loop(request.looping);
            media.set_preload("auto");
            media.set_src(&request.url);
        }
        Ok(element)
    }

    fn attach_off_screen(&self, element: &HtmlElement) -> BridgeResult<()> {
        element
            .set_attribute("style", OFF_SCREEN_STYLE)
            .map_err(|err| js_error("set style", err))?;
        let body = self
            .document
            .body()
            .ok_or_else(|| BridgeError::NotAvailable("document.body".into()))?;
        body.append_child(element)
            .map_err(|err| js_error("appendChild", err))?;
        Ok(())
    }

    async fn wait(&self, outcome: oneshot::Receiver<BridgeResult<()>>, url: &str) -> BridgeResult<()> {
        let timer = TimeoutFuture::new(self.timeout.as_millis().min(u32::MAX as u128) as u32);
        pin_mut!(outcome);
        match select(outcome, timer).await {
            Either::Left((Ok(result), _)) => result,
            Either::Left((Err(_), _)) => Err(BridgeError::OperationFailed(format!(
                "load of {url} was abandoned"
            ))),
            Either::Right(_) => Err(BridgeError::OperationFailed(format!(
                "{url} not ready after {} ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

/// `data:` URLs carry their type up front instead of in an extension.
fn kind_of(url: &str) -> MediaKind {
    match url.strip_prefix("data:").and_then(|rest| rest.split_once('/')) {
        Some(("image", _)) => MediaKind::Image,
        Some(("audio", _)) => MediaKind::Audio,
        Some(("video", _)) => MediaKind::Video,
        _ => MediaKind::from_url(url),
    }
}

type OutcomeSender = Rc<RefCell<Option<oneshot::Sender<BridgeResult<()>>>>>;

/// Ready and error listeners, removed again on drop.
struct Listeners {
    target: EventTarget,
    ready_event: &'static str,
    on_ready: Closure<dyn FnMut(Event)>,
    on_error: Closure<dyn FnMut(Event)>,
}

impl Listeners {
    fn install(
        target: &EventTarget,
        ready_event: &'static str,
        url: &str,
    ) -> BridgeResult<(Self, oneshot::Receiver<BridgeResult<()>>)> {
        let (tx, rx) = oneshot::channel();
        let sender: OutcomeSender = Rc::new(RefCell::new(Some(tx)));

        let on_ready = {
            let sender = sender.clone();
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                if let Some(tx) = sender.borrow_mut().take() {
                    let _ = tx.send(Ok(()));
                }
            })
        };
        let on_error = {
            let url = url.to_string();
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                if let Some(tx) = sender.borrow_mut().take() {
                    let _ = tx.send(Err(BridgeError::OperationFailed(format!(
                        "media element failed to load {url}"
                    ))));
                }
            })
        };

        target
            .add_event_listener_with_callback(ready_event, on_ready.as_ref().unchecked_ref())
            .map_err(|err| js_error("addEventListener", err))?;
        target
            .add_event_listener_with_callback("error", on_error.as_ref().unchecked_ref())
            .map_err(|err| js_error("addEventListener", err))?;

        Ok((
            Self {
                target: target.clone(),
                ready_event,
                on_ready,
                on_error,
            },
            rx,
        ))
    }
}

impl Drop for Listeners {
    fn drop(&mut self) {
        let _ = self.target.remove_event_listener_with_callback(
            self.ready_event,
            self.on_ready.as_ref().unchecked_ref(),
        );
        let _ = self
            .target
            .remove_event_listener_with_callback("error", self.on_error.as_ref().unchecked_ref());
    }
}

#[async_trait(?Send)]
impl MediaLoader for ElementMediaLoader {
    async fn load(&self, request: &LoadRequest) -> BridgeResult<MediaHandle> {
        let kind = kind_of(&request.url);
        let ready_event = if kind == MediaKind::Image {
            "load"
        } else {
            "canplaythrough"
        };

        // Element events are dispatched from the event loop, so listeners
        // installed before the first await observe them.
        let element = self.element_for(request, kind)?;
        let (listeners, outcome) = Listeners::install(&element, ready_event, &request.url)?;
        if request.hidden {
            self.attach_off_screen(&element)?;
        }

        let result = self.wait(outcome, &request.url).await;
        drop(listeners);
        if request.hidden {
            element.remove();
        }
        if let Err(err) = result {
            element.remove_attribute("src").ok();
            return Err(err);
        }

        tracing::debug!(url = %request.url, ?kind, hidden = request.hidden, "Media element ready");
        Ok(MediaHandle {
            url: request.url.clone(),
            kind: if kind == MediaKind::Other {
                MediaKind::Video
            } else {
                kind
            },
            content_type: None,
            muted: request.muted,
            looping: request.looping,
            data: Bytes::new(),
            element: Some(MediaElement::new(element)),
        })
    }
}
