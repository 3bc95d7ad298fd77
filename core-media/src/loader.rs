//! `MediaLoader` over the `HttpClient` bridge.
//!
//! Used where no native media element exists (desktop hosts, tests): the
//! handle is considered ready once the response body has been received.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::media::{LoadRequest, MediaHandle, MediaKind, MediaLoader};
use core_runtime::config::Origin;
use tracing::{debug, instrument};

pub struct HttpMediaLoader {
    http: Arc<dyn HttpClient>,
    origin: Origin,
    timeout: Duration,
}

impl HttpMediaLoader {
    pub fn new(http: Arc<dyn HttpClient>, origin: Origin, timeout: Duration) -> Self {
        Self {
            http,
            origin,
            timeout,
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl MediaLoader for HttpMediaLoader {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn load(&self, request: &LoadRequest) -> BridgeResult<MediaHandle> {
        let absolute = self.origin.absolute(&request.url);
        let response = self
            .http
            .execute(HttpRequest::get(&absolute).timeout(self.timeout))
            .await?;

        if !response.is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP {} for {}",
                response.status, absolute
            )));
        }

        let content_type = response.content_type().map(str::to_string);
        let kind = match content_type.as_deref().map(MediaKind::from_content_type) {
            Some(kind) if kind != MediaKind::Other => kind,
            _ => MediaKind::from_url(&request.url),
        };
        debug!(?kind, bytes = response.body.len(), "Media loaded");

        Ok(MediaHandle {
            url: request.url.clone(),
            kind,
            content_type,
            muted: request.muted,
            looping: request.looping,
            data: response.body,
            element: None,
        })
    }
}
