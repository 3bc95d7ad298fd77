//! One-call wiring of the browser bridges.
//!
//! Host shells call [`build_wasm_bridges`] at startup and hand the result to
//! `core-service`, the way native hosts use `bridge-desktop` directly.

use std::sync::Arc;

use bridge_traits::{
    error::Result as BridgeResult, http::HttpClient, media::MediaLoader,
    storage::SettingsStore, transport::SocketConnector,
};

use crate::{
    http::FetchHttpClient, location::page_origin, media::ElementMediaLoader,
    socket::BrowserSocketConnector, storage::LocalStorageSettingsStore,
};

/// Configuration for [`build_wasm_bridges`].
#[derive(Debug, Clone)]
pub struct WasmBridgeConfig {
    /// Prefix for `localStorage` keys.
    pub namespace: String,
    /// Origin override. `None` uses the serving page's origin.
    pub origin: Option<String>,
}

impl WasmBridgeConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            origin: None,
        }
    }

    /// Talk to a different origin than the one serving the page.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl Default for WasmBridgeConfig {
    fn default() -> Self {
        Self::new("live")
    }
}

/// Browser bridge objects ready for injection into the core.
pub struct WasmBridgeSet {
    pub origin: String,
    pub http_client: Arc<dyn HttpClient>,
    pub socket_connector: Arc<dyn SocketConnector>,
    pub settings_store: Arc<dyn SettingsStore>,
    /// Element-backed loader, so preloaded media stays in the browser's
    /// media pipeline instead of wasm memory.
    pub media_loader: Arc<dyn MediaLoader>,
}

/// Builds the default browser bridge stack.
pub fn build_wasm_bridges(config: WasmBridgeConfig) -> BridgeResult<WasmBridgeSet> {
    let origin = match config.origin {
        Some(origin) => origin,
        None => page_origin()?,
    };

    Ok(WasmBridgeSet {
        origin,
        http_client: Arc::new(FetchHttpClient::new()?),
        socket_connector: Arc::new(BrowserSocketConnector::new()),
        settings_store: Arc::new(LocalStorageSettingsStore::new(&config.namespace)?),
        media_loader: Arc::new(ElementMediaLoader::new()?),
    })
}
