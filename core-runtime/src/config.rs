//! # Core Configuration Module
//!
//! A `CoreConfig` carries the host bridges and the page origin every live
//! service is built from. It is assembled with [`CoreConfigBuilder`] and
//! validated once, up front, so a missing capability fails at startup rather
//! than on the first reconnect.
//!
//! ## Required
//!
//! - `origin` - scheme, host and port of the serving page. The channel
//!   endpoint and absolute media URLs are derived from it; nothing else is
//!   hard-coded per environment.
//! - `SettingsStore` - durable storage for the live session record
//! - `SocketConnector` - opens the real-time channel
//!
//! ## Optional
//!
//! - `HttpClient` - fetches media for the default loader
//! - `Clock` - defaults to [`SystemClock`]
//!
//! With the `desktop-shims` feature the builder fills in SQLite settings
//! (under `data_dir`), reqwest and tokio-tungstenite when they are not
//! injected.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .origin("https://live.example.com")
//!     .data_dir("/var/lib/live-client")
//!     .build()?;
//!
//! assert_eq!(config.origin.websocket_url("/ws"), "wss://live.example.com/ws");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    http::HttpClient,
    storage::SettingsStore,
    time::{Clock, SystemClock},
    transport::SocketConnector,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Scheme + host (+ port) of the page the core is serving.
#[derive(Clone, PartialEq, Eq)]
pub struct Origin {
    base: Url,
}

impl Origin {
    /// Parses an `http`/`https` origin. Any path, query or fragment is
    /// discarded.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input.trim())
            .map_err(|e| Error::Config(format!("Invalid origin '{}': {}", input, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Origin must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(Error::Config(format!("Origin '{}' has no host", input)));
        }

        let serialized = url.origin().ascii_serialization();
        let base = Url::parse(&format!("{}/", serialized))
            .map_err(|e| Error::Config(format!("Invalid origin '{}': {}", input, e)))?;
        Ok(Self { base })
    }

    /// `https://host[:port]` without a trailing slash.
    pub fn as_str(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn is_secure(&self) -> bool {
        self.base.scheme() == "https"
    }

    /// Real-time endpoint for `path`: `wss://` on secure pages, `ws://`
    /// otherwise.
    pub fn websocket_url(&self, path: &str) -> String {
        let scheme = if self.is_secure() { "wss" } else { "ws" };
        let host = self.as_str().split_once("://").map_or("", |(_, rest)| rest);
        format!("{}://{}/{}", scheme, host, path.trim_start_matches('/'))
    }

    /// Makes an origin-relative URL absolute. URLs that already carry a
    /// scheme are returned unchanged.
    pub fn absolute(&self, url: &str) -> String {
        if Url::parse(url).is_ok() {
            return url.to_string();
        }
        match self.base.join(url) {
            Ok(joined) => joined.to_string(),
            Err(_) => format!("{}/{}", self.as_str(), url.trim_start_matches('/')),
        }
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Origin").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bridges and environment shared by every live service.
#[derive(Clone)]
pub struct CoreConfig {
    pub origin: Origin,
    pub settings_store: Arc<dyn SettingsStore>,
    pub socket_connector: Arc<dyn SocketConnector>,
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub clock: Arc<dyn Clock>,
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("origin", &self.origin)
            .field("settings_store", &"<SettingsStore>")
            .field("socket_connector", &"<SocketConnector>")
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "<HttpClient>"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }
        if self.event_buffer_size > 65_536 {
            return Err(Error::Config(
                "Event buffer size exceeds maximum of 65536".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required to persist the live session. \
                 Desktop: enable the 'desktop-shims' feature to use SqliteSettingsStore. \
                 Web: inject bridge_wasm::LocalStorageSettingsStore."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn socket_connector_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SocketConnector".to_string(),
        message: "SocketConnector implementation is required for the real-time channel. \
                 Desktop: enable the 'desktop-shims' feature to use TungsteniteConnector. \
                 Web: inject bridge_wasm::BrowserSocketConnector."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(data_dir: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use core_async::runtime;
    use std::thread;

    let data_dir = data_dir.ok_or_else(|| {
        Error::Config(
            "data_dir is required for the default SettingsStore. \
             Use .data_dir() or inject a store with .settings_store()."
                .to_string(),
        )
    })?;
    let path = data_dir.join("settings.db");

    let init_store = move || -> Result<SqliteSettingsStore> {
        runtime::block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create runtime for default settings store: {}",
                    e
                ))
            })?
            .map_err(|e| Error::Internal(format!("Failed to initialize default SettingsStore: {}", e)))
    };

    // block_on panics inside a runtime, so hop to a plain thread there.
    let store = if runtime::in_runtime() {
        thread::spawn(init_store).join().map_err(|_| {
            Error::Internal("Thread panicked while creating default SettingsStore".to_string())
        })??
    } else {
        init_store()?
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_data_dir: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_socket_connector() -> Result<Arc<dyn SocketConnector>> {
    Ok(Arc::new(bridge_desktop::TungsteniteConnector::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_socket_connector() -> Result<Arc<dyn SocketConnector>> {
    Err(socket_connector_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    let client = bridge_desktop::ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to initialize default HttpClient: {}", e)))?;
    Ok(Some(Arc::new(client)))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    origin: Option<String>,
    data_dir: Option<PathBuf>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    socket_connector: Option<Arc<dyn SocketConnector>>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the page origin (required), e.g. `https://live.example.com`.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Directory for the default SQLite settings database.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn socket_connector(mut self, connector: Arc<dyn SocketConnector>) -> Self {
        self.socket_connector = Some(connector);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Overrides the wall clock; tests use this to age session records.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Resolves defaults and validates.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for a missing or malformed origin, or an invalid
    ///   buffer size
    /// - [`Error::CapabilityMissing`] when a required bridge is neither
    ///   injected nor available as a desktop default
    pub fn build(self) -> Result<CoreConfig> {
        let origin = self.origin.ok_or_else(|| {
            Error::Config("Origin is required. Use .origin() to set it.".to_string())
        })?;
        let origin = Origin::parse(&origin)?;

        let socket_connector = match self.socket_connector {
            Some(connector) => connector,
            None => provide_default_socket_connector()?,
        };

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.data_dir)?,
        };

        let config = CoreConfig {
            origin,
            settings_store,
            socket_connector,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}
