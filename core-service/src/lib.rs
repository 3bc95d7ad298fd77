//! Core service façade and bootstrap helpers.
//!
//! Wires the host bridges into the live core: the real-time channel, media
//! resolution with fallback and caching, and the persisted session
//! indicator. Desktop hosts enable `desktop-shims` (SQLite, reqwest and
//! tungstenite defaults); browser builds enable `wasm` and use
//! [`bootstrap_wasm`].
//!
//! Services are plain values created by [`CoreService::init`] and torn down
//! by [`CoreService::dispose`]. Nothing is global.

pub mod config;
pub mod error;

pub use config::ServiceConfig;
pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::media::MediaLoader;
use core_channel::ChannelManager;
use core_media::{
    CacheVersionRegistry, FallbackOutcome, FallbackRequest, FallbackResolver, HttpMediaLoader,
    MediaCategory, MediaObjectCache, MediaResolver,
};
use core_runtime::config::Origin;
use core_runtime::events::{EventBus, EventStream};
use core_session::SessionStateStore;
use tracing::{info, instrument, warn};

#[cfg(feature = "wasm")]
pub use bridge_wasm::WasmBridgeConfig;
#[cfg(feature = "wasm")]
use bridge_wasm::{build_wasm_bridges, WasmBridgeSet};

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share every service.
#[derive(Clone)]
pub struct CoreService {
    origin: Origin,
    events: EventBus,
    versions: CacheVersionRegistry,
    resolver: MediaResolver,
    media_cache: MediaObjectCache,
    fallback: FallbackResolver,
    channel: ChannelManager,
    session: Arc<SessionStateStore>,
}

impl CoreService {
    /// Builds every service and restores the persisted session.
    ///
    /// The channel is not connected; call `channel().connect()` when the UI
    /// needs live events.
    #[instrument(skip(config), fields(origin = %config.core.origin))]
    pub async fn init(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let ServiceConfig {
            core,
            channel,
            media,
            session,
            media_loader,
        } = config;

        let events = EventBus::new(core.event_buffer_size);
        let loader = resolve_media_loader(media_loader, &core, &media)?;

        let versions = CacheVersionRegistry::new(media.default_version_tag.clone())
            .with_event_bus(events.clone());
        let cache_capacity = media.cache_capacity;
        let resolver = MediaResolver::new(Arc::new(media), versions.clone());
        let media_cache = MediaObjectCache::new(Arc::clone(&loader), cache_capacity)
            .with_event_bus(events.clone());
        let fallback = FallbackResolver::new(resolver.clone(), loader)
            .with_cache(media_cache.clone())
            .with_event_bus(events.clone());

        let channel = ChannelManager::new(
            channel,
            &core.origin,
            Arc::clone(&core.socket_connector),
            events.clone(),
        );

        let session = SessionStateStore::new(
            Arc::clone(&core.settings_store),
            Arc::clone(&core.clock),
            session,
        )
        .with_event_bus(events.clone());
        let restored = match session.initialize().await {
            Ok(restored) => restored,
            Err(e) => {
                warn!(error = %e, "Session restore failed, starting inactive");
                None
            }
        };

        info!(
            endpoint = channel.endpoint(),
            session_restored = restored.is_some(),
            "Core services initialized"
        );

        Ok(Self {
            origin: core.origin,
            events,
            versions,
            resolver,
            media_cache,
            fallback,
            channel,
            session: Arc::new(session),
        })
    }

    /// Disconnects the channel, drops its handlers and empties the media
    /// cache. The persisted session is left alone.
    pub fn dispose(&self) {
        self.channel.dispose();
        self.media_cache.clear();
        info!("Core services disposed");
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn versions(&self) -> &CacheVersionRegistry {
        &self.versions
    }

    pub fn resolver(&self) -> &MediaResolver {
        &self.resolver
    }

    pub fn media_cache(&self) -> &MediaObjectCache {
        &self.media_cache
    }

    pub fn fallback(&self) -> &FallbackResolver {
        &self.fallback
    }

    pub fn channel(&self) -> &ChannelManager {
        &self.channel
    }

    pub fn session(&self) -> &SessionStateStore {
        &self.session
    }

    /// Shorthand for `resolver().resolve(..)`.
    pub fn resolve_media(&self, stored_path: &str, category: MediaCategory) -> String {
        self.resolver.resolve(stored_path, category)
    }

    /// Shorthand for `fallback().load(..)`.
    pub async fn load_media(&self, request: &FallbackRequest) -> FallbackOutcome {
        self.fallback.load(request).await
    }
}

fn resolve_media_loader(
    injected: Option<Arc<dyn MediaLoader>>,
    core: &core_runtime::CoreConfig,
    media: &core_media::MediaConfig,
) -> Result<Arc<dyn MediaLoader>> {
    if let Some(loader) = injected {
        return Ok(loader);
    }
    match &core.http_client {
        Some(http) => Ok(Arc::new(HttpMediaLoader::new(
            Arc::clone(http),
            core.origin.clone(),
            media.load_timeout,
        ))),
        None => Err(CoreError::CapabilityMissing {
            capability: "MediaLoader".to_string(),
            message: "Inject a MediaLoader with ServiceConfig::with_media_loader() \
                      or provide an HttpClient in CoreConfig."
                .to_string(),
        }),
    }
}

/// Convenience bootstrapper for WebAssembly hosts.
///
/// ```
/// # #[cfg(feature = "wasm")]
/// # async fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_wasm, WasmBridgeConfig};
///
/// let core = bootstrap_wasm(WasmBridgeConfig::new("live")).await?;
/// core.channel().connect();
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "wasm")]
pub async fn bootstrap_wasm(config: WasmBridgeConfig) -> Result<CoreService> {
    let WasmBridgeSet {
        origin,
        http_client,
        socket_connector,
        settings_store,
        media_loader,
    } = build_wasm_bridges(config)
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

    let core = core_runtime::CoreConfig::builder()
        .origin(origin)
        .settings_store(settings_store)
        .socket_connector(socket_connector)
        .http_client(http_client)
        .build()?;
    CoreService::init(ServiceConfig::new(core).with_media_loader(media_loader)).await
}
