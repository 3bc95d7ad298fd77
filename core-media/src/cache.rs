//! # Media Object Cache
//!
//! Keeps a small number of pre-warmed media handles keyed by resolved URL so
//! that revisiting a piece of media (scrolling back in a feed, reopening a
//! story) does not pay for another network fetch and decode.
//!
//! ## Behavior
//!
//! - `preload` returns immediately for cached URLs, joins an in-flight load
//!   for the same URL, or starts a hidden, muted, looping load.
//! - `get` never fetches.
//! - Eviction is insertion-ordered: reads do not refresh an entry.
//! - `clear` forgets entries and in-flight tracking. Loads already issued
//!   run to completion but their results are not stored.
//!
//! The state lock is never held across an await.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use bridge_traits::media::{LoadRequest, MediaHandle, MediaLoader};
use core_runtime::events::{CoreEvent, EventBus, MediaEvent};
use futures::future::{FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{MediaError, Result};

#[cfg(not(target_arch = "wasm32"))]
type LoadFuture = futures::future::BoxFuture<'static, Result<Arc<MediaHandle>>>;
#[cfg(target_arch = "wasm32")]
type LoadFuture = futures::future::LocalBoxFuture<'static, Result<Arc<MediaHandle>>>;

type SharedLoad = Shared<LoadFuture>;

struct InFlight {
    id: u64,
    load: SharedLoad,
}

struct CacheState {
    // Only ever read through `peek`, which keeps the order FIFO.
    entries: LruCache<String, Arc<MediaHandle>>,
    in_flight: HashMap<String, InFlight>,
    next_load_id: u64,
}

impl CacheState {
    /// Inserts or replaces an entry, returning the URL evicted to make room.
    fn insert(&mut self, url: String, handle: Arc<MediaHandle>) -> Option<String> {
        if let Some(existing) = self.entries.peek_mut(&url) {
            *existing = handle;
            return None;
        }
        self.entries
            .push(url, handle)
            .map(|(evicted_url, _)| evicted_url)
    }
}

/// Bounded cache of loaded media handles.
///
/// Cloning is cheap; clones share entries.
#[derive(Clone)]
pub struct MediaObjectCache {
    state: Arc<Mutex<CacheState>>,
    loader: Arc<dyn MediaLoader>,
    events: Option<EventBus>,
    capacity: NonZeroUsize,
}

impl MediaObjectCache {
    pub fn new(loader: Arc<dyn MediaLoader>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                in_flight: HashMap::new(),
                next_load_id: 0,
            })),
            loader,
            events: None,
            capacity,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Loads `url` into the cache unless it is already there.
    ///
    /// Concurrent calls for the same URL share one underlying load and all
    /// observe its result.
    pub async fn preload(&self, url: &str) -> Result<Arc<MediaHandle>> {
        let (id, load) = {
            let mut state = self.state.lock();
            if let Some(handle) = state.entries.peek(url) {
                debug!(url, "Preload hit");
                return Ok(Arc::clone(handle));
            }
            match state.in_flight.get(url) {
                Some(in_flight) => {
                    debug!(url, "Joining in-flight preload");
                    (in_flight.id, in_flight.load.clone())
                }
                None => {
                    let id = state.next_load_id;
                    state.next_load_id += 1;
                    let load = self.start_load(url);
                    state.in_flight.insert(
                        url.to_string(),
                        InFlight {
                            id,
                            load: load.clone(),
                        },
                    );
                    (id, load)
                }
            }
        };

        let result = load.await;

        let evicted = {
            let mut state = self.state.lock();
            // A clear() or a newer load for the same URL invalidates this one.
            let current = state.in_flight.get(url).map_or(false, |f| f.id == id);
            if !current {
                None
            } else {
                state.in_flight.remove(url);
                match &result {
                    Ok(handle) => state.insert(url.to_string(), Arc::clone(handle)),
                    Err(_) => None,
                }
            }
        };
        self.report_eviction(evicted);

        if let Err(error) = &result {
            warn!(url, error = %error, "Preload failed");
        }
        result
    }

    /// Cached handle for `url`. Never starts a load.
    pub fn get(&self, url: &str) -> Option<Arc<MediaHandle>> {
        self.state.lock().entries.peek(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.state.lock().entries.contains(url)
    }

    /// Retains a handle loaded elsewhere, e.g. by the fallback chain.
    pub fn store(&self, url: impl Into<String>, handle: Arc<MediaHandle>) {
        let evicted = self.state.lock().insert(url.into(), handle);
        self.report_eviction(evicted);
    }

    /// Drops every entry and forgets in-flight loads.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        debug!(dropped, "Media cache cleared");
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    fn start_load(&self, url: &str) -> SharedLoad {
        let loader = Arc::clone(&self.loader);
        let request = LoadRequest::preload(url);
        let load = async move {
            loader
                .load(&request)
                .await
                .map(Arc::new)
                .map_err(|error| MediaError::load_failed(request.url.clone(), error))
        };

        #[cfg(not(target_arch = "wasm32"))]
        let load: LoadFuture = load.boxed();
        #[cfg(target_arch = "wasm32")]
        let load: LoadFuture = load.boxed_local();

        load.shared()
    }

    fn report_eviction(&self, evicted: Option<String>) {
        let Some(url) = evicted else { return };
        debug!(url = %url, capacity = self.capacity.get(), "Evicted oldest media handle");
        if let Some(events) = &self.events {
            events.publish(CoreEvent::Media(MediaEvent::Evicted { url }));
        }
    }
}

impl std::fmt::Debug for MediaObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MediaObjectCache")
            .field("len", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::media::MediaKind;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Loader that yields a few times before completing, failing for URLs
    /// containing "missing".
    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl CountingLoader {
        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaLoader for CountingLoader {
        async fn load(&self, request: &LoadRequest) -> BridgeResult<MediaHandle> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            if request.url.contains("missing") {
                return Err(BridgeError::OperationFailed("HTTP 404".into()));
            }
            Ok(MediaHandle {
                url: request.url.clone(),
                kind: MediaKind::from_url(&request.url),
                content_type: None,
                muted: request.muted,
                looping: request.looping,
                data: Bytes::from_static(b"frame"),
                element: None,
            })
        }
    }

    fn cache(capacity: usize) -> (Arc<CountingLoader>, MediaObjectCache) {
        let loader = Arc::new(CountingLoader::default());
        let cache = MediaObjectCache::new(loader.clone(), capacity);
        (loader, cache)
    }

    #[tokio::test]
    async fn preload_stores_hidden_handle() {
        let (loader, cache) = cache(10);

        let handle = cache.preload("/uploads/a.mp4?v=1").await.unwrap();
        assert!(handle.muted && handle.looping);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.in_flight(), 0);

        let again = cache.preload("/uploads/a.mp4?v=1").await.unwrap();
        assert!(Arc::ptr_eq(&handle, &again));
        assert_eq!(loader.loads(), 1);
    }

    #[tokio::test]
    async fn concurrent_preloads_share_one_load() {
        let (loader, cache) = cache(10);

        let (a, b) = futures::join!(cache.preload("/uploads/a.mp4"), cache.preload("/uploads/a.mp4"));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(loader.loads(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_preload_is_not_cached_and_can_retry() {
        let (loader, cache) = cache(10);

        let err = cache.preload("/uploads/missing.jpg").await.unwrap_err();
        assert!(matches!(err, MediaError::LoadFailed { .. }));
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);

        let _ = cache.preload("/uploads/missing.jpg").await;
        assert_eq!(loader.loads(), 2);
    }

    #[tokio::test]
    async fn get_never_fetches() {
        let (loader, cache) = cache(10);
        assert!(cache.get("/uploads/a.jpg").is_none());
        assert_eq!(loader.loads(), 0);
    }

    #[tokio::test]
    async fn eviction_is_insertion_ordered() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let (_, cache) = cache(2);
        let cache = cache.with_event_bus(bus);

        cache.preload("/uploads/1.jpg").await.unwrap();
        cache.preload("/uploads/2.jpg").await.unwrap();
        // Reads must not protect the oldest entry.
        assert!(cache.get("/uploads/1.jpg").is_some());
        cache.preload("/uploads/3.jpg").await.unwrap();

        assert!(!cache.contains("/uploads/1.jpg"));
        assert!(cache.contains("/uploads/2.jpg"));
        assert!(cache.contains("/uploads/3.jpg"));
        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Media(MediaEvent::Evicted {
                url: "/uploads/1.jpg".into()
            })
        );
    }

    #[tokio::test]
    async fn replacing_an_entry_keeps_its_position() {
        let (_, cache) = cache(2);
        let handle = cache.preload("/uploads/1.jpg").await.unwrap();
        cache.preload("/uploads/2.jpg").await.unwrap();

        cache.store("/uploads/1.jpg", handle);
        cache.store("/uploads/3.jpg", cache.get("/uploads/2.jpg").unwrap());

        assert!(!cache.contains("/uploads/1.jpg"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn clear_discards_in_flight_results() {
        let (_, cache) = cache(10);

        let pending = cache.preload("/uploads/a.jpg");
        let clear = async {
            tokio::task::yield_now().await;
            cache.clear();
        };
        let (result, ()) = futures::join!(pending, clear);

        // The issued load still completes for its caller.
        assert!(result.is_ok());
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (_, cache) = cache(0);
        assert_eq!(cache.capacity(), 1);
    }
}
