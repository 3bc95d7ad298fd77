//! # Fallback Resolution Chain
//!
//! A media element gets an ordered list of candidate URLs and tries them one
//! at a time until one loads or the list runs out.
//!
//! The state machine is a pure reducer, [`FallbackAttempt::apply`], so it can
//! be driven by a UI event loop (`error` / `load` events on an element) or by
//! [`FallbackResolver::load`], which awaits a [`MediaLoader`] per candidate.
//!
//! ```text
//!   Loading(0) --fail--> Loading(1) --fail--> ... --fail--> Exhausted
//!       |                    |
//!       +------ok-----> Loaded <------ok-------+
//! ```

use std::sync::Arc;

use bridge_traits::media::{LoadRequest, MediaHandle, MediaLoader};
use core_runtime::events::{CoreEvent, EventBus, MediaEvent};
use tracing::{debug, info, instrument, warn};

use crate::cache::MediaObjectCache;
use crate::error::MediaError;
use crate::resolver::MediaResolver;
use crate::version::MediaCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPhase {
    Loading,
    Loaded,
    /// Every candidate failed. The element should show a placeholder.
    Exhausted,
}

/// Outcome reported by the element for the current candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackEvent {
    LoadSucceeded,
    LoadFailed,
}

/// What the element should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Point the element at `url`.
    Retry { cursor: usize, url: String },
    Loaded { cursor: usize },
    Exhausted { attempts: usize },
    /// The attempt was already terminal.
    Ignored,
}

/// Per-element fallback state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackAttempt {
    candidates: Vec<String>,
    cursor: usize,
    phase: FallbackPhase,
}

impl FallbackAttempt {
    /// Starts at the first candidate. `None` if there are no candidates.
    pub fn new(candidates: Vec<String>) -> Option<Self> {
        if candidates.is_empty() {
            return None;
        }
        Some(Self {
            candidates,
            cursor: 0,
            phase: FallbackPhase::Loading,
        })
    }

    pub fn current_url(&self) -> &str {
        &self.candidates[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn phase(&self) -> FallbackPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase != FallbackPhase::Loading
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Advances the state machine. Terminal attempts ignore further events,
    /// and the cursor never moves backwards.
    pub fn apply(&mut self, event: FallbackEvent) -> Transition {
        if self.is_terminal() {
            return Transition::Ignored;
        }

        match event {
            FallbackEvent::LoadSucceeded => {
                self.phase = FallbackPhase::Loaded;
                Transition::Loaded {
                    cursor: self.cursor,
                }
            }
            FallbackEvent::LoadFailed if self.cursor + 1 < self.candidates.len() => {
                self.cursor += 1;
                Transition::Retry {
                    cursor: self.cursor,
                    url: self.candidates[self.cursor].clone(),
                }
            }
            FallbackEvent::LoadFailed => {
                self.phase = FallbackPhase::Exhausted;
                Transition::Exhausted {
                    attempts: self.candidates.len(),
                }
            }
        }
    }
}

/// A media element's reference and display options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackRequest {
    pub stored_path: String,
    pub category: MediaCategory,
    /// Caller-supplied last resort, e.g. a cloud copy of the file.
    pub alternate: Option<String>,
    /// Hand the loaded handle to the media cache.
    pub retain: bool,
}

impl FallbackRequest {
    pub fn new(stored_path: impl Into<String>, category: MediaCategory) -> Self {
        Self {
            stored_path: stored_path.into(),
            category,
            alternate: None,
            retain: false,
        }
    }

    pub fn with_alternate(mut self, alternate: impl Into<String>) -> Self {
        self.alternate = Some(alternate.into());
        self
    }

    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }
}

#[derive(Debug, Clone)]
pub enum FallbackOutcome {
    Loaded {
        url: String,
        cursor: usize,
        handle: Arc<MediaHandle>,
    },
    Unavailable {
        stored_path: String,
        attempts: usize,
        last_error: Option<MediaError>,
    },
}

impl FallbackOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FallbackOutcome::Loaded { .. })
    }

    pub fn handle(&self) -> Option<&Arc<MediaHandle>> {
        match self {
            FallbackOutcome::Loaded { handle, .. } => Some(handle),
            FallbackOutcome::Unavailable { .. } => None,
        }
    }
}

/// Drives [`FallbackAttempt`] against a [`MediaLoader`].
#[derive(Clone)]
pub struct FallbackResolver {
    resolver: MediaResolver,
    loader: Arc<dyn MediaLoader>,
    cache: Option<MediaObjectCache>,
    events: Option<EventBus>,
}

impl FallbackResolver {
    pub fn new(resolver: MediaResolver, loader: Arc<dyn MediaLoader>) -> Self {
        Self {
            resolver,
            loader,
            cache: None,
            events: None,
        }
    }

    /// Consult and populate `cache`.
    pub fn with_cache(mut self, cache: MediaObjectCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn attempt_for(&self, request: &FallbackRequest) -> Option<FallbackAttempt> {
        FallbackAttempt::new(self.resolver.build_candidates(
            &request.stored_path,
            request.category,
            request.alternate.as_deref(),
        ))
    }

    /// Tries each candidate in order. Exhaustion is an outcome, not an
    /// error.
    #[instrument(skip(self, request), fields(stored_path = %request.stored_path, category = %request.category))]
    pub async fn load(&self, request: &FallbackRequest) -> FallbackOutcome {
        let Some(mut attempt) = self.attempt_for(request) else {
            warn!("No candidates for media reference");
            return self.unavailable(request, 0, None);
        };

        loop {
            let cursor = attempt.cursor();
            let url = attempt.current_url().to_string();

            if let Some(handle) = self.cache.as_ref().and_then(|cache| cache.get(&url)) {
                debug!(%url, cursor, "Candidate served from cache");
                attempt.apply(FallbackEvent::LoadSucceeded);
                return FallbackOutcome::Loaded {
                    url,
                    cursor,
                    handle,
                };
            }

            match self.loader.load(&LoadRequest::display(url.clone())).await {
                Ok(handle) => {
                    let handle = Arc::new(handle);
                    attempt.apply(FallbackEvent::LoadSucceeded);
                    if request.retain {
                        if let Some(cache) = &self.cache {
                            cache.store(url.clone(), Arc::clone(&handle));
                        }
                    }
                    debug!(%url, cursor, "Candidate loaded");
                    return FallbackOutcome::Loaded {
                        url,
                        cursor,
                        handle,
                    };
                }
                Err(error) => {
                    warn!(%url, cursor, error = %error, "Candidate failed");
                    self.publish(MediaEvent::CandidateFailed {
                        url: url.clone(),
                        cursor,
                    });
                    let last_error = MediaError::load_failed(url, error);

                    if let Transition::Exhausted { attempts } =
                        attempt.apply(FallbackEvent::LoadFailed)
                    {
                        return self.unavailable(request, attempts, Some(last_error));
                    }
                }
            }
        }
    }

    fn unavailable(
        &self,
        request: &FallbackRequest,
        attempts: usize,
        last_error: Option<MediaError>,
    ) -> FallbackOutcome {
        info!(attempts, "Media unavailable, showing placeholder");
        self.publish(MediaEvent::Unavailable {
            stored_path: request.stored_path.clone(),
        });
        FallbackOutcome::Unavailable {
            stored_path: request.stored_path.clone(),
            attempts,
            last_error,
        }
    }

    fn publish(&self, event: MediaEvent) {
        if let Some(events) = &self.events {
            events.publish(CoreEvent::Media(event));
        }
    }
}
