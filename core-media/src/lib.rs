//! # Core Media Module
//!
//! Resolution of stored media references into loadable URLs, with graceful
//! degradation when a copy is missing and a small cache of pre-warmed
//! handles.
//!
//! ## Components
//!
//! - [`CacheVersionRegistry`]: per-category cache-busting tags
//! - [`MediaResolver`]: stored path to canonical, versioned URL
//! - [`FallbackAttempt`] / [`FallbackResolver`]: proxy, direct, then
//!   alternate candidate chain
//! - [`MediaObjectCache`]: bounded FIFO cache with de-duplicated preloads
//! - [`HttpMediaLoader`]: `MediaLoader` over the `HttpClient` bridge
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use core_media::{CacheVersionRegistry, MediaCategory, MediaConfig, MediaResolver};
//!
//! let versions = CacheVersionRegistry::default();
//! versions.set(MediaCategory::Avatars, "3").unwrap();
//!
//! let resolver = MediaResolver::new(Arc::new(MediaConfig::default()), versions);
//! assert_eq!(
//!     resolver.resolve("/api/media/uploads/me.png", MediaCategory::Avatars),
//!     "/uploads/me.png?v=3"
//! );
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod loader;
pub mod resolver;
pub mod version;

pub use cache::MediaObjectCache;
pub use config::MediaConfig;
pub use error::{MediaError, Result};
pub use fallback::{
    FallbackAttempt, FallbackEvent, FallbackOutcome, FallbackPhase, FallbackRequest,
    FallbackResolver, Transition,
};
pub use loader::HttpMediaLoader;
pub use resolver::MediaResolver;
pub use version::{CacheVersionRegistry, MediaCategory};
