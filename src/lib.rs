//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `core-media`). Host applications can
//! depend on `live-core-workspace` and enable the documented features without
//! needing to wire each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "wasm"))]
pub use core_service as service;

#[cfg(feature = "media-only")]
pub use core_media as media;
