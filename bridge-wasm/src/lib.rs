//! Browser Bridge Implementations
//!
//! `wasm32-unknown-unknown` adapters for the `bridge-traits` contracts, built
//! on `web-sys`:
//!
//! - [`LocalStorageSettingsStore`]: namespaced `localStorage`
//! - [`FetchHttpClient`]: `fetch` with `AbortController` timeouts
//! - [`BrowserSocketConnector`]: the page's `WebSocket`
//! - [`ElementMediaLoader`]: `<img>` / `<video>` / `<audio>` preloading
//! - [`page_origin`]: `window.location.origin`
//!
//! # Examples
//!
//! ```ignore
//! use bridge_wasm::{build_wasm_bridges, WasmBridgeConfig};
//!
//! let bridges = build_wasm_bridges(WasmBridgeConfig::new("my-app"))?;
//! // bridges.origin, bridges.socket_connector, ...
//! ```

#![cfg(target_arch = "wasm32")]

pub mod bootstrap;
mod error;
pub mod http;
pub mod location;
pub mod media;
pub mod socket;
pub mod storage;

pub use bootstrap::{build_wasm_bridges, WasmBridgeConfig, WasmBridgeSet};
pub use http::FetchHttpClient;
pub use location::page_origin;
pub use media::ElementMediaLoader;
pub use socket::BrowserSocketConnector;
pub use storage::LocalStorageSettingsStore;
