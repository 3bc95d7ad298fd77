//! # Host Bridge Traits
//!
//! Platform contracts the live core depends on. Each trait is a capability
//! the core needs but cannot implement portably; desktop adapters live in
//! `bridge-desktop`, browser adapters in `bridge-wasm`.
//!
//! ## Traits
//!
//! ### Networking
//! - [`SocketConnector`](transport::SocketConnector) - Opens the real-time channel socket
//! - [`HttpClient`](http::HttpClient) - Plain HTTP requests
//! - [`MediaLoader`](media::MediaLoader) - Loads image/video handles from a URL
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Durable key-value storage
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Injectable wall clock
//! - [`LoggerSink`](time::LoggerSink) - Mirrors structured logs to the host
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//! | Web      | `bridge-wasm`       |
//!
//! ## Threading
//!
//! On native targets every bridge is `Send + Sync` so it can be shared across
//! Tokio tasks. On `wasm32` the bounds are lifted (see [`platform`]) because
//! browser handles are single-threaded.
//!
//! ## Errors
//!
//! All traits report failures as [`BridgeError`](error::BridgeError).
//! Adapters should map platform errors into the closest variant and keep the
//! original message.

pub mod error;
pub mod http;
pub mod media;
pub mod platform;
pub mod storage;
pub mod time;
pub mod transport;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use media::{LoadRequest, MediaElement, MediaHandle, MediaKind, MediaLoader};
pub use storage::SettingsStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
pub use transport::{SocketConnection, SocketConnector, SocketFrame, SocketSink, SocketStream};
