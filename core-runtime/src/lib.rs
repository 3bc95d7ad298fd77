//! # Core Runtime Module
//!
//! Shared infrastructure for the live core crates:
//! - [`config`]: `CoreConfig` builder holding the host bridges and page origin
//! - [`events`]: typed broadcast bus for channel, media and session events
//! - [`logging`]: `tracing` subscriber setup and host log mirroring
//!
//! Domain crates (`core-media`, `core-channel`, `core-session`) depend on
//! this crate; nothing here depends on them.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, Origin};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
