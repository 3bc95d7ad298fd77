//! # Core Session Module
//!
//! Durable "live session active" state for the broadcaster UI. See
//! [`SessionStateStore`].

pub mod config;
pub mod error;
pub mod store;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use store::{SessionRecord, SessionStateStore};
