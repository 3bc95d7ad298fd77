//! Synchronization primitives.
//!
//! `tokio::sync` does not depend on the Tokio scheduler, so the same types
//! serve native and WebAssembly builds. Downstream crates import them from
//! here rather than from `tokio` directly.

pub use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify};
