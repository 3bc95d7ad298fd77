//! Runtime-agnostic async shim for the live core.
//!
//! Native builds run on Tokio; WebAssembly builds run on the browser event
//! loop through `wasm-bindgen-futures`. Every `core-*` crate goes through this
//! crate for spawning, timers and synchronization so the channel and media
//! layers compile unchanged for both targets.
//!
//! # Modules
//!
//! - `task`: spawning, including abortable background tasks
//! - `time`: sleep, timeout and `Duration`
//! - `sync`: channels and async-aware primitives
//! - `runtime`: blocking entry points for native hosts
//!
//! ```rust,no_run
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn_abortable(async {
//!         sleep(Duration::from_secs(2)).await;
//!     });
//!
//!     // Cancel before the timer fires.
//!     handle.abort();
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::{spawn_abortable, TaskHandle};
pub use time::{sleep, Duration};
