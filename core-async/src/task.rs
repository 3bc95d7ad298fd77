//! Task spawning.
//!
//! Native targets hand futures to `tokio::spawn`, so they must be `Send`.
//! WebAssembly targets hand them to `spawn_local` on the single browser
//! thread and drop the `Send` requirement.
//!
//! Both targets share [`TaskHandle`], an abort handle built on
//! `futures::future::abortable`. Aborting takes effect at the task's next
//! suspension point and never runs the remainder of the future.

use futures::future::{AbortHandle, Abortable};
use std::future::Future;

/// Handle to a background task started with [`spawn_abortable`].
///
/// Dropping the handle does not cancel the task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    abort: AbortHandle,
}

impl TaskHandle {
    /// Cancels the task. Safe to call more than once, and after completion.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Returns true once [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }
}

/// Spawns a detached task on the Tokio runtime and returns its abort handle.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_abortable<F>(future: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let (abort, registration) = AbortHandle::new_pair();
    tokio::spawn(Abortable::new(future, registration));
    TaskHandle { abort }
}

/// Spawns a detached task on the browser event loop and returns its abort handle.
#[cfg(target_arch = "wasm32")]
pub fn spawn_abortable<F>(future: F) -> TaskHandle
where
    F: Future<Output = ()> + 'static,
{
    let (abort, registration) = AbortHandle::new_pair();
    wasm_bindgen_futures::spawn_local(async move {
        let _ = Abortable::new(future, registration).await;
    });
    TaskHandle { abort }
}
