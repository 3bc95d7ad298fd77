//! Runtime entry points for native hosts.
//!
//! WebAssembly hosts never block; the browser drives every future, so only
//! `spawn_local` is exported there.

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs `future` to completion on a throwaway current-thread runtime.
///
/// Fails only when the runtime itself cannot be built.
#[cfg(not(target_arch = "wasm32"))]
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

/// Returns true when called from inside a Tokio runtime.
#[cfg(not(target_arch = "wasm32"))]
pub fn in_runtime() -> bool {
    Handle::try_current().is_ok()
}

#[cfg(target_arch = "wasm32")]
pub use wasm_bindgen_futures::spawn_local;
