//! Timers.
//!
//! Native builds re-export `tokio::time`, which also lets tests drive the
//! clock with `start_paused`. WebAssembly builds sleep through `setTimeout`
//! via `gloo-timers`.

pub use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::time::{sleep, timeout, Instant};

#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    gloo_timers::future::sleep(duration).await
}

/// Error returned by [`timeout`] when the deadline passes first.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed;

#[cfg(target_arch = "wasm32")]
impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("deadline has elapsed")
    }
}

#[cfg(target_arch = "wasm32")]
impl std::error::Error for Elapsed {}

/// Runs `future` until it completes or `duration` passes.
#[cfg(target_arch = "wasm32")]
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, Elapsed>
where
    F: std::future::Future,
{
    use futures::future::{select, Either};

    let deadline = sleep(duration);
    futures::pin_mut!(future);
    futures::pin_mut!(deadline);

    match select(future, deadline).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(_) => Err(Elapsed),
    }
}
