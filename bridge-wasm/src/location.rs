//! Page origin discovery.

use bridge_traits::error::Result as BridgeResult;

use crate::error::{js_error, window};

/// The serving page's origin, e.g. `https://live.example.com`.
///
/// The channel endpoint and relative media URLs are resolved against it.
pub fn page_origin() -> BridgeResult<String> {
    window()?
        .location()
        .origin()
        .map_err(|err| js_error("location.origin", err))
}
