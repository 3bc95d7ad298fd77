//! Conversion of JavaScript exceptions into bridge errors.

use bridge_traits::error::BridgeError;
use wasm_bindgen::{JsCast, JsValue};

/// Extracts a readable message from a thrown JavaScript value.
pub(crate) fn js_message(err: &JsValue) -> String {
    if let Some(text) = err.as_string() {
        text
    } else if let Some(js_err) = err.dyn_ref::<js_sys::Error>() {
        js_err.message().into()
    } else {
        format!("{err:?}")
    }
}

/// Wraps a thrown value as [`BridgeError::OperationFailed`], prefixed with
/// the operation that threw.
pub(crate) fn js_error(context: &str, err: JsValue) -> BridgeError {
    BridgeError::OperationFailed(format!("{context}: {}", js_message(&err)))
}

pub(crate) fn window() -> Result<web_sys::Window, BridgeError> {
    web_sys::window().ok_or_else(|| BridgeError::NotAvailable("window".into()))
}
