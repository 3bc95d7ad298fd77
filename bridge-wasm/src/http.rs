//! `HttpClient` over the browser's `fetch`.
//!
//! Per-request timeouts are enforced with an `AbortController` raced against
//! a timer.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use bytes::Bytes;
use futures::{
    future::{select, Either},
    pin_mut,
};
use gloo_timers::future::TimeoutFuture;
use js_sys::{try_iter, Array, Uint8Array};
use std::{collections::HashMap, time::Duration};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, AbortSignal, Request, RequestInit, RequestMode, Response, Window};

use crate::error::{js_error, window};

/// Fetch-backed HTTP client bound to the current window.
pub struct FetchHttpClient {
    window: Window,
}

impl FetchHttpClient {
    pub fn new() -> BridgeResult<Self> {
        Ok(Self { window: window()? })
    }

    fn build_request(
        request: &HttpRequest,
        signal: Option<&AbortSignal>,
    ) -> BridgeResult<Request> {
        let init = RequestInit::new();
        init.set_method(match request.method {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
        });
        init.set_mode(RequestMode::Cors);
        if signal.is_some() {
            init.set_signal(signal);
        }

        if let Some(body) = &request.body {
            init.set_body(&JsValue::from(Uint8Array::from(body.as_ref())));
        }

        let headers = web_sys::Headers::new().map_err(|err| js_error("new Headers", err))?;
        for (key, value) in &request.headers {
            headers
                .set(key, value)
                .map_err(|err| js_error("Headers.set", err))?;
        }
        init.set_headers(&headers);

        Request::new_with_str_and_init(&request.url, &init)
            .map_err(|err| js_error("new Request", err))
    }

    async fn fetch(
        &self,
        request: &Request,
        deadline: Option<(Duration, AbortController)>,
    ) -> BridgeResult<Response> {
        let fetch = JsFuture::from(self.window.fetch_with_request(request));

        let result = match deadline {
            Some((timeout, controller)) => {
                let timer = TimeoutFuture::new(timeout.as_millis().min(u32::MAX as u128) as u32);
                pin_mut!(fetch);
                match select(fetch, timer).await {
                    Either::Left((response, _)) => response,
                    Either::Right((_, pending)) => {
                        controller.abort();
                        let _ = pending.await;
                        return Err(BridgeError::OperationFailed(format!(
                            "Request timed out after {} ms",
                            timeout.as_millis()
                        )));
                    }
                }
            }
            None => fetch.await,
        };

        // fetch only rejects on network failure; HTTP errors resolve normally
        let value = result.map_err(|err| {
            BridgeError::ConnectionFailed(crate::error::js_message(&err))
        })?;
        value
            .dyn_into::<Response>()
            .map_err(|_| BridgeError::OperationFailed("fetch returned non-Response".into()))
    }

    async fn read_body(response: &Response) -> BridgeResult<Bytes> {
        let promise = response
            .array_buffer()
            .map_err(|err| js_error("Response.arrayBuffer", err))?;
        let buffer = JsFuture::from(promise)
            .await
            .map_err(|err| js_error("read body", err))?;
        Ok(Bytes::from(Uint8Array::new(&buffer).to_vec()))
    }

    fn collect_headers(response: &Response) -> BridgeResult<HashMap<String, String>> {
        let iterator = try_iter(&JsValue::from(response.headers()))
            .map_err(|err| js_error("iterate headers", err))?
            .ok_or_else(|| BridgeError::OperationFailed("Headers not iterable".into()))?;

        let mut map = HashMap::new();
        for entry in iterator {
            let pair = Array::from(&entry.map_err(|err| js_error("header entry", err))?);
            if let (Some(key), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
                map.insert(key.to_ascii_lowercase(), value);
            }
        }
        Ok(map)
    }
}

#[async_trait(?Send)]
impl HttpClient for FetchHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let deadline = match request.timeout {
            Some(timeout) => Some((
                timeout,
                AbortController::new().map_err(|err| js_error("new AbortController", err))?,
            )),
            None => None,
        };

        let signal = deadline.as_ref().map(|(_, controller)| controller.signal());
        let js_request = Self::build_request(&request, signal.as_ref())?;
        let response = self.fetch(&js_request, deadline).await?;

        let headers = Self::collect_headers(&response)?;
        let body = Self::read_body(&response).await?;
        tracing::debug!(url = %request.url, status = response.status(), "fetch completed");

        Ok(HttpResponse {
            status: response.status(),
            headers,
            body,
        })
    }
}
