#![cfg(target_arch = "wasm32")]
//! Element-backed media loading in a real page.

use std::time::Duration;

use bridge_traits::media::{LoadRequest, MediaKind, MediaLoader};
use bridge_wasm::ElementMediaLoader;
use wasm_bindgen_test::*;
use web_sys::HtmlElement;

wasm_bindgen_test_configure!(run_in_browser);

const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

#[wasm_bindgen_test]
async fn image_loads_into_an_element() {
    let loader = ElementMediaLoader::new().unwrap();

    let handle = loader.load(&LoadRequest::display(PIXEL_PNG)).await.unwrap();

    assert_eq!(handle.kind, MediaKind::Image);
    assert!(handle.data.is_empty());
    let element = handle.element.as_ref().unwrap();
    assert_eq!(element.downcast_ref::<HtmlElement>().unwrap().tag_name(), "IMG");
}

#[wasm_bindgen_test]
async fn hidden_load_detaches_the_element() {
    let loader = ElementMediaLoader::new().unwrap();

    let handle = loader.load(&LoadRequest::preload(PIXEL_PNG)).await.unwrap();

    let element = handle.element.unwrap();
    let element = element.downcast_ref::<HtmlElement>().unwrap();
    assert!(!element.is_connected());
}

#[wasm_bindgen_test]
async fn undecodable_video_fails() {
    let loader = ElementMediaLoader::new()
        .unwrap()
        .with_timeout(Duration::from_secs(5));

    let result = loader
        .load(&LoadRequest::preload("data:video/mp4;base64,AAAA"))
        .await;

    assert!(result.is_err());
}
