//! Media element loading.
//!
//! A loader turns a URL into a ready-to-use media handle: the equivalent of
//! creating an `<img>` or `<video>` element, pointing it at the URL and
//! waiting until enough data is buffered to render. Loaders report failure
//! per URL; choosing the next URL to try belongs to the caller.

use std::any::Any;
use std::fmt;

use bytes::Bytes;

use crate::{error::Result, platform::PlatformSendSync};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    /// Classifies a MIME type such as `video/mp4; codecs=avc1`.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.split('/').next() {
            Some("image") => MediaKind::Image,
            Some("video") => MediaKind::Video,
            Some("audio") => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }

    /// Classifies by file extension, ignoring any query string or fragment.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let extension = path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("jpg" | "jpeg" | "png" | "gif" | "webp" | "avif" | "svg") => MediaKind::Image,
            Some("mp4" | "webm" | "mov" | "m4v" | "m3u8") => MediaKind::Video,
            Some("mp3" | "aac" | "ogg" | "wav" | "m4a") => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }
}

/// How a handle should be prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    pub muted: bool,
    pub looping: bool,
    /// Load off-screen without showing the element.
    pub hidden: bool,
}

impl LoadRequest {
    /// A visible load for an element currently on screen.
    pub fn display(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            muted: false,
            looping: false,
            hidden: false,
        }
    }

    /// A hidden, muted, looping load used to pre-warm a handle for reuse.
    pub fn preload(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            muted: true,
            looping: true,
            hidden: true,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
type ElementRef = std::sync::Arc<dyn Any + Send + Sync>;
#[cfg(target_arch = "wasm32")]
type ElementRef = std::rc::Rc<dyn Any>;

/// Platform object backing a handle, such as a detached `<video>` element in
/// the browser. The handle owns it; dropping the last clone releases it.
#[derive(Clone)]
pub struct MediaElement(ElementRef);

impl MediaElement {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new<T: Any + Send + Sync>(element: T) -> Self {
        Self(std::sync::Arc::new(element))
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new<T: Any>(element: T) -> Self {
        Self(std::rc::Rc::new(element))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0).downcast_ref::<T>()
    }
}

impl fmt::Debug for MediaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MediaElement(..)")
    }
}

/// Identity comparison: two elements are equal only if they are the same
/// object.
impl PartialEq for MediaElement {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(&*self.0 as *const dyn Any, &*other.0 as *const dyn Any)
    }
}

impl Eq for MediaElement {}

/// A loaded media element, detached from any document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    /// URL the handle was loaded from.
    pub url: String,
    pub kind: MediaKind,
    pub content_type: Option<String>,
    pub muted: bool,
    pub looping: bool,
    /// Buffered bytes. Enough to start playback; for images, the full file.
    /// Element-backed loaders leave this empty and let the element buffer.
    pub data: Bytes,
    /// Element the media was loaded into, when the platform has one.
    pub element: Option<MediaElement>,
}

impl MediaHandle {
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Loads media handles.
///
/// `load` resolves once the handle has buffered enough to render
/// (`canplaythrough` for video, `load` for images) and fails if the URL
/// cannot be loaded.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait MediaLoader: PlatformSendSync {
    async fn load(&self, request: &LoadRequest) -> Result<MediaHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_classification() {
        assert_eq!(MediaKind::from_content_type("image/webp"), MediaKind::Image);
        assert_eq!(
            MediaKind::from_content_type("video/mp4; codecs=avc1"),
            MediaKind::Video
        );
        assert_eq!(MediaKind::from_content_type("Audio/MPEG"), MediaKind::Audio);
        assert_eq!(
            MediaKind::from_content_type("application/octet-stream"),
            MediaKind::Other
        );
    }

    #[test]
    fn extension_classification_ignores_query() {
        assert_eq!(
            MediaKind::from_url("/uploads/photo.JPG?v=3"),
            MediaKind::Image
        );
        assert_eq!(
            MediaKind::from_url("https://cdn.example.com/clip.mp4#t=5"),
            MediaKind::Video
        );
        assert_eq!(MediaKind::from_url("/uploads/README"), MediaKind::Other);
        assert_eq!(MediaKind::from_url("/uploads.v2/file"), MediaKind::Other);
    }

    #[test]
    fn elements_compare_by_identity() {
        let a = MediaElement::new(String::from("video"));
        let b = MediaElement::new(String::from("video"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("video"));
        assert!(a.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn preload_request_is_hidden_muted_looping() {
        let request = LoadRequest::preload("/uploads/a.mp4");
        assert!(request.hidden && request.muted && request.looping);

        let request = LoadRequest::display("/uploads/a.mp4");
        assert!(!request.hidden && !request.muted && !request.looping);
    }
}
