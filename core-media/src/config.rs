//! # Media Configuration
//!
//! Paths the media server exposes and the size of the handle cache.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MediaError, Result};

/// Media resolution and caching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Canonical prefix resolved paths are served under.
    ///
    /// Default: `/uploads`.
    #[serde(default = "default_media_prefix")]
    pub media_prefix: String,

    /// Prefixes removed from stored paths before the canonical prefix is
    /// applied. Stored paths were written by several generations of the
    /// upload handler and may carry either.
    ///
    /// Default: `/uploads/`, `/api/media/`.
    #[serde(default = "default_strip_prefixes")]
    pub strip_prefixes: Vec<String>,

    /// Substring of the canonical path identifying files uploaded to an
    /// application instance (as opposed to cloud storage). Such files get
    /// the proxy candidate first.
    ///
    /// Default: `uploads/`.
    #[serde(default = "default_uploads_marker")]
    pub uploads_marker: String,

    /// Cross-instance proxy prefix.
    ///
    /// Default: `/api/media-proxy`.
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,

    /// Query parameter carrying the cache version tag.
    ///
    /// Default: `v`.
    #[serde(default = "default_version_param")]
    pub version_param: String,

    /// Tag used for categories that have not been assigned one.
    ///
    /// Default: `1`.
    #[serde(default = "default_version_tag")]
    pub default_version_tag: String,

    /// Retained handles before the oldest is evicted.
    ///
    /// Default: 10.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Per-request timeout for the HTTP loader.
    ///
    /// Default: 20 seconds.
    #[serde(default = "default_load_timeout")]
    pub load_timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            media_prefix: default_media_prefix(),
            strip_prefixes: default_strip_prefixes(),
            uploads_marker: default_uploads_marker(),
            proxy_prefix: default_proxy_prefix(),
            version_param: default_version_param(),
            default_version_tag: default_version_tag(),
            cache_capacity: default_cache_capacity(),
            load_timeout: default_load_timeout(),
        }
    }
}

impl MediaConfig {
    pub fn with_media_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.media_prefix = prefix.into();
        self
    }

    pub fn with_strip_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strip_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_uploads_marker(mut self, marker: impl Into<String>) -> Self {
        self.uploads_marker = marker.into();
        self
    }

    pub fn with_proxy_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.proxy_prefix = prefix.into();
        self
    }

    pub fn with_version_param(mut self, param: impl Into<String>) -> Self {
        self.version_param = param.into();
        self
    }

    pub fn with_default_version_tag(mut self, tag: impl Into<String>) -> Self {
        self.default_version_tag = tag.into();
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, prefix) in [
            ("media_prefix", &self.media_prefix),
            ("proxy_prefix", &self.proxy_prefix),
        ] {
            if !prefix.starts_with('/') {
                return Err(MediaError::InvalidConfig(format!(
                    "{} must start with '/', got '{}'",
                    name, prefix
                )));
            }
        }

        if self.strip_prefixes.iter().any(|p| p.trim_matches('/').is_empty()) {
            return Err(MediaError::InvalidConfig(
                "strip_prefixes cannot contain empty entries".to_string(),
            ));
        }

        if self.uploads_marker.is_empty() {
            return Err(MediaError::InvalidConfig(
                "uploads_marker cannot be empty".to_string(),
            ));
        }

        if self.version_param.is_empty()
            || self
                .version_param
                .contains(|c: char| matches!(c, '=' | '&' | '?' | '#') || c.is_whitespace())
        {
            return Err(MediaError::InvalidConfig(format!(
                "version_param '{}' is not a valid query key",
                self.version_param
            )));
        }

        if self.default_version_tag.trim().is_empty() {
            return Err(MediaError::InvalidConfig(
                "default_version_tag cannot be empty".to_string(),
            ));
        }

        if self.cache_capacity == 0 {
            return Err(MediaError::InvalidConfig(
                "cache_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_media_prefix() -> String {
    "/uploads".to_string()
}

fn default_strip_prefixes() -> Vec<String> {
    vec!["/uploads/".to_string(), "/api/media/".to_string()]
}

fn default_uploads_marker() -> String {
    "uploads/".to_string()
}

fn default_proxy_prefix() -> String {
    "/api/media-proxy".to_string()
}

fn default_version_param() -> String {
    "v".to_string()
}

fn default_version_tag() -> String {
    "1".to_string()
}

fn default_cache_capacity() -> usize {
    10
}

fn default_load_timeout() -> Duration {
    Duration::from_secs(20)
}
