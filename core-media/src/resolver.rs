//! Media resolver.
//!
//! Turns a stored media path into the URL the page should request. Stored
//! paths come from several generations of upload handlers and look like
//! `photo.jpg`, `/uploads/photo.jpg`, `/api/media/uploads/photo.jpg` or a full
//! cloud URL. Resolution collapses the relative forms onto one canonical
//! prefix and appends the category's cache version tag.
//!
//! Resolution is pure: it reads the version table and nothing else.
//! Outputs are origin-relative; loaders make them absolute.

use std::sync::Arc;

use url::form_urlencoded;

use crate::config::MediaConfig;
use crate::version::{CacheVersionRegistry, MediaCategory};

const PASS_THROUGH_SCHEMES: &[&str] = &["http://", "https://", "data:", "blob:"];

/// A stored path split into its parts.
struct StoredPath<'a> {
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> StoredPath<'a> {
    fn split(input: &'a str) -> Self {
        let (rest, fragment) = match input.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (input, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query).filter(|q| !q.is_empty())),
            None => (rest, None),
        };
        Self {
            path,
            query,
            fragment,
        }
    }
}

#[derive(Clone)]
pub struct MediaResolver {
    config: Arc<MediaConfig>,
    versions: CacheVersionRegistry,
}

impl MediaResolver {
    pub fn new(config: Arc<MediaConfig>, versions: CacheVersionRegistry) -> Self {
        Self { config, versions }
    }

    pub fn versions(&self) -> &CacheVersionRegistry {
        &self.versions
    }

    /// Resolves a stored path for `category`.
    ///
    /// - absolute `http(s)`, `data:` and `blob:` URLs are returned unchanged
    /// - a path that already carries the version parameter is returned
    ///   unchanged
    /// - otherwise known upload prefixes are stripped, the canonical prefix
    ///   is applied and the version tag appended
    ///
    /// Blank input resolves to an empty string.
    pub fn resolve(&self, stored_path: &str, category: MediaCategory) -> String {
        let stored_path = stored_path.trim();
        if stored_path.is_empty() || is_pass_through(stored_path) {
            return stored_path.to_string();
        }
        if self.has_version_param(stored_path) {
            return stored_path.to_string();
        }
        self.versioned(&self.config.media_prefix, stored_path, category)
    }

    /// Cross-instance proxy form of an uploaded path, or `None` for
    /// absolute URLs and blank input.
    pub fn proxy_url(&self, stored_path: &str, category: MediaCategory) -> Option<String> {
        let stored_path = stored_path.trim();
        if stored_path.is_empty() || is_pass_through(stored_path) {
            return None;
        }
        if self.has_version_param(stored_path) {
            // Keep the caller's tag; only the prefix changes.
            let parts = StoredPath::split(stored_path);
            return Some(self.assemble(
                &self.config.proxy_prefix,
                self.relative_path(parts.path),
                parts.query,
                parts.fragment,
            ));
        }
        Some(self.versioned(&self.config.proxy_prefix, stored_path, category))
    }

    /// True for paths whose canonical form lands in an instance's upload
    /// directory. Those may live on another instance and get the proxy
    /// candidate first.
    ///
    /// Locality is decided after prefix stripping, so `photo.jpg`,
    /// `/api/media/photo.jpg` and `/uploads/photo.jpg` agree.
    pub fn is_locally_uploaded(&self, stored_path: &str) -> bool {
        let stored_path = stored_path.trim();
        if stored_path.is_empty() || is_pass_through(stored_path) {
            return false;
        }
        let rel = self.relative_path(StoredPath::split(stored_path).path);
        if rel.is_empty() {
            return false;
        }
        let canonical = format!("{}/{}", self.config.media_prefix.trim_end_matches('/'), rel);
        canonical.contains(self.config.uploads_marker.as_str())
    }

    /// Ordered, de-duplicated fallback candidates.
    ///
    /// Uploaded paths: proxy, direct, then `alternate` if given. Anything
    /// else: the direct URL only. Blank input yields no candidates.
    pub fn build_candidates(
        &self,
        stored_path: &str,
        category: MediaCategory,
        alternate: Option<&str>,
    ) -> Vec<String> {
        let direct = self.resolve(stored_path, category);
        if direct.is_empty() {
            return Vec::new();
        }

        if !self.is_locally_uploaded(stored_path) {
            return vec![direct];
        }

        let mut candidates = Vec::with_capacity(3);
        candidates.extend(self.proxy_url(stored_path, category));
        candidates.push(direct);
        if let Some(alternate) = alternate.map(str::trim).filter(|a| !a.is_empty()) {
            candidates.push(self.resolve(alternate, category));
        }

        let mut seen = std::collections::HashSet::new();
        candidates.retain(|candidate| seen.insert(candidate.clone()));
        candidates
    }

    fn has_version_param(&self, stored_path: &str) -> bool {
        StoredPath::split(stored_path).query.map_or(false, |query| {
            form_urlencoded::parse(query.as_bytes())
                .any(|(key, _)| key == self.config.version_param.as_str())
        })
    }

    /// Path relative to the upload root, with every known prefix removed.
    fn relative_path<'a>(&self, path: &'a str) -> &'a str {
        let mut rel = path.trim_start_matches('/');
        loop {
            let stripped = self.config.strip_prefixes.iter().find_map(|prefix| {
                let prefix = prefix.trim_start_matches('/');
                rel.strip_prefix(prefix)
                    .filter(|_| prefix.ends_with('/'))
                    .or_else(|| {
                        rel.strip_prefix(prefix)
                            .and_then(|rest| rest.strip_prefix('/'))
                    })
            });
            match stripped {
                Some(rest) => rel = rest.trim_start_matches('/'),
                None => break,
            }
        }
        rel
    }

    fn versioned(&self, prefix: &str, stored_path: &str, category: MediaCategory) -> String {
        let parts = StoredPath::split(stored_path);
        let tag: String =
            form_urlencoded::byte_serialize(self.versions.get(category).as_bytes()).collect();
        let version = format!("{}={}", self.config.version_param, tag);
        let query = match parts.query {
            Some(existing) => format!("{}&{}", existing, version),
            None => version,
        };
        self.assemble(
            prefix,
            self.relative_path(parts.path),
            Some(&query),
            parts.fragment,
        )
    }

    fn assemble(
        &self,
        prefix: &str,
        rel: &str,
        query: Option<&str>,
        fragment: Option<&str>,
    ) -> String {
        let mut url = format!("{}/{}", prefix.trim_end_matches('/'), rel);
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        if let Some(fragment) = fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }
}

fn is_pass_through(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    PASS_THROUGH_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}
