//! Cache version registry.
//!
//! Each content category carries an opaque tag appended to its media URLs.
//! Bumping a tag on deploy changes every URL in that category, which forces
//! browsers and CDNs to refetch.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use core_runtime::events::{CoreEvent, EventBus, MediaEvent};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MediaError, Result};

/// Content category of a media reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Images,
    Avatars,
    Covers,
    Media,
    Static,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 5] = [
        MediaCategory::Images,
        MediaCategory::Avatars,
        MediaCategory::Covers,
        MediaCategory::Media,
        MediaCategory::Static,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Images => "images",
            MediaCategory::Avatars => "avatars",
            MediaCategory::Covers => "covers",
            MediaCategory::Media => "media",
            MediaCategory::Static => "static",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCategory {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self> {
        MediaCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MediaError::UnknownCategory(s.to_string()))
    }
}

/// Shared category → version tag table.
///
/// Cloning is cheap and clones observe each other's updates.
#[derive(Clone)]
pub struct CacheVersionRegistry {
    tags: Arc<RwLock<HashMap<MediaCategory, String>>>,
    default_tag: Arc<str>,
    events: Option<EventBus>,
}

impl CacheVersionRegistry {
    /// Registry where every category starts at `default_tag`.
    pub fn new(default_tag: impl Into<String>) -> Self {
        Self {
            tags: Arc::new(RwLock::new(HashMap::new())),
            default_tag: Arc::from(default_tag.into()),
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn get(&self, category: MediaCategory) -> String {
        self.tags
            .read()
            .get(&category)
            .cloned()
            .unwrap_or_else(|| self.default_tag.to_string())
    }

    /// Sets the tag for one category. Returns whether the tag changed.
    pub fn set(&self, category: MediaCategory, tag: impl Into<String>) -> Result<bool> {
        let tag = validate_tag(category, tag.into())?;

        let changed = {
            let mut tags = self.tags.write();
            let current = tags.get(&category).map(String::as_str);
            if current.unwrap_or(&self.default_tag) == tag {
                false
            } else {
                tags.insert(category, tag.clone());
                true
            }
        };

        if changed {
            info!(%category, tag = %tag, "Cache version updated");
            if let Some(events) = &self.events {
                events.publish(CoreEvent::Media(MediaEvent::VersionChanged {
                    category: category.to_string(),
                    tag,
                }));
            }
        } else {
            debug!(%category, "Cache version unchanged");
        }

        Ok(changed)
    }

    /// Applies a deploy manifest. Every tag is validated before any is
    /// written, so a bad entry leaves the table untouched.
    pub fn set_all<I, S>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (MediaCategory, S)>,
        S: Into<String>,
    {
        let validated = entries
            .into_iter()
            .map(|(category, tag)| validate_tag(category, tag.into()).map(|tag| (category, tag)))
            .collect::<Result<Vec<_>>>()?;

        let mut changed = 0;
        for (category, tag) in validated {
            if self.set(category, tag)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Current tag of every category, defaults included.
    pub fn snapshot(&self) -> BTreeMap<MediaCategory, String> {
        MediaCategory::ALL
            .into_iter()
            .map(|category| (category, self.get(category)))
            .collect()
    }
}

impl Default for CacheVersionRegistry {
    fn default() -> Self {
        Self::new("1")
    }
}

impl fmt::Debug for CacheVersionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheVersionRegistry")
            .field("tags", &self.snapshot())
            .finish()
    }
}

fn validate_tag(category: MediaCategory, tag: String) -> Result<String> {
    let tag = tag.trim().to_string();
    if tag.is_empty() {
        return Err(MediaError::InvalidVersionTag {
            category: category.to_string(),
            reason: "tag is empty".to_string(),
        });
    }
    if tag.contains(|c: char| matches!(c, '&' | '#' | '?') || c.is_whitespace()) {
        return Err(MediaError::InvalidVersionTag {
            category: category.to_string(),
            reason: format!("'{}' contains URL delimiters or whitespace", tag),
        });
    }
    Ok(tag)
}
