//! # Session Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SessionError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Settings key holding the JSON record.
    ///
    /// Default: `live_session`.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Records older than this are treated as absent and purged.
    ///
    /// Default: 6 hours.
    #[serde(default = "default_staleness")]
    pub staleness: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            staleness: default_staleness(),
        }
    }
}

impl SessionConfig {
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "storage_key cannot be empty".to_string(),
            ));
        }
        if self.staleness.is_zero() {
            return Err(SessionError::InvalidConfig(
                "staleness must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_storage_key() -> String {
    "live_session".to_string()
}

fn default_staleness() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.storage_key, "live_session");
        assert_eq!(config.staleness, Duration::from_secs(21_600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_values() {
        assert!(SessionConfig::default()
            .with_storage_key(" ")
            .validate()
            .is_err());
        assert!(SessionConfig::default()
            .with_staleness(Duration::ZERO)
            .validate()
            .is_err());
    }
}
