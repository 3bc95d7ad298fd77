//! # Channel Configuration

use serde::{Deserialize, Serialize};

use crate::backoff::ReconnectPolicy;
use crate::error::{ChannelError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Path of the real-time endpoint on the page origin.
    ///
    /// Default: `/ws`.
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint_path: default_endpoint_path(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ChannelConfig {
    pub fn with_endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.endpoint_path.starts_with('/') {
            return Err(ChannelError::InvalidConfig(format!(
                "endpoint_path must start with '/', got '{}'",
                self.endpoint_path
            )));
        }
        self.reconnect.validate()
    }
}

fn default_endpoint_path() -> String {
    "/ws".to_string()
}
