use bridge_traits::BridgeError;
use thiserror::Error;

/// Media errors are `Clone` so one in-flight load can hand the same
/// failure to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Invalid media configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown media category: {0}")]
    UnknownCategory(String),

    #[error("Invalid version tag for {category}: {reason}")]
    InvalidVersionTag { category: String, reason: String },

    #[error("Failed to load {url}: {message}")]
    LoadFailed { url: String, message: String },
}

impl MediaError {
    pub(crate) fn load_failed(url: impl Into<String>, error: BridgeError) -> Self {
        MediaError::LoadFailed {
            url: url.into(),
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
