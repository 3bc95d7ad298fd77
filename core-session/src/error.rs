use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Session storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Session record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
