use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Invalid channel configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("Frame has no 'type' discriminator")]
    MissingType,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
