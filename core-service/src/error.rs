use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Media error: {0}")]
    Media(#[from] core_media::MediaError),

    #[error("Channel error: {0}")]
    Channel(#[from] core_channel::ChannelError),

    #[error("Session error: {0}")]
    Session(#[from] core_session::SessionError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
