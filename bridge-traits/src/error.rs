use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure is tied to the network link rather than the request.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            BridgeError::ConnectionFailed(_) | BridgeError::ConnectionClosed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
