use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the remote rejected the supplied credentials.
    pub fn is_authentication(&self) -> bool {
        matches!(self, BridgeError::AuthenticationFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
