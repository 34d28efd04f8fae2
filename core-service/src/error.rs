use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

impl CoreError {
    /// True when the failure was a user-requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Sync(e) if e.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
