use core_library::LibraryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to list remote collections: {0}")]
    CollectionListing(String),

    #[error("Local scan failed at {path}: {message}")]
    Scan { path: String, message: String },

    #[error("Persistence failed: {0}")]
    Persistence(LibraryError),

    #[error("Invalid configuration: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Sync already in progress (job {job_id})")]
    SyncInProgress { job_id: String },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid sync phase: {0}")]
    InvalidPhase(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    /// Errors that degrade the pass to a warning instead of failing it.
    pub fn is_remote_degradation(&self) -> bool {
        matches!(
            self,
            SyncError::Authentication(_) | SyncError::CollectionListing(_)
        )
    }

    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        SyncError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<LibraryError> for SyncError {
    fn from(error: LibraryError) -> Self {
        match error {
            LibraryError::Cancelled => SyncError::Cancelled,
            other => SyncError::Persistence(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// A single collection whose file listing could not be retrieved.
///
/// Recorded and reported; never aborts the other collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("collection {collection_name} ({collection_id}): {message}")]
pub struct CollectionFetchError {
    pub collection_id: String,
    pub collection_name: String,
    pub message: String,
}
