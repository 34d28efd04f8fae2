//! Error types for the qBittorrent provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// qBittorrent provider errors
#[derive(Error, Debug)]
pub enum QbittorrentError {
    /// Credentials rejected, or the session cookie is no longer accepted
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned a non-success status
    #[error("qBittorrent API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Request never produced a response
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for qBittorrent operations
pub type Result<T> = std::result::Result<T, QbittorrentError>;

impl From<QbittorrentError> for BridgeError {
    fn from(error: QbittorrentError) -> Self {
        match error {
            QbittorrentError::AuthenticationFailed(msg) => BridgeError::AuthenticationFailed(msg),
            QbittorrentError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            QbittorrentError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            QbittorrentError::NetworkError(msg) => {
                BridgeError::OperationFailed(format!("Network error: {}", msg))
            }
            QbittorrentError::Bridge(e) => e,
        }
    }
}
