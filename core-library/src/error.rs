use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Operation cancelled before commit")]
    Cancelled,
}

impl LibraryError {
    pub(crate) fn invalid_input(field: &str, message: impl Into<String>) -> Self {
        LibraryError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
