use thiserror::Error;

/// Core error type for QuickDesk operations.
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Access to a resource was refused. `redirect_to` carries the page the
    /// client should fall back to, when there is one.
    #[error("Forbidden: {message}")]
    Forbidden {
        message: String,
        redirect_to: Option<String>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeskError {
    /// Forbidden without a redirect target.
    pub fn forbidden(message: impl Into<String>) -> Self {
        DeskError::Forbidden {
            message: message.into(),
            redirect_to: None,
        }
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(e: serde_json::Error) -> Self {
        DeskError::Serialization(e.to_string())
    }
}

/// Result type alias using DeskError.
pub type Result<T> = std::result::Result<T, DeskError>;
