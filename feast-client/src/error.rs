//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status without a more specific mapping
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cart checked out, email taken, concurrent modification
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
