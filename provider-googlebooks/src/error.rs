//! Error types for the Google Books provider

use thiserror::Error;

/// Google Books provider errors
#[derive(Error, Debug)]
pub enum GoogleBooksError {
    /// API request returned an error status
    #[error("Google Books API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),
}

/// Result type for Google Books operations
pub type Result<T> = std::result::Result<T, GoogleBooksError>;

impl From<GoogleBooksError> for core_metadata::MetadataError {
    fn from(error: GoogleBooksError) -> Self {
        core_metadata::MetadataError::Provider {
            provider: "googlebooks".to_string(),
            message: error.to_string(),
        }
    }
}
