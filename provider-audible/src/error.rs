//! Error types for the Audible provider

use thiserror::Error;

/// Audible provider errors
#[derive(Error, Debug)]
pub enum AudibleError {
    /// API request returned an error status
    #[error("Audible API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Unknown marketplace region
    #[error("Unknown Audible region: {0}")]
    UnknownRegion(String),
}

/// Result type for Audible operations
pub type Result<T> = std::result::Result<T, AudibleError>;

impl From<AudibleError> for core_metadata::MetadataError {
    fn from(error: AudibleError) -> Self {
        core_metadata::MetadataError::Provider {
            provider: "audible".to_string(),
            message: error.to_string(),
        }
    }
}
