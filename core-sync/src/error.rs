use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Server not configured: set base URL, API token, and library ID")]
    NotConfigured,

    #[error("Server responded with status {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse server response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
