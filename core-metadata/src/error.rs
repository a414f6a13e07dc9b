use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Tag codec error: {0}")]
    Codec(#[from] core_library::LibraryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
