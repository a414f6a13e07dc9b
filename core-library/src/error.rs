use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Tag codec error: {0}")]
    Codec(String),

    #[error("Unreadable path {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Rename target already exists: {target}")]
    RenameCollision { target: PathBuf },

    #[error("Cannot derive a filename: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
