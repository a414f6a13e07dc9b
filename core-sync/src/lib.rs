//! Remote library synchronization: matches written files to items on an
//! Audiobookshelf server and pushes canonical metadata.

pub mod client;
pub mod error;
pub mod types;

pub use client::{PushItem, ShelfClient, SyncReport};
pub use error::{Result, SyncError};
pub use types::PushFailure;
