//! Google Books volumes connector implementing the curation core's
//! `MetadataProvider` capability.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleBooksProvider;
pub use error::{GoogleBooksError, Result};
