//! Audible catalog connector implementing the curation core's
//! `MetadataProvider` capability.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::AudibleProvider;
pub use error::{AudibleError, Result};
