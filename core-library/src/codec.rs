//! # Tag Codec Capability
//!
//! Boundary trait for the binary tag-container codec. The scanner, writer,
//! and service layers depend only on this trait; the concrete lofty-backed
//! implementation lives in `core-metadata`, and tests substitute in-memory
//! fakes.
//!
//! A codec call either succeeds or fails atomically per file - a failed
//! `apply` must leave the container's previous tags intact.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::models::{ChangeMap, FileTags};

/// Read and mutate a file's embedded tags.
#[async_trait]
pub trait TagCodec: Send + Sync {
    /// Read the file's embedded tags into the fixed tag record.
    async fn read_tags(&self, path: &Path) -> Result<FileTags>;

    /// Apply a change map to the file's tags, atomically per file.
    ///
    /// # Errors
    ///
    /// Fails without partially-written tags when the container rejects a
    /// field or the file cannot be rewritten.
    async fn apply_changes(&self, path: &Path, changes: &ChangeMap) -> Result<()>;
}
