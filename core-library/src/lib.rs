//! Library domain model and on-disk operations: audio file records, group
//! formation, the tag-codec capability boundary, and the rename planner.

pub mod codec;
pub mod error;
pub mod grouping;
pub mod models;
pub mod organize;
pub mod scanner;

pub use codec::TagCodec;
pub use error::{LibraryError, Result};
pub use models::{
    AudioFile, AudioFileId, BookMetadata, ChangeMap, FieldChange, FileTags, Group, GroupId,
    GroupKey, GroupKind, ScanIssue, TagField, TagValue,
};
pub use scanner::{LibraryScanner, ScanOutcome};
