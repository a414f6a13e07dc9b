//! # Library Data Model
//!
//! Record types shared across the curation pipeline: discovered audio files
//! and their embedded tags, logical groups, the canonical book metadata
//! record, and the per-file change map.
//!
//! Every tag and metadata field is explicitly optional - "field absent" is
//! `None`, never an empty-string placeholder - so downstream stages never
//! have to guess which of the two a value means.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Type-safe audio file identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AudioFileId(Uuid);

impl AudioFileId {
    /// Create a new random file ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AudioFileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AudioFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe group identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Embedded tags of one audio file, as read by the tag codec.
///
/// A fixed record rather than an open string map: the set of slots the
/// pipeline cares about is closed, and absence is always `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    /// Composer slot; audiobook rips conventionally park the narrator here.
    pub composer: Option<String>,
    /// Discrete genre entries, in container order.
    pub genres: Vec<String>,
    pub year: Option<String>,
    pub track: Option<String>,
    pub comment: Option<String>,
    /// Custom `SERIES` slot where the container supports one.
    pub series: Option<String>,
    /// Custom `SERIES-PART` slot.
    pub series_part: Option<String>,
}

/// A discovered audio file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFile {
    pub id: AudioFileId,
    /// Absolute path; the file's identity.
    pub path: PathBuf,
    pub filename: String,
    /// Container format, lowercased extension (`m4b`, `mp3`, ...).
    pub format: String,
    /// File size in bytes.
    pub size: u64,
    /// Embedded tags at scan time.
    pub tags: FileTags,
}

/// How a group's member files relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    /// One file, one book.
    Single,
    /// Several files forming one book (parts/chapters).
    MultiFile,
    /// Several books of one series sharing a folder.
    Series,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MultiFile => "multi-file",
            Self::Series => "series",
        }
    }
}

/// Derived grouping key: normalized author plus the work (title or series
/// name) the files belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub author: String,
    pub work: String,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.author, self.work)
    }
}

/// A set of audio files judged to represent one logical audiobook (or one
/// series entry per file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub key: GroupKey,
    pub kind: GroupKind,
    /// Human-readable group name, shown to the shell.
    pub name: String,
    /// Member files in disk order (sorted by filename, stable across
    /// re-scans that produce the same key).
    pub files: Vec<AudioFile>,
    /// Canonical metadata; `None` until reconciled.
    pub metadata: Option<BookMetadata>,
    /// Number of member files with a non-empty change map.
    pub change_count: usize,
}

/// Canonical reconciled metadata for a group, independent of any single
/// provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    /// First-class narrator; never conflated with composer or contributor
    /// fields from any source.
    pub narrator: Option<String>,
    pub series: Option<String>,
    /// Position within the series, as the provider states it ("2", "2.5").
    pub sequence: Option<String>,
    pub year: Option<String>,
    /// Order-preserving, deduplicated.
    pub genres: Vec<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    /// Audible catalog identifier, when an Audible record contributed.
    pub asin: Option<String>,
}

impl BookMetadata {
    /// Title for display and filename purposes, if known.
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// `Series #Sequence` composite, the album-slot convention for
    /// audiobook containers.
    pub fn series_composite(&self) -> Option<String> {
        let series = self.series.as_deref()?;
        match self.sequence.as_deref() {
            Some(seq) => Some(format!("{} #{}", series, seq)),
            None => Some(series.to_string()),
        }
    }
}

/// Physical target tag slot a change applies to.
///
/// The slot names the *destination*, not the canonical field: narrator
/// lands in the composer slot, the series composite in the album slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagField {
    Title,
    Artist,
    AlbumArtist,
    /// Physical composer slot, reserved for the narrator.
    Narrator,
    /// Repeated discrete genre entries.
    Genre,
    /// `Series #Sequence` composite.
    Album,
    /// Custom `SERIES` slot.
    Series,
    /// Custom `SERIES-PART` slot.
    SeriesPart,
    Year,
    Comment,
}

impl TagField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Artist => "artist",
            Self::AlbumArtist => "album_artist",
            Self::Narrator => "narrator",
            Self::Genre => "genre",
            Self::Album => "album",
            Self::Series => "series",
            Self::SeriesPart => "series_part",
            Self::Year => "year",
            Self::Comment => "comment",
        }
    }
}

impl std::fmt::Display for TagField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value written to a tag slot: a single text entry or repeated entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    List(Vec<String>),
}

impl TagValue {
    /// Joined form for display and old/new comparison output.
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(", "),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for TagValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// One field-level mutation: what the slot holds now and what it should
/// hold after the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Current value, `None` when the slot is empty.
    pub old: Option<TagValue>,
    pub new: TagValue,
}

/// Minimal per-file change set: target slot → mutation. Empty means the
/// file is up to date.
pub type ChangeMap = BTreeMap<TagField, FieldChange>;

/// A path the scanner discovered but could not process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub reason: String,
}
