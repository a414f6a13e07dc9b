//! # Lofty Tag Codec
//!
//! The concrete [`TagCodec`] implementation over the `lofty` crate.
//! Supports ID3v2, MP4 atoms, Vorbis Comments, and FLAC via lofty's
//! format probing.
//!
//! Slot conventions for audiobook containers:
//!
//! - Narrator occupies the physical Composer slot.
//! - Genres are written as repeated discrete `Genre` items, never one
//!   delimited string.
//! - Series name and part live in custom `SERIES`/`SERIES-PART` items,
//!   written in both spellings because MP4 freeform atoms are matched
//!   case-sensitively while Vorbis comments are conventionally upper-case.

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile as _, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, ItemValue, Tag, TagItem};
use std::path::Path;
use tracing::debug;

use core_library::error::{LibraryError, Result};
use core_library::{ChangeMap, FileTags, TagCodec, TagField, TagValue};

/// `TagCodec` backed by lofty.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagCodec;

impl LoftyTagCodec {
    pub fn new() -> Self {
        Self
    }

    /// Trim, collapse whitespace, drop control characters.
    fn normalize_text(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .filter(|c| !c.is_control())
            .collect()
    }

    fn text_field(raw: Option<&str>) -> Option<String> {
        raw.map(Self::normalize_text).filter(|s| !s.is_empty())
    }

    /// Read a custom item under either spelling.
    fn custom_field(tag: &Tag, upper: &str, lower: &str) -> Option<String> {
        tag.get_string(&ItemKey::Unknown(upper.to_string()))
            .or_else(|| tag.get_string(&ItemKey::Unknown(lower.to_string())))
            .map(Self::normalize_text)
            .filter(|s| !s.is_empty())
    }

    fn expect_text<'a>(field: TagField, value: &'a TagValue) -> Result<&'a str> {
        match value {
            TagValue::Text(text) => Ok(text),
            TagValue::List(_) => Err(LibraryError::Codec(format!(
                "Field {} takes a single value",
                field
            ))),
        }
    }
}

#[async_trait]
impl TagCodec for LoftyTagCodec {
    async fn read_tags(&self, path: &Path) -> Result<FileTags> {
        let tagged = Probe::open(path)
            .map_err(|e| LibraryError::Codec(format!("Failed to open {}: {}", path.display(), e)))?
            .read()
            .map_err(|e| LibraryError::Codec(format!("Failed to parse {}: {}", path.display(), e)))?;

        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            debug!(path = %path.display(), "File carries no tags");
            return Ok(FileTags::default());
        };

        Ok(FileTags {
            title: Self::text_field(tag.title().as_deref()),
            artist: Self::text_field(tag.artist().as_deref()),
            album: Self::text_field(tag.album().as_deref()),
            album_artist: Self::text_field(tag.get_string(&ItemKey::AlbumArtist)),
            composer: Self::text_field(tag.get_string(&ItemKey::Composer)),
            genres: tag
                .get_strings(&ItemKey::Genre)
                .map(Self::normalize_text)
                .filter(|g| !g.is_empty())
                .collect(),
            year: tag.year().map(|y| y.to_string()),
            track: tag.track().map(|t| t.to_string()),
            comment: Self::text_field(tag.comment().as_deref()),
            series: Self::custom_field(tag, "SERIES", "series"),
            series_part: Self::custom_field(tag, "SERIES-PART", "series-part"),
        })
    }

    async fn apply_changes(&self, path: &Path, changes: &ChangeMap) -> Result<()> {
        let mut tagged = Probe::open(path)
            .map_err(|e| LibraryError::Codec(format!("Failed to open {}: {}", path.display(), e)))?
            .read()
            .map_err(|e| LibraryError::Codec(format!("Failed to parse {}: {}", path.display(), e)))?;

        if tagged.primary_tag().is_none() {
            let tag_type = tagged.primary_tag_type();
            tagged.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged
            .primary_tag_mut()
            .ok_or_else(|| LibraryError::Codec("Container rejected a new tag block".to_string()))?;

        for (field, change) in changes {
            match field {
                TagField::Title => {
                    tag.remove_key(&ItemKey::TrackTitle);
                    tag.set_title(Self::expect_text(*field, &change.new)?.to_string());
                }
                TagField::Artist => {
                    tag.remove_key(&ItemKey::TrackArtist);
                    tag.set_artist(Self::expect_text(*field, &change.new)?.to_string());
                }
                TagField::AlbumArtist => {
                    tag.remove_key(&ItemKey::AlbumArtist);
                    tag.insert_text(
                        ItemKey::AlbumArtist,
                        Self::expect_text(*field, &change.new)?.to_string(),
                    );
                }
                TagField::Narrator => {
                    tag.remove_key(&ItemKey::Composer);
                    tag.insert_text(
                        ItemKey::Composer,
                        Self::expect_text(*field, &change.new)?.to_string(),
                    );
                }
                TagField::Genre => {
                    let entries = match &change.new {
                        TagValue::List(entries) => entries.clone(),
                        TagValue::Text(text) => vec![text.clone()],
                    };
                    tag.remove_key(&ItemKey::Genre);
                    for genre in entries {
                        tag.push(TagItem::new(ItemKey::Genre, ItemValue::Text(genre)));
                    }
                }
                TagField::Album => {
                    tag.remove_key(&ItemKey::AlbumTitle);
                    tag.set_album(Self::expect_text(*field, &change.new)?.to_string());
                }
                TagField::Series => {
                    let value = Self::expect_text(*field, &change.new)?;
                    tag.insert_text(ItemKey::Unknown("SERIES".to_string()), value.to_string());
                    tag.insert_text(ItemKey::Unknown("series".to_string()), value.to_string());
                }
                TagField::SeriesPart => {
                    let value = Self::expect_text(*field, &change.new)?;
                    tag.insert_text(
                        ItemKey::Unknown("SERIES-PART".to_string()),
                        value.to_string(),
                    );
                    tag.insert_text(
                        ItemKey::Unknown("series-part".to_string()),
                        value.to_string(),
                    );
                }
                TagField::Year => {
                    let value = Self::expect_text(*field, &change.new)?;
                    let year: u32 = value.trim().parse().map_err(|_| {
                        LibraryError::Codec(format!("Year '{}' is not numeric", value))
                    })?;
                    tag.set_year(year);
                }
                TagField::Comment => {
                    tag.remove_key(&ItemKey::Comment);
                    tag.set_comment(Self::expect_text(*field, &change.new)?.to_string());
                }
            }
        }

        tagged
            .save_to_path(path, WriteOptions::default())
            .map_err(|e| LibraryError::Codec(format!("Failed to save tags: {}", e)))?;
        debug!(path = %path.display(), fields = changes.len(), "Saved tags");
        Ok(())
    }
}
