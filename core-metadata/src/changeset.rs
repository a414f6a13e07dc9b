//! # Change Set Computer
//!
//! Pure diff of canonical metadata against one file's current tags under
//! the fixed output mapping. Recomputing from the same inputs yields the
//! same map; applying the map and recomputing yields an empty one.
//!
//! ## Target mapping
//!
//! | canonical field   | target slot                                    |
//! |-------------------|------------------------------------------------|
//! | title             | `Title`                                        |
//! | author            | `Artist` (and `AlbumArtist` when already set)  |
//! | narrator          | `Narrator` - the physical composer slot        |
//! | genres            | `Genre` - N discrete entries, never delimited  |
//! | series + sequence | `Album` composite `Series #Seq`, plus discrete `Series`/`SeriesPart` slots |
//! | year              | `Year`                                         |
//! | description       | `Comment`                                      |
//!
//! A field enters the map only when the computed target value differs
//! from the current one (trimmed, case-sensitive). Absent canonical
//! fields never clear existing tags.

use core_library::{BookMetadata, ChangeMap, FieldChange, FileTags, TagField, TagValue};

/// Current value of a target slot, as the codec reports it.
pub fn tag_value_of(tags: &FileTags, field: TagField) -> Option<TagValue> {
    match field {
        TagField::Title => tags.title.clone().map(TagValue::Text),
        TagField::Artist => tags.artist.clone().map(TagValue::Text),
        TagField::AlbumArtist => tags.album_artist.clone().map(TagValue::Text),
        TagField::Narrator => tags.composer.clone().map(TagValue::Text),
        TagField::Genre => {
            (!tags.genres.is_empty()).then(|| TagValue::List(tags.genres.clone()))
        }
        TagField::Album => tags.album.clone().map(TagValue::Text),
        TagField::Series => tags.series.clone().map(TagValue::Text),
        TagField::SeriesPart => tags.series_part.clone().map(TagValue::Text),
        TagField::Year => tags.year.clone().map(TagValue::Text),
        TagField::Comment => tags.comment.clone().map(TagValue::Text),
    }
}

/// Mirror of the codec's apply step over the in-memory record, used by
/// write verification and by in-memory codec fakes in tests.
pub fn apply_to_tags(tags: &mut FileTags, changes: &ChangeMap) {
    for (field, change) in changes {
        match (field, &change.new) {
            (TagField::Title, TagValue::Text(v)) => tags.title = Some(v.clone()),
            (TagField::Artist, TagValue::Text(v)) => tags.artist = Some(v.clone()),
            (TagField::AlbumArtist, TagValue::Text(v)) => tags.album_artist = Some(v.clone()),
            (TagField::Narrator, TagValue::Text(v)) => tags.composer = Some(v.clone()),
            (TagField::Genre, TagValue::List(v)) => tags.genres = v.clone(),
            (TagField::Album, TagValue::Text(v)) => tags.album = Some(v.clone()),
            (TagField::Series, TagValue::Text(v)) => tags.series = Some(v.clone()),
            (TagField::SeriesPart, TagValue::Text(v)) => tags.series_part = Some(v.clone()),
            (TagField::Year, TagValue::Text(v)) => tags.year = Some(v.clone()),
            (TagField::Comment, TagValue::Text(v)) => tags.comment = Some(v.clone()),
            // A list where text belongs (or vice versa) is a computer
            // bug; ignore rather than corrupt.
            _ => {}
        }
    }
}

/// Compute the minimal change map for one file.
pub fn compute_changes(metadata: &BookMetadata, tags: &FileTags) -> ChangeMap {
    let mut changes = ChangeMap::new();

    diff_text(&mut changes, tags, TagField::Title, metadata.title.as_deref());
    diff_text(&mut changes, tags, TagField::Artist, metadata.author.as_deref());
    // Keep the album-artist slot in step only where the file already
    // carries one; never introduce it.
    if tags.album_artist.is_some() {
        diff_text(
            &mut changes,
            tags,
            TagField::AlbumArtist,
            metadata.author.as_deref(),
        );
    }
    diff_text(
        &mut changes,
        tags,
        TagField::Narrator,
        metadata.narrator.as_deref(),
    );

    if !metadata.genres.is_empty() {
        let new: Vec<String> = metadata
            .genres
            .iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        let old: Vec<String> = tags.genres.iter().map(|g| g.trim().to_string()).collect();
        if new != old && !new.is_empty() {
            changes.insert(
                TagField::Genre,
                FieldChange {
                    old: tag_value_of(tags, TagField::Genre),
                    new: TagValue::List(new),
                },
            );
        }
    }

    if let Some(composite) = metadata.series_composite() {
        diff_text(&mut changes, tags, TagField::Album, Some(&composite));
        diff_text(&mut changes, tags, TagField::Series, metadata.series.as_deref());
        diff_text(
            &mut changes,
            tags,
            TagField::SeriesPart,
            metadata.sequence.as_deref(),
        );
    }

    diff_text(&mut changes, tags, TagField::Year, metadata.year.as_deref());
    diff_text(
        &mut changes,
        tags,
        TagField::Comment,
        metadata.description.as_deref(),
    );

    changes
}

fn diff_text(changes: &mut ChangeMap, tags: &FileTags, field: TagField, target: Option<&str>) {
    let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) else {
        return;
    };
    let current = tag_value_of(tags, field);
    let current_text = match &current {
        Some(TagValue::Text(v)) => Some(v.trim()),
        Some(TagValue::List(_)) => None,
        None => None,
    };
    if current_text == Some(target) {
        return;
    }
    changes.insert(
        field,
        FieldChange {
            old: current,
            new: TagValue::Text(target.to_string()),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> BookMetadata {
        BookMetadata {
            title: Some("BookA".to_string()),
            author: Some("Jane Doe".to_string()),
            narrator: Some("John Smith".to_string()),
            genres: vec!["Mystery".to_string(), "Thriller".to_string()],
            year: Some("2020".to_string()),
            ..Default::default()
        }
    }

    fn current_tags() -> FileTags {
        FileTags {
            title: Some("booka - part1".to_string()),
            artist: Some("jane doe".to_string()),
            genres: vec!["Misc".to_string()],
            year: Some("2020".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn genres_become_discrete_entries() {
        let changes = compute_changes(&metadata(), &current_tags());
        let genre = changes.get(&TagField::Genre).expect("genre change");
        assert_eq!(
            genre.new,
            TagValue::List(vec!["Mystery".to_string(), "Thriller".to_string()])
        );
    }

    #[test]
    fn narrator_lands_in_dedicated_slot_only() {
        let changes = compute_changes(&metadata(), &current_tags());
        let narrator = changes.get(&TagField::Narrator).expect("narrator change");
        assert_eq!(narrator.new, TagValue::Text("John Smith".to_string()));
        // Never smuggled into the comment slot.
        assert!(!changes.contains_key(&TagField::Comment));
    }

    #[test]
    fn equal_fields_stay_out_of_the_map() {
        let changes = compute_changes(&metadata(), &current_tags());
        assert!(!changes.contains_key(&TagField::Year));
    }

    #[test]
    fn comparison_is_case_sensitive_but_trimmed() {
        let mut tags = current_tags();
        tags.title = Some("  BookA  ".to_string());
        tags.artist = Some("Jane Doe".to_string());
        let changes = compute_changes(&metadata(), &tags);
        assert!(!changes.contains_key(&TagField::Title));
        assert!(!changes.contains_key(&TagField::Artist));

        tags.artist = Some("jane doe".to_string());
        let changes = compute_changes(&metadata(), &tags);
        assert!(changes.contains_key(&TagField::Artist));
    }

    #[test]
    fn up_to_date_file_yields_empty_map() {
        let m = metadata();
        let mut tags = current_tags();
        let changes = compute_changes(&m, &tags);
        apply_to_tags(&mut tags, &changes);
        assert!(compute_changes(&m, &tags).is_empty());
    }

    #[test]
    fn recomputation_is_deterministic() {
        let m = metadata();
        let tags = current_tags();
        assert_eq!(compute_changes(&m, &tags), compute_changes(&m, &tags));
    }

    #[test]
    fn series_produces_composite_album_and_discrete_slots() {
        let mut m = metadata();
        m.series = Some("Wayfarers".to_string());
        m.sequence = Some("2".to_string());
        let changes = compute_changes(&m, &current_tags());

        assert_eq!(
            changes.get(&TagField::Album).map(|c| &c.new),
            Some(&TagValue::Text("Wayfarers #2".to_string()))
        );
        assert_eq!(
            changes.get(&TagField::Series).map(|c| &c.new),
            Some(&TagValue::Text("Wayfarers".to_string()))
        );
        assert_eq!(
            changes.get(&TagField::SeriesPart).map(|c| &c.new),
            Some(&TagValue::Text("2".to_string()))
        );
    }

    #[test]
    fn absent_canonical_fields_never_clear_tags() {
        let m = BookMetadata::default();
        let tags = current_tags();
        assert!(compute_changes(&m, &tags).is_empty());
    }

    #[test]
    fn album_artist_tracked_only_when_present() {
        let m = metadata();
        let mut tags = current_tags();
        assert!(!compute_changes(&m, &tags).contains_key(&TagField::AlbumArtist));

        tags.album_artist = Some("someone else".to_string());
        let changes = compute_changes(&m, &tags);
        assert_eq!(
            changes.get(&TagField::AlbumArtist).map(|c| &c.new),
            Some(&TagValue::Text("Jane Doe".to_string()))
        );
    }
}
