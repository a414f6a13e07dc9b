//! # Group Formation
//!
//! Pure heuristics that partition discovered files into logical groups:
//! one book in one file, one book split over several files, or one folder
//! holding several books of a series.
//!
//! Every discovered file lands in exactly one group per scan; files the
//! heuristics cannot classify fall back to singleton groups keyed by
//! whatever title the filename offers.

use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{AudioFile, Group, GroupId, GroupKey, GroupKind};

/// Structural hints extracted from one file's tags, filename, and folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupHints {
    pub author: Option<String>,
    pub title: Option<String>,
    pub series: Option<String>,
    pub sequence: Option<String>,
}

/// Normalize a string for use inside a group key: lowercased, whitespace
/// collapsed.
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive grouping hints for a single file.
///
/// Tag slots win over filename tokens, which win over the folder name.
pub fn derive_hints(file: &AudioFile) -> GroupHints {
    let folder = parent_folder_name(&file.path);
    let folder_series = folder.as_deref().and_then(parse_series_marker);

    let stem = file_stem(&file.filename);
    let stem_series = parse_series_marker(&stem);

    let series = file
        .tags
        .series
        .clone()
        .or_else(|| folder_series.as_ref().map(|(name, _)| name.clone()))
        .or_else(|| stem_series.as_ref().map(|(name, _)| name.clone()));

    let sequence = file
        .tags
        .series_part
        .clone()
        .or_else(|| folder_series.as_ref().and_then(|(_, seq)| seq.clone()))
        .or_else(|| stem_series.as_ref().and_then(|(_, seq)| seq.clone()));

    let title = file
        .tags
        .title
        .as_deref()
        .map(|t| strip_part_marker(t).to_string())
        .or_else(|| Some(strip_part_marker(&stem).to_string()))
        .filter(|t| !t.is_empty());

    let author = file
        .tags
        .artist
        .clone()
        .or_else(|| file.tags.album_artist.clone());

    GroupHints {
        author,
        title,
        series,
        sequence,
    }
}

/// Partition files into groups.
///
/// The partition is exact: the union of member sets across the returned
/// groups equals the input, with no file in two groups.
pub fn form_groups(files: Vec<AudioFile>) -> Vec<Group> {
    let mut buckets: BTreeMap<GroupKey, Vec<(AudioFile, GroupHints)>> = BTreeMap::new();

    for file in files {
        let hints = derive_hints(&file);
        let author = normalize_key(hints.author.as_deref().unwrap_or("unknown"));
        let work = match &hints.series {
            Some(series) => normalize_key(series),
            None => normalize_key(hints.title.as_deref().unwrap_or(&file.filename)),
        };
        buckets
            .entry(GroupKey { author, work })
            .or_default()
            .push((file, hints));
    }

    let mut groups: Vec<Group> = buckets
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by(|(a, _), (b, _)| a.filename.cmp(&b.filename));
            let kind = detect_kind(&members);
            let name = display_name(&members);
            let files = members.into_iter().map(|(file, _)| file).collect();
            Group {
                id: GroupId::new(),
                key,
                kind,
                name,
                files,
                metadata: None,
                change_count: 0,
            }
        })
        .collect();

    groups.sort_by(|a, b| a.name.cmp(&b.name));
    groups
}

fn detect_kind(members: &[(AudioFile, GroupHints)]) -> GroupKind {
    if members.len() == 1 {
        return GroupKind::Single;
    }

    let has_series = members.iter().any(|(_, h)| h.series.is_some());
    if has_series {
        let mut sequences: Vec<&str> = members
            .iter()
            .filter_map(|(_, h)| h.sequence.as_deref())
            .collect();
        sequences.sort_unstable();
        sequences.dedup();
        if sequences.len() >= 2 {
            return GroupKind::Series;
        }
    }

    GroupKind::MultiFile
}

fn display_name(members: &[(AudioFile, GroupHints)]) -> String {
    let (first, hints) = &members[0];
    if let Some(series) = &hints.series {
        return series.clone();
    }
    hints
        .title
        .clone()
        .unwrap_or_else(|| file_stem(&first.filename))
}

fn parent_folder_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_string()
}

/// Recognize `Name (Book #3)` style series markers, tolerating the
/// `(book #3)` and `(Book#3)` spellings rips commonly carry.
pub fn parse_series_marker(text: &str) -> Option<(String, Option<String>)> {
    let lower = text.to_lowercase();
    if lower.len() != text.len() {
        return None;
    }
    let marker = lower.find("book #").or_else(|| lower.find("book#"))?;

    let digits_start = text[marker..]
        .find(|c: char| c.is_ascii_digit())
        .map(|off| marker + off)?;
    let digits_end = text[digits_start..]
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .map(|off| digits_start + off)
        .unwrap_or(text.len());
    let sequence = text[digits_start..digits_end].trim_end_matches('.');
    if sequence.is_empty() {
        return None;
    }

    let mut name = text[..marker].trim_end();
    name = name.trim_end_matches(['(', '-']).trim_end();
    if name.is_empty() {
        return None;
    }

    Some((name.to_string(), Some(sequence.to_string())))
}

/// Strip a trailing part/disc/chapter marker so sibling parts of one book
/// share a title key: `BookA - Part1` → `BookA`.
pub fn strip_part_marker(title: &str) -> &str {
    const MARKERS: [&str; 5] = ["part", "pt", "disc", "cd", "chapter"];

    let trimmed = title.trim().trim_end_matches([')', ']']).trim_end();
    let lower = trimmed.to_lowercase();
    if lower.len() != trimmed.len() {
        // Lowercasing shifted byte offsets; markers are ASCII anyway.
        return title.trim();
    }

    for marker in MARKERS {
        let Some(pos) = lower.rfind(marker) else {
            continue;
        };
        // Only a trailing `<sep><marker><digits>` counts, and the marker
        // must start a word ("Egypt 5" is not a part marker).
        if pos > 0 && !matches!(lower.as_bytes()[pos - 1], b' ' | b'-' | b'(' | b'[' | b'.') {
            continue;
        }
        let tail = lower[pos + marker.len()..].trim_start_matches([' ', '.', '#']);
        if tail.is_empty() || !tail.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let head = trimmed[..pos].trim_end_matches([' ', '-', '(', '[']);
        if !head.is_empty() {
            return head.trim_end();
        }
    }

    title.trim()
}
