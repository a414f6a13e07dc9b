//! # Genre Vocabulary & Normalization
//!
//! The approved audiobook genre vocabulary plus the folding rules applied
//! during reconciliation: casing is canonicalized, common aliases collapse
//! onto approved entries, and (when enforcement is on) anything left
//! unrecognized is dropped rather than written to files.

/// Approved genre vocabulary, in canonical casing.
pub const APPROVED_GENRES: &[&str] = &[
    "Adventure",
    "Biography",
    "Business",
    "Children's",
    "Classics",
    "Comedy",
    "Contemporary Fiction",
    "Crime",
    "Dystopian",
    "Fantasy",
    "Historical Fiction",
    "History",
    "Horror",
    "Literary Fiction",
    "Memoir",
    "Mystery",
    "Nonfiction",
    "Philosophy",
    "Poetry",
    "Psychology",
    "Romance",
    "Science",
    "Science Fiction",
    "Self-Help",
    "Thriller",
    "True Crime",
    "Young Adult",
];

/// Alias entries mapping non-canonical genre strings to approved genres.
/// Keys must be lowercase. Sorted alphabetically by key.
const ALIASES: &[(&str, &str)] = &[
    ("action & adventure", "Adventure"),
    ("autobiography", "Memoir"),
    ("biographies & memoirs", "Biography"),
    ("business & careers", "Business"),
    ("children", "Children's"),
    ("childrens", "Children's"),
    ("detective", "Mystery"),
    ("dystopia", "Dystopian"),
    ("economics", "Business"),
    ("epic fantasy", "Fantasy"),
    ("fantasy fiction", "Fantasy"),
    ("fiction", "Contemporary Fiction"),
    ("historical", "Historical Fiction"),
    ("humor", "Comedy"),
    ("humour", "Comedy"),
    ("juvenile fiction", "Children's"),
    ("kids", "Children's"),
    ("literature & fiction", "Literary Fiction"),
    ("mysteries", "Mystery"),
    ("mystery & thriller", "Mystery"),
    ("non-fiction", "Nonfiction"),
    ("personal development", "Self-Help"),
    ("sci fi", "Science Fiction"),
    ("sci-fi", "Science Fiction"),
    ("sci-fi & fantasy", "Science Fiction"),
    ("science fiction & fantasy", "Science Fiction"),
    ("scifi", "Science Fiction"),
    ("self help", "Self-Help"),
    ("self improvement", "Self-Help"),
    ("sf", "Science Fiction"),
    ("suspense", "Thriller"),
    ("teen", "Young Adult"),
    ("ya", "Young Adult"),
];

/// Canonical casing of an approved genre, if the input matches one.
pub fn canonical_casing(genre: &str) -> Option<&'static str> {
    APPROVED_GENRES
        .iter()
        .find(|g| g.eq_ignore_ascii_case(genre))
        .copied()
}

/// Fold one raw genre onto the approved vocabulary: canonical casing
/// first, then the alias table.
pub fn fold_genre(genre: &str) -> Option<&'static str> {
    let trimmed = genre.trim();
    canonical_casing(trimmed).or_else(|| {
        let lower = trimmed.to_lowercase();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, canonical)| *canonical)
    })
}

/// Normalize a merged genre union.
///
/// Order-preserving and deduplicating (case-insensitively). With
/// `enforce` set, every entry folds onto the approved vocabulary and
/// unrecognized entries are dropped; otherwise entries pass through
/// trimmed as-is. The cap applies last; `None` means uncapped.
pub fn normalize_genres(genres: &[String], enforce: bool, cap: Option<usize>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut result: Vec<String> = Vec::new();

    for raw in genres {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        let candidate = if enforce {
            match fold_genre(trimmed) {
                Some(folded) => folded.to_string(),
                None => continue,
            }
        } else {
            trimmed.to_string()
        };

        let key = candidate.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        result.push(candidate);
    }

    if let Some(cap) = cap {
        result.truncate(cap);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(genres: &[&str]) -> Vec<String> {
        genres.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn folds_aliases_and_casing() {
        assert_eq!(fold_genre("sci-fi"), Some("Science Fiction"));
        assert_eq!(fold_genre("MYSTERY"), Some("Mystery"));
        assert_eq!(fold_genre("  humour "), Some("Comedy"));
        assert_eq!(fold_genre("Polka"), None);
    }

    #[test]
    fn enforcement_drops_unrecognized_entries() {
        let normalized = normalize_genres(
            &owned(&["Sci-Fi", "Polka", "thriller"]),
            true,
            None,
        );
        assert_eq!(normalized, vec!["Science Fiction", "Thriller"]);
    }

    #[test]
    fn without_enforcement_entries_pass_through() {
        let normalized = normalize_genres(&owned(&["Polka", " Polka ", "Thriller"]), false, None);
        assert_eq!(normalized, vec!["Polka", "Thriller"]);
    }

    #[test]
    fn dedupe_is_case_insensitive_and_order_preserving() {
        let normalized = normalize_genres(
            &owned(&["Mystery", "mystery", "Thriller", "MYSTERY"]),
            true,
            None,
        );
        assert_eq!(normalized, vec!["Mystery", "Thriller"]);
    }

    #[test]
    fn cap_applies_after_folding() {
        let normalized = normalize_genres(
            &owned(&["sci-fi", "scifi", "Fantasy", "Horror"]),
            true,
            Some(2),
        );
        // The two sci-fi spellings fold together, so the cap keeps two
        // distinct genres.
        assert_eq!(normalized, vec!["Science Fiction", "Fantasy"]);
    }

    #[test]
    fn no_cap_means_uncapped() {
        let many: Vec<String> = APPROVED_GENRES.iter().map(|g| g.to_string()).collect();
        let normalized = normalize_genres(&many, true, None);
        assert_eq!(normalized.len(), APPROVED_GENRES.len());
    }
}
