//! # Metadata Reconciler
//!
//! Folds candidate records from every enabled provider into one canonical
//! [`BookMetadata`] per group.
//!
//! ## Merge model
//!
//! Each canonical field is governed by one named strategy, applied over
//! the candidates in configured provider order with the tag-seeded record
//! as the final fallback:
//!
//! - `FirstNonEmpty` - scalars; the first source supplying a non-empty
//!   value wins. Ties between providers are broken by provider order,
//!   which defaults to declaration order.
//! - `UnionWithCap` - genres; the union across providers in order, folded
//!   through the vocabulary in [`crate::genres`], then capped.
//! - `SanitizeThenSet` - description; the chosen text is scrubbed of
//!   generative-provider debug artifacts before it is accepted, and a
//!   candidate that sanitizes to nothing yields to the next source.
//!
//! Provider failures degrade the merge to the remaining sources (plus any
//! stale cache fallback); a group whose every source fails still yields
//! the tag-seeded record, surfaced downstream as "no changes available"
//! rather than an error.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_library::grouping::derive_hints;
use core_library::{BookMetadata, Group};

use crate::cache::MetadataCache;
use crate::genres::normalize_genres;
use crate::provider::{MetadataProvider, ProviderQuery, ProviderRecord, ProviderSource};

/// Field-level merge policy knobs.
#[derive(Debug, Clone)]
pub struct MergePolicy {
    /// Fold genres onto the approved vocabulary, dropping strays.
    pub genre_enforcement: bool,
    /// Cap on the merged genre union; `None` means uncapped.
    pub genre_cap: Option<usize>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            genre_enforcement: true,
            genre_cap: Some(3),
        }
    }
}

/// Result of reconciling one group.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub metadata: BookMetadata,
    /// True when any provider failed or a stale cache entry was served.
    pub degraded: bool,
    /// Sources that contributed a candidate record, in merge order.
    pub sources: Vec<ProviderSource>,
}

/// Merges provider candidates into canonical metadata, via the cache.
pub struct Reconciler {
    providers: Vec<Arc<dyn MetadataProvider>>,
    cache: Arc<MetadataCache>,
    policy: MergePolicy,
}

impl Reconciler {
    /// Providers are queried and merged in the order given; that order is
    /// the tie-break between sources that both know a field.
    pub fn new(
        providers: Vec<Arc<dyn MetadataProvider>>,
        cache: Arc<MetadataCache>,
        policy: MergePolicy,
    ) -> Self {
        Self {
            providers,
            cache,
            policy,
        }
    }

    /// Reconcile one group into canonical metadata.
    #[instrument(skip(self, group), fields(group = %group.name))]
    pub async fn reconcile(&self, group: &Group) -> ReconcileOutcome {
        let seed = seed_from_group(group);
        let query = ProviderQuery::new(
            seed.title.clone().unwrap_or_else(|| group.name.clone()),
            seed.author.clone().unwrap_or_default(),
        );

        let mut candidates: Vec<ProviderRecord> = Vec::new();
        let mut degraded = false;

        for provider in &self.providers {
            let source = provider.source();
            let outcome = self
                .cache
                .get_or_fetch(source, &query, || provider.search(&query))
                .await;

            match outcome {
                Ok(outcome) => {
                    degraded |= outcome.degraded;
                    match outcome.response {
                        Some(metadata) => {
                            debug!(source = %source, from_cache = outcome.from_cache, "Candidate record");
                            candidates.push(ProviderRecord { source, metadata });
                        }
                        None => debug!(source = %source, "No match at provider"),
                    }
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Provider query failed");
                    degraded = true;
                }
            }
        }

        let sources: Vec<ProviderSource> = candidates.iter().map(|c| c.source).collect();
        let metadata = self.merge(&seed, &candidates);

        info!(
            sources = sources.len(),
            degraded,
            title = metadata.title.as_deref().unwrap_or("<unknown>"),
            "Reconciled group"
        );

        ReconcileOutcome {
            metadata,
            degraded,
            sources,
        }
    }

    /// Apply the per-field strategies over candidates then seed.
    fn merge(&self, seed: &BookMetadata, candidates: &[ProviderRecord]) -> BookMetadata {
        // FirstNonEmpty over candidates in provider order, seed last.
        let pick = |get: fn(&BookMetadata) -> Option<&str>| -> Option<String> {
            candidates
                .iter()
                .map(|c| &c.metadata)
                .chain(std::iter::once(seed))
                .filter_map(|m| {
                    let value = get(m)?.trim();
                    (!value.is_empty()).then(|| value.to_string())
                })
                .next()
        };

        // UnionWithCap: providers in order; seed genres only as a floor
        // when no provider supplied any.
        let mut genre_union: Vec<String> = candidates
            .iter()
            .flat_map(|c| c.metadata.genres.iter().cloned())
            .collect();
        if genre_union.is_empty() {
            genre_union = seed.genres.clone();
        }
        let genres = normalize_genres(
            &genre_union,
            self.policy.genre_enforcement,
            self.policy.genre_cap,
        );

        // SanitizeThenSet: first candidate whose description survives
        // sanitization wins.
        let description = candidates
            .iter()
            .map(|c| &c.metadata)
            .chain(std::iter::once(seed))
            .filter_map(|m| m.description.as_deref())
            .find_map(sanitize_description);

        BookMetadata {
            title: pick(|m| m.title.as_deref()),
            subtitle: pick(|m| m.subtitle.as_deref()),
            author: pick(|m| m.author.as_deref()),
            // Narrator merges only from narrator-typed fields; providers
            // never map composer/contributor credits onto it.
            narrator: pick(|m| m.narrator.as_deref()),
            series: pick(|m| m.series.as_deref()),
            sequence: pick(|m| m.sequence.as_deref()),
            year: pick(|m| m.year.as_deref()),
            genres,
            description,
            publisher: pick(|m| m.publisher.as_deref()),
            isbn: pick(|m| m.isbn.as_deref()),
            asin: pick(|m| m.asin.as_deref()),
        }
    }
}

/// Build the fallback record from a group's embedded tags and structural
/// hints. This is the floor the merge can never drop below.
pub fn seed_from_group(group: &Group) -> BookMetadata {
    let Some(first) = group.files.first() else {
        return BookMetadata::default();
    };
    let hints = derive_hints(first);
    let tags = &first.tags;

    BookMetadata {
        title: hints.title.clone().or_else(|| Some(group.name.clone())),
        subtitle: None,
        author: hints.author.clone(),
        narrator: tags
            .composer
            .clone()
            .or_else(|| tags.comment.as_deref().and_then(narrator_from_comment)),
        series: hints.series.clone(),
        sequence: hints.sequence.clone(),
        year: tags.year.clone(),
        genres: tags.genres.clone(),
        description: None,
        publisher: None,
        isbn: None,
        asin: None,
    }
}

/// Recover a narrator previously written into the comment slot as
/// `Narrated by X` / `Read by X`.
fn narrator_from_comment(comment: &str) -> Option<String> {
    let trimmed = comment.trim();
    for prefix in ["Narrated by ", "Read by "] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            let name = rest.trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Strip debug/diagnostic artifacts a generative provider may leave in
/// description text: code fences, `DEBUG:` lines, stray JSON scaffolding.
/// Returns `None` when nothing presentable remains.
fn sanitize_description(text: &str) -> Option<String> {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            continue;
        }
        let upper = trimmed.to_uppercase();
        if upper.starts_with("DEBUG:") || upper.starts_with("[DEBUG]") {
            continue;
        }
        lines.push(line.trim_end());
    }

    let mut cleaned = lines.join("\n");
    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
