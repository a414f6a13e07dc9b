//! # Metadata Provider Capability
//!
//! Boundary trait for external metadata sources. Each provider crate
//! (`provider-audible`, `provider-googlebooks`) implements
//! [`MetadataProvider`]; the reconciler consumes an ordered list of them
//! through the cache store.
//!
//! A provider maps its own wire format onto the canonical [`BookMetadata`]
//! shape before returning - in particular, a narrator must come from a
//! narrator-typed source field, never from composer or generic contributor
//! credits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_library::BookMetadata;

use crate::error::Result;

/// Identity of an external metadata source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderSource {
    Audible,
    GoogleBooks,
}

impl ProviderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audible => "audible",
            Self::GoogleBooks => "googlebooks",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Audible => "Audible",
            Self::GoogleBooks => "Google Books",
        }
    }
}

impl std::fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search terms for one lookup: the group's best-known title and author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderQuery {
    pub title: String,
    pub author: String,
}

impl ProviderQuery {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }
}

/// One provider's candidate record for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub source: ProviderSource,
    pub metadata: BookMetadata,
}

/// Query one external metadata source.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Which source this adapter speaks for.
    fn source(&self) -> ProviderSource;

    /// Look the query up, returning the best candidate record if any.
    ///
    /// `Ok(None)` means the source answered but had no match; an `Err` is
    /// a transport/auth/quota failure the reconciler degrades around.
    async fn search(&self, query: &ProviderQuery) -> Result<Option<BookMetadata>>;
}
