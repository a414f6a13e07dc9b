//! # Metadata Lookup Cache
//!
//! Persists provider lookups keyed by a normalized query fingerprint.
//!
//! ## Overview
//!
//! Two layers: an in-memory LRU in front of a JSON cache file. Entries
//! carry the provider's response (including "no match") and a fetch
//! timestamp; entries older than the staleness window are treated as
//! misses but retained, so a failed live query can still fall back to the
//! stale value - flagged as degraded to the caller.
//!
//! Concurrent lookups for the same fingerprint share one in-flight
//! provider query instead of issuing duplicates.
//!
//! ## Usage
//!
//! ```ignore
//! let cache = MetadataCache::new(cache_path, Duration::from_secs(86400));
//! let outcome = cache
//!     .get_or_fetch(ProviderSource::Audible, &query, || provider.search(&query))
//!     .await?;
//! if outcome.degraded {
//!     tracing::warn!("serving stale metadata");
//! }
//! ```

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use core_library::BookMetadata;

use crate::error::{MetadataError, Result};
use crate::provider::{ProviderQuery, ProviderSource};

/// Bound on in-memory entries; the least recently used fall out of the
/// persisted file on the next save.
const CACHE_CAPACITY: usize = 1024;

/// One cached provider response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The provider's answer; `None` records a "no match" response.
    pub response: Option<BookMetadata>,
    pub fetched_at: DateTime<Utc>,
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// Entry within the staleness window.
    Fresh(CacheEntry),
    /// Entry past the window - a live query is required; the stale value
    /// is available as a degraded fallback.
    Stale(CacheEntry),
    Miss,
}

/// What `get_or_fetch` handed back, and where it came from.
#[derive(Debug, Clone)]
pub struct CacheOutcome {
    pub response: Option<BookMetadata>,
    /// True when the live query failed and a stale entry was served.
    pub degraded: bool,
    /// True when no provider query was issued for this call.
    pub from_cache: bool,
}

struct CacheState {
    loaded: bool,
    entries: LruCache<String, CacheEntry>,
}

/// Fingerprint-keyed provider lookup cache.
pub struct MetadataCache {
    ttl: Duration,
    path: Option<PathBuf>,
    state: Mutex<CacheState>,
    /// Per-fingerprint locks serializing in-flight provider queries.
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MetadataCache {
    /// Cache backed by a JSON file.
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        Self {
            ttl,
            path: Some(path),
            state: Mutex::new(CacheState {
                loaded: false,
                entries: LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap()),
            }),
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Memory-only cache (for tests).
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            ttl,
            path: None,
            state: Mutex::new(CacheState {
                loaded: true,
                entries: LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap()),
            }),
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Normalized query fingerprint: source + casefolded title/author.
    pub fn fingerprint(source: ProviderSource, query: &ProviderQuery) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(query.title.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(query.author.trim().to_lowercase().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look a fingerprint up without triggering any query.
    pub async fn lookup(&self, fingerprint: &str) -> Result<CacheLookup> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;

        match state.entries.get(fingerprint) {
            Some(entry) if self.is_fresh(entry) => Ok(CacheLookup::Fresh(entry.clone())),
            Some(entry) => Ok(CacheLookup::Stale(entry.clone())),
            None => Ok(CacheLookup::Miss),
        }
    }

    /// Record a response for a fingerprint and persist.
    pub async fn store(&self, fingerprint: &str, response: Option<BookMetadata>) -> Result<()> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        state.entries.put(
            fingerprint.to_string(),
            CacheEntry {
                response,
                fetched_at: Utc::now(),
            },
        );
        self.persist(&mut state).await
    }

    /// Serve from cache or run `fetch`, with at most one in-flight query
    /// per fingerprint.
    ///
    /// A failed live query falls back to a stale entry when one exists,
    /// flagged `degraded`; with nothing to fall back to, the error
    /// propagates.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        source: ProviderSource,
        query: &ProviderQuery,
        fetch: F,
    ) -> Result<CacheOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<BookMetadata>>>,
    {
        let fingerprint = Self::fingerprint(source, query);

        if let CacheLookup::Fresh(entry) = self.lookup(&fingerprint).await? {
            debug!(source = %source, "Cache hit");
            return Ok(CacheOutcome {
                response: entry.response,
                degraded: false,
                from_cache: true,
            });
        }

        let flight = {
            let mut flights = self.flights.lock().await;
            Arc::clone(flights.entry(fingerprint.clone()).or_default())
        };
        let _guard = flight.lock().await;

        // A concurrent requester may have populated the entry while we
        // waited on the flight lock.
        let stale = match self.lookup(&fingerprint).await? {
            CacheLookup::Fresh(entry) => {
                debug!(source = %source, "Cache populated by concurrent lookup");
                return Ok(CacheOutcome {
                    response: entry.response,
                    degraded: false,
                    from_cache: true,
                });
            }
            CacheLookup::Stale(entry) => Some(entry),
            CacheLookup::Miss => None,
        };

        match fetch().await {
            Ok(response) => {
                self.store(&fingerprint, response.clone()).await?;
                Ok(CacheOutcome {
                    response,
                    degraded: false,
                    from_cache: false,
                })
            }
            Err(e) => match stale {
                Some(entry) => {
                    warn!(source = %source, error = %e, "Live query failed, serving stale entry");
                    Ok(CacheOutcome {
                        response: entry.response,
                        degraded: true,
                        from_cache: true,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Drop every entry, in memory and on disk.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.loaded = true;
        if let Some(path) = &self.path {
            if path.exists() {
                tokio::fs::remove_file(path).await?;
            }
        }
        debug!("Cache cleared");
        Ok(())
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let age = Utc::now().signed_duration_since(entry.fetched_at);
        age.to_std().map(|age| age <= self.ttl).unwrap_or(true)
    }

    async fn ensure_loaded(&self, state: &mut CacheState) -> Result<()> {
        if state.loaded {
            return Ok(());
        }
        state.loaded = true;

        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let raw = tokio::fs::read_to_string(path).await?;
        let entries: HashMap<String, CacheEntry> = serde_json::from_str(&raw)
            .map_err(|e| MetadataError::Cache(format!("Malformed cache file: {}", e)))?;
        for (fingerprint, entry) in entries {
            state.entries.put(fingerprint, entry);
        }
        debug!(count = state.entries.len(), "Loaded metadata cache");
        Ok(())
    }

    async fn persist(&self, state: &mut CacheState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let entries: HashMap<&String, &CacheEntry> = state.entries.iter().collect();
        let raw = serde_json::to_string(&entries)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
