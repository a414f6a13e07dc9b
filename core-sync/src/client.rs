//! # Audiobookshelf Sync Client
//!
//! Pushes canonical metadata to a remote Audiobookshelf library.
//!
//! ## Matching
//!
//! Each pushed path resolves to a remote item by normalized path
//! equality first, then by walking parent prefixes (a multi-file book is
//! indexed by its folder), then by title/author lookup. An item the
//! server has not indexed yet is *unmatched* - informational, reported
//! separately from hard failures.

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use core_library::BookMetadata;
use core_runtime::config::ServerConfig;

use crate::error::{Result, SyncError};
use crate::types::{ItemsResponse, LibraryItem, PushFailure, UpdateMediaResponse};

/// Page size when listing library items
const PAGE_LIMIT: usize = 200;

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One file to push: its on-disk path and the metadata to apply.
#[derive(Debug, Clone)]
pub struct PushItem {
    pub path: PathBuf,
    pub metadata: BookMetadata,
}

/// Batch outcome: full accounting of what happened to every item.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub updated: usize,
    pub unmatched: Vec<String>,
    pub failed: Vec<PushFailure>,
}

/// Audiobookshelf REST client.
pub struct ShelfClient {
    client: reqwest::Client,
    config: ServerConfig,
}

impl ShelfClient {
    /// # Errors
    ///
    /// Fails when base URL, token, or library ID is missing.
    pub fn new(config: ServerConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(SyncError::NotConfigured);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    /// Push metadata for a batch of already-written files.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn push_updates(&self, items: &[PushItem]) -> Result<SyncReport> {
        if items.is_empty() {
            return Ok(SyncReport::default());
        }

        let library_items = self.fetch_library_items().await?;
        let by_path = index_by_path(&library_items);
        let by_title = index_by_title_author(&library_items);

        let mut report = SyncReport::default();
        let mut targets: Vec<(&LibraryItem, &PushItem)> = Vec::new();
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for item in items {
            let normalized = normalize_path(&item.path.to_string_lossy());
            let matched = match_item(&normalized, &item.metadata, &by_path, &by_title);

            match matched {
                Some(library_item) => {
                    // A multi-file book maps several paths onto one item;
                    // push it once.
                    if seen_ids.insert(library_item.id.as_str()) {
                        targets.push((library_item, item));
                    }
                }
                None => {
                    debug!(path = %item.path.display(), "No remote item for path");
                    report.unmatched.push(item.path.to_string_lossy().into_owned());
                }
            }
        }

        for (library_item, push_item) in targets {
            let path = push_item.path.to_string_lossy().into_owned();
            match self.update_item(&library_item.id, &push_item.metadata).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.failed.push(PushFailure {
                    path,
                    reason: format!("Server reported no updates for {}", library_item.path),
                    status: None,
                }),
                Err(e) => {
                    let status = match &e {
                        SyncError::Api { status_code, .. } => Some(*status_code),
                        _ => None,
                    };
                    warn!(error = %e, item = %library_item.id, "Push failed");
                    report.failed.push(PushFailure {
                        path,
                        reason: e.to_string(),
                        status,
                    });
                }
            }
        }

        info!(
            updated = report.updated,
            unmatched = report.unmatched.len(),
            failed = report.failed.len(),
            "Push complete"
        );
        Ok(report)
    }

    /// Ask the server to rescan the library (so pushed tags get re-read).
    pub async fn trigger_rescan(&self) -> Result<()> {
        let url = format!(
            "{}/api/libraries/{}/scan",
            self.config.base_url, self.config.library_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::Api {
                status_code: response.status().as_u16(),
                message: "Failed to trigger rescan".to_string(),
            });
        }
        info!("Library rescan triggered");
        Ok(())
    }

    /// Page through every item in the configured library.
    async fn fetch_library_items(&self) -> Result<Vec<LibraryItem>> {
        let mut items = Vec::new();
        let mut page = 0usize;

        loop {
            let url = format!(
                "{}/api/libraries/{}/items?limit={}&page={}",
                self.config.base_url, self.config.library_id, PAGE_LIMIT, page
            );
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.config.api_token)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|e| SyncError::Network(e.to_string()))?;

            if !response.status().is_success() {
                return Err(SyncError::Api {
                    status_code: response.status().as_u16(),
                    message: "Failed to list library items".to_string(),
                });
            }

            let payload: ItemsResponse = response
                .json()
                .await
                .map_err(|e| SyncError::Parse(e.to_string()))?;

            let count = payload.results.len();
            items.extend(payload.results);

            if count < PAGE_LIMIT {
                break;
            }
            page += 1;
        }

        debug!(count = items.len(), "Fetched library items");
        Ok(items)
    }

    async fn update_item(&self, item_id: &str, metadata: &BookMetadata) -> Result<bool> {
        let url = format!("{}/api/items/{}/media", self.config.base_url, item_id);
        let payload = build_update_payload(metadata);

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.config.api_token)
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Api {
                status_code: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: UpdateMediaResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Parse(e.to_string()))?;
        Ok(body.updated)
    }
}

/// Fold backslashes and trailing slashes so local and server paths
/// compare.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut normalized = trimmed.replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

fn index_by_path(items: &[LibraryItem]) -> HashMap<String, &LibraryItem> {
    let mut index = HashMap::new();
    for item in items {
        let normalized = normalize_path(&item.path);
        if !normalized.is_empty() {
            index.insert(normalized, item);
        }
    }
    index
}

fn index_by_title_author(items: &[LibraryItem]) -> HashMap<(String, String), &LibraryItem> {
    let mut index = HashMap::new();
    for item in items {
        let Some(metadata) = item.media.as_ref().and_then(|m| m.metadata.as_ref()) else {
            continue;
        };
        let Some(title) = metadata.title.as_deref() else {
            continue;
        };
        let author = metadata.author_name.as_deref().unwrap_or("");
        index.insert(title_author_key(title, author), item);
    }
    index
}

fn title_author_key(title: &str, author: &str) -> (String, String) {
    (
        title.trim().to_lowercase(),
        author.trim().to_lowercase(),
    )
}

/// Resolve a pushed path to a remote item: exact path, parent prefixes,
/// then title/author.
fn match_item<'a>(
    normalized_path: &str,
    metadata: &BookMetadata,
    by_path: &HashMap<String, &'a LibraryItem>,
    by_title: &HashMap<(String, String), &'a LibraryItem>,
) -> Option<&'a LibraryItem> {
    if normalized_path.is_empty() {
        return None;
    }
    if let Some(item) = by_path.get(normalized_path) {
        return Some(*item);
    }

    // The server indexes a multi-file book by its folder; walk up.
    let mut current = normalized_path.to_string();
    while let Some(pos) = current.rfind('/') {
        if pos == 0 {
            if let Some(item) = by_path.get("/") {
                return Some(*item);
            }
            break;
        }
        current.truncate(pos);
        if let Some(item) = by_path.get(&current) {
            return Some(*item);
        }
    }

    let title = metadata.title.as_deref()?;
    let author = metadata.author.as_deref().unwrap_or("");
    by_title.get(&title_author_key(title, author)).copied()
}

/// Build the `PATCH /api/items/{id}/media` payload, skipping blank
/// fields so the server keeps whatever it already has.
fn build_update_payload(metadata: &BookMetadata) -> Value {
    let mut map = serde_json::Map::new();

    let mut set = |key: &str, value: Option<&str>| {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            map.insert(key.to_string(), json!(value));
        }
    };

    set("title", metadata.title.as_deref());
    set("subtitle", metadata.subtitle.as_deref());
    set("description", metadata.description.as_deref());
    set("publisher", metadata.publisher.as_deref());
    set("publishedYear", metadata.year.as_deref());
    set("isbn", metadata.isbn.as_deref());
    set("asin", metadata.asin.as_deref());

    if let Some(narrator) = metadata
        .narrator
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        map.insert("narrators".to_string(), json!([narrator]));
    }

    if !metadata.genres.is_empty() {
        map.insert("genres".to_string(), json!(metadata.genres));
    }

    let authors = split_authors(metadata.author.as_deref().unwrap_or(""));
    if !authors.is_empty() {
        let values: Vec<Value> = authors
            .into_iter()
            .enumerate()
            .map(|(idx, name)| json!({ "id": format!("new-{}", idx + 1), "name": name }))
            .collect();
        map.insert("authors".to_string(), Value::Array(values));
    }

    if let Some(series) = metadata
        .series
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let mut entry = serde_json::Map::new();
        entry.insert("id".to_string(), json!("new-1"));
        entry.insert("name".to_string(), json!(series));
        if let Some(sequence) = metadata
            .sequence
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            entry.insert("sequence".to_string(), json!(sequence));
        }
        map.insert("series".to_string(), Value::Array(vec![Value::Object(entry)]));
    }

    json!({ "metadata": map })
}

/// Split a joint author credit on the separators rips actually use.
pub fn split_authors(author: &str) -> Vec<String> {
    let trimmed = author.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let has_multiple = trimmed.contains('&')
        || trimmed.contains(" and ")
        || trimmed.contains(';')
        || trimmed.contains('/')
        || trimmed.contains('|');
    if !has_multiple {
        return vec![trimmed.to_string()];
    }

    trimmed
        .replace(" & ", ";")
        .replace(" and ", ";")
        .replace('/', ";")
        .replace('|', ";")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
