//! Google Books volumes connector implementation
//!
//! Implements the `MetadataProvider` trait over the Google Books
//! volumes API. Anonymous queries work; an API key raises quota.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use core_library::BookMetadata;
use core_metadata::provider::{MetadataProvider, ProviderQuery, ProviderSource};

use crate::error::GoogleBooksError;
use crate::types::{VolumeInfo, VolumesResponse};

/// Volumes API endpoint
const VOLUMES_API_BASE: &str = "https://www.googleapis.com/books/v1";

/// Maximum retry attempts for throttled or failing requests
const MAX_RETRIES: u32 = 3;

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Books volumes connector
pub struct GoogleBooksProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: VOLUMES_API_BASE.to_string(),
            api_key,
        }
    }

    /// Override the base URL (for tests against a local server).
    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn execute_with_retry(&self, url: &str) -> crate::error::Result<String> {
        let mut attempt = 0;

        loop {
            match self.client.get(url).timeout(REQUEST_TIMEOUT).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|e| GoogleBooksError::NetworkError(e.to_string()));
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    attempt += 1;
                    if !retryable || attempt >= MAX_RETRIES {
                        return Err(GoogleBooksError::ApiError {
                            status_code: status.as_u16(),
                            message: response.text().await.unwrap_or_default(),
                        });
                    }

                    let backoff_ms = 250u64 * 2u64.pow(attempt);
                    warn!(
                        status = status.as_u16(),
                        attempt, backoff_ms, "Google Books request throttled, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        return Err(GoogleBooksError::NetworkError(e.to_string()));
                    }
                    let backoff_ms = 250u64 * 2u64.pow(attempt);
                    warn!(error = %e, attempt, backoff_ms, "Google Books request failed, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }
}

#[async_trait]
impl MetadataProvider for GoogleBooksProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::GoogleBooks
    }

    #[instrument(skip(self), fields(title = %query.title, author = %query.author))]
    async fn search(&self, query: &ProviderQuery) -> core_metadata::Result<Option<BookMetadata>> {
        let mut q = format!("intitle:\"{}\"", query.title);
        if !query.author.trim().is_empty() {
            q.push_str(&format!(" inauthor:\"{}\"", query.author));
        }

        let mut url = format!(
            "{}/volumes?q={}&maxResults=1&printType=books",
            self.base_url,
            urlencoding::encode(&q)
        );
        if let Some(key) = &self.api_key {
            url.push_str(&format!("&key={}", urlencoding::encode(key)));
        }

        let body = self
            .execute_with_retry(&url)
            .await
            .map_err(Into::<core_metadata::MetadataError>::into)?;
        let volumes: VolumesResponse = serde_json::from_str(&body)
            .map_err(|e| GoogleBooksError::ParseError(e.to_string()))
            .map_err(Into::<core_metadata::MetadataError>::into)?;

        let Some(volume) = volumes.items.into_iter().next() else {
            debug!("No Google Books match");
            return Ok(None);
        };

        Ok(Some(convert_volume(volume.volume_info)))
    }
}

/// Map a volume onto the canonical record.
///
/// Google Books has no narrator concept; the slot stays absent rather
/// than borrowing a contributor credit.
fn convert_volume(info: VolumeInfo) -> BookMetadata {
    let isbn = pick_isbn(&info);

    BookMetadata {
        title: info.title.filter(|t| !t.trim().is_empty()),
        subtitle: info.subtitle.filter(|s| !s.trim().is_empty()),
        author: if info.authors.is_empty() {
            None
        } else {
            Some(info.authors.join(", "))
        },
        narrator: None,
        series: None,
        sequence: None,
        year: info.published_date.as_deref().and_then(year_of),
        genres: info.categories.clone(),
        description: info.description.filter(|d| !d.trim().is_empty()),
        publisher: info.publisher.filter(|p| !p.trim().is_empty()),
        isbn,
        asin: None,
    }
}

/// Prefer ISBN-13 over ISBN-10.
fn pick_isbn(info: &VolumeInfo) -> Option<String> {
    info.industry_identifiers
        .iter()
        .find(|id| id.kind == "ISBN_13")
        .or_else(|| {
            info.industry_identifiers
                .iter()
                .find(|id| id.kind == "ISBN_10")
        })
        .map(|id| id.identifier.clone())
}

/// Year component of `YYYY[-MM[-DD]]`.
fn year_of(date: &str) -> Option<String> {
    date.split('-')
        .next()
        .map(str::trim)
        .filter(|y| y.len() == 4 && y.chars().all(|c| c.is_ascii_digit()))
        .map(|y| y.to_string())
}
