//! Audible catalog connector implementation
//!
//! Implements the `MetadataProvider` trait over the Audible catalog
//! products API.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use core_library::BookMetadata;
use core_metadata::provider::{MetadataProvider, ProviderQuery, ProviderSource};

use crate::error::AudibleError;
use crate::types::{CatalogResponse, Product};

/// Response groups required to map a product onto the canonical record
const RESPONSE_GROUPS: &str = "contributors,product_attrs,product_desc,product_extended_attrs,series,category_ladders";

/// Maximum retry attempts for throttled or failing requests
const MAX_RETRIES: u32 = 3;

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Audible catalog connector
///
/// # Features
///
/// - Marketplace-aware base URL (`us`, `uk`, `de`, ...)
/// - Exponential backoff on 429 and 5xx responses
/// - Maps narrator credits from the dedicated `narrators` field only;
///   composer/contributor credits never leak into the narrator slot
pub struct AudibleProvider {
    client: reqwest::Client,
    base_url: String,
}

impl AudibleProvider {
    /// Create a connector for the given marketplace region.
    ///
    /// # Errors
    ///
    /// Fails on an unrecognized region code.
    pub fn new(region: &str) -> crate::error::Result<Self> {
        let tld = region_tld(region)?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: format!("https://api.audible.{}/1.0", tld),
        })
    }

    /// Override the base URL (for tests against a local server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Execute a GET with retry on throttling and server errors.
    async fn execute_with_retry(&self, url: &str) -> crate::error::Result<String> {
        let mut attempt = 0;

        loop {
            let response = self
                .client
                .get(url)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|e| AudibleError::NetworkError(e.to_string()));
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    attempt += 1;
                    if !retryable || attempt >= MAX_RETRIES {
                        return Err(AudibleError::ApiError {
                            status_code: status.as_u16(),
                            message: response.text().await.unwrap_or_default(),
                        });
                    }

                    let backoff_ms = 250u64 * 2u64.pow(attempt);
                    warn!(
                        status = status.as_u16(),
                        attempt, backoff_ms, "Audible request throttled, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        return Err(AudibleError::NetworkError(e.to_string()));
                    }
                    let backoff_ms = 250u64 * 2u64.pow(attempt);
                    warn!(error = %e, attempt, backoff_ms, "Audible request failed, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }
}

#[async_trait]
impl MetadataProvider for AudibleProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Audible
    }

    #[instrument(skip(self), fields(title = %query.title, author = %query.author))]
    async fn search(&self, query: &ProviderQuery) -> core_metadata::Result<Option<BookMetadata>> {
        let mut url = format!(
            "{}/catalog/products?title={}&num_results=1&response_groups={}",
            self.base_url,
            urlencoding::encode(&query.title),
            RESPONSE_GROUPS
        );
        if !query.author.trim().is_empty() {
            url.push_str(&format!("&author={}", urlencoding::encode(&query.author)));
        }

        let body = self
            .execute_with_retry(&url)
            .await
            .map_err(Into::<core_metadata::MetadataError>::into)?;
        let catalog: CatalogResponse = serde_json::from_str(&body)
            .map_err(|e| AudibleError::ParseError(e.to_string()))
            .map_err(Into::<core_metadata::MetadataError>::into)?;

        let Some(product) = catalog.products.into_iter().next() else {
            debug!("No Audible match");
            return Ok(None);
        };

        debug!(asin = %product.asin, "Audible match");
        Ok(Some(convert_product(product)))
    }
}

/// Map a catalog product onto the canonical record.
fn convert_product(product: Product) -> BookMetadata {
    let series = product.series.first();

    BookMetadata {
        title: product.title.filter(|t| !t.trim().is_empty()),
        subtitle: product.subtitle.filter(|s| !s.trim().is_empty()),
        author: join_people(&product.authors),
        narrator: join_people(&product.narrators),
        series: series.map(|s| s.title.clone()),
        sequence: series.and_then(|s| s.sequence.clone()),
        year: product.release_date.as_deref().and_then(year_of),
        genres: genres_from_ladders(&product.category_ladders),
        description: product
            .publisher_summary
            .as_deref()
            .map(strip_html)
            .filter(|d| !d.is_empty()),
        publisher: product.publisher_name.filter(|p| !p.trim().is_empty()),
        isbn: None,
        asin: Some(product.asin),
    }
}

fn join_people(people: &[crate::types::Person]) -> Option<String> {
    let names: Vec<&str> = people
        .iter()
        .map(|p| p.name.trim())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

/// Year component of a `YYYY-MM-DD` release date.
fn year_of(date: &str) -> Option<String> {
    date.split('-')
        .next()
        .map(str::trim)
        .filter(|y| y.len() == 4 && y.chars().all(|c| c.is_ascii_digit()))
        .map(|y| y.to_string())
}

/// The most specific category of each ladder, deduplicated in order.
fn genres_from_ladders(ladders: &[crate::types::CategoryLadder]) -> Vec<String> {
    let mut genres = Vec::new();
    for ladder in ladders {
        if let Some(category) = ladder.ladder.last() {
            let name = category.name.trim();
            if !name.is_empty() && !genres.iter().any(|g: &String| g.eq_ignore_ascii_case(name)) {
                genres.push(name.to_string());
            }
        }
    }
    genres
}

/// Drop HTML tags and entity-decode the handful Audible summaries use.
fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn region_tld(region: &str) -> crate::error::Result<&'static str> {
    match region.to_lowercase().as_str() {
        "us" => Ok("com"),
        "ca" => Ok("ca"),
        "uk" | "gb" => Ok("co.uk"),
        "au" => Ok("com.au"),
        "de" => Ok("de"),
        "fr" => Ok("fr"),
        "it" => Ok("it"),
        "es" => Ok("es"),
        "in" => Ok("in"),
        "jp" => Ok("co.jp"),
        other => Err(AudibleError::UnknownRegion(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, CategoryLadder, Person, SeriesEntry};

    #[test]
    fn region_mapping() {
        assert_eq!(region_tld("us").unwrap(), "com");
        assert_eq!(region_tld("UK").unwrap(), "co.uk");
        assert!(region_tld("zz").is_err());
    }

    #[test]
    fn year_extraction() {
        assert_eq!(year_of("2021-01-02").as_deref(), Some("2021"));
        assert_eq!(year_of("2021").as_deref(), Some("2021"));
        assert_eq!(year_of("soon"), None);
    }

    #[test]
    fn html_stripping() {
        assert_eq!(
            strip_html("<p>A &amp; B</p><br/>Second"),
            "A & B Second"
        );
    }

    #[test]
    fn product_conversion_keeps_narrator_first_class() {
        let product = Product {
            asin: "B00TEST".to_string(),
            title: Some("BookA".to_string()),
            subtitle: None,
            authors: vec![Person {
                name: "Jane Doe".to_string(),
            }],
            narrators: vec![Person {
                name: "John Smith".to_string(),
            }],
            series: vec![SeriesEntry {
                title: "Wayfarers".to_string(),
                sequence: Some("2".to_string()),
            }],
            release_date: Some("2021-05-04".to_string()),
            publisher_name: Some("Audible Studios".to_string()),
            publisher_summary: Some("<b>Great</b> book".to_string()),
            category_ladders: vec![CategoryLadder {
                ladder: vec![
                    Category {
                        name: "Fiction".to_string(),
                    },
                    Category {
                        name: "Mystery".to_string(),
                    },
                ],
            }],
        };

        let metadata = convert_product(product);
        assert_eq!(metadata.narrator.as_deref(), Some("John Smith"));
        assert_eq!(metadata.author.as_deref(), Some("Jane Doe"));
        assert_eq!(metadata.series.as_deref(), Some("Wayfarers"));
        assert_eq!(metadata.sequence.as_deref(), Some("2"));
        assert_eq!(metadata.year.as_deref(), Some("2021"));
        assert_eq!(metadata.genres, vec!["Mystery"]);
        assert_eq!(metadata.description.as_deref(), Some("Great book"));
        assert_eq!(metadata.asin.as_deref(), Some("B00TEST"));
    }

    #[test]
    fn empty_fields_stay_absent() {
        let product = Product {
            asin: "B00TEST".to_string(),
            title: Some("  ".to_string()),
            subtitle: None,
            authors: vec![],
            narrators: vec![],
            series: vec![],
            release_date: None,
            publisher_name: None,
            publisher_summary: None,
            category_ladders: vec![],
        };
        let metadata = convert_product(product);
        assert_eq!(metadata.title, None);
        assert_eq!(metadata.author, None);
        assert_eq!(metadata.narrator, None);
        assert!(metadata.genres.is_empty());
    }
}
