//! Audible catalog API response types
//!
//! Data structures for deserializing `/1.0/catalog/products` responses.

use serde::Deserialize;

/// Catalog search response
#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub products: Vec<Product>,
}

/// One catalog product
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub asin: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub authors: Vec<Person>,
    #[serde(default)]
    pub narrators: Vec<Person>,
    #[serde(default)]
    pub series: Vec<SeriesEntry>,
    /// `YYYY-MM-DD`
    pub release_date: Option<String>,
    pub publisher_name: Option<String>,
    /// HTML-formatted long description
    pub publisher_summary: Option<String>,
    #[serde(default)]
    pub category_ladders: Vec<CategoryLadder>,
}

/// Author or narrator credit
#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    pub name: String,
}

/// Series membership with position
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesEntry {
    pub title: String,
    pub sequence: Option<String>,
}

/// One genre ladder, broadest category first
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryLadder {
    #[serde(default)]
    pub ladder: Vec<Category>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
}
