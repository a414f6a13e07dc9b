//! Audiobookshelf API wire types

use serde::{Deserialize, Serialize};

/// One library item as listed by `/api/libraries/{id}/items`
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryItem {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub media: Option<Media>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub metadata: Option<ItemMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    pub title: Option<String>,
    pub author_name: Option<String>,
}

/// Paged items listing response
#[derive(Debug, Deserialize)]
pub struct ItemsResponse {
    pub results: Vec<LibraryItem>,
}

/// `PATCH /api/items/{id}/media` response
#[derive(Debug, Deserialize)]
pub struct UpdateMediaResponse {
    pub updated: bool,
}

/// One item that could not be pushed
#[derive(Debug, Clone, Serialize)]
pub struct PushFailure {
    pub path: String,
    pub reason: String,
    /// HTTP status when the server answered at all
    pub status: Option<u16>,
}
