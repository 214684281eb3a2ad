//! Canonical vendor-agnostic search result shape (§4.B).

use serde::{Deserialize, Serialize};

/// One organic search hit, normalized away from vendor-specific response
/// shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_date: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// The full response to a `search`/`searchMultiple` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub items: Vec<SearchResultItem>,
    pub provider: String,
}
