use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameters for one `/v2/everything` search call.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    /// ISO 639-1 language code.
    pub language: String,
    /// Lower bound on publish time.
    pub from: DateTime<Utc>,
    pub page_size: u32,
}

/// Raw `/v2/everything` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub status: String,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub articles: Vec<ApiArticle>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiArticle {
    #[serde(default)]
    pub source: ApiSource,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Rate-limit headers returned alongside a response, when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub remaining: u32,
    /// Epoch seconds at which the window resets.
    pub reset_epoch: Option<i64>,
}

/// One successful search call: the article page plus whatever
/// rate-limit telemetry the API attached.
#[derive(Debug)]
pub struct SearchResults {
    pub articles: Vec<ApiArticle>,
    pub total_results: u32,
    pub rate_limit: Option<RateLimitHeaders>,
}
