pub mod error;
pub mod types;

pub use error::{NewsApiError, Result};
pub use types::{
    ApiArticle, ApiSource, RateLimitHeaders, SearchRequest, SearchResponse, SearchResults,
};

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

const BASE_URL: &str = "https://newsapi.org/v2";

/// Per-request timeout. Search calls that hang past this are treated
/// as transient failures by the caller.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct NewsApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl NewsApiClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the client at a different host. Used by tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client with static config"),
            base_url: base_url.into(),
        }
    }

    /// Run one `/v2/everything` search with the given key.
    pub async fn search(&self, request: &SearchRequest, api_key: &str) -> Result<SearchResults> {
        let url = format!("{}/everything", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("q", request.query.as_str()),
                ("language", request.language.as_str()),
                ("from", &request.from.to_rfc3339()),
                ("pageSize", &request.page_size.to_string()),
                ("sortBy", "publishedAt"),
            ])
            .header("X-Api-Key", api_key)
            .send()
            .await?;

        let status = resp.status();
        let rate_limit = rate_limit_from_headers(resp.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_seconds(resp.headers());
            tracing::warn!(query = %request.query, ?retry_after, "Search API rate limited");
            return Err(NewsApiError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NewsApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: SearchResponse = resp.json().await?;
        if body.status != "ok" {
            return Err(NewsApiError::Api {
                status: status.as_u16(),
                message: format!("API returned status {}", body.status),
            });
        }

        tracing::debug!(
            query = %request.query,
            articles = body.articles.len(),
            total = body.total_results,
            "Search complete"
        );

        Ok(SearchResults {
            articles: body.articles,
            total_results: body.total_results,
            rate_limit,
        })
    }

    /// Lightweight key probe: a one-result search. Success means the
    /// key is accepted; 429 still counts as a live key.
    pub async fn validate_key(&self, api_key: &str) -> Result<()> {
        let url = format!("{}/everything", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("q", "news"), ("pageSize", "1")])
            .header("X-Api-Key", api_key)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() || status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(NewsApiError::Api {
            status: status.as_u16(),
            message: body,
        })
    }
}

impl Default for NewsApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `X-RateLimit-Remaining` / `X-RateLimit-Reset` if present.
fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitHeaders> {
    let remaining = header_number::<u32>(headers, "X-RateLimit-Remaining")?;
    let reset_epoch = header_number::<i64>(headers, "X-RateLimit-Reset");
    Some(RateLimitHeaders {
        remaining,
        reset_epoch,
    })
}

/// Parse `Retry-After` as delay seconds. HTTP-date forms are rare from
/// this API and are ignored.
fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    header_number::<u64>(headers, "Retry-After")
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
