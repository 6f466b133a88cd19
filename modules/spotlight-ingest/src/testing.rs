//! Test doubles and fixture builders shared across the crate's tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use newsapi_client::{
    ApiArticle, ApiSource, NewsApiError, RateLimitHeaders, SearchRequest, SearchResults,
};
use spotlight_common::{ArticleScore, CandidateArticle, ScoredArticle};

use crate::fetch::SearchApi;

pub fn candidate(subject: &str, url: &str, published_at: Option<DateTime<Utc>>) -> CandidateArticle {
    CandidateArticle {
        url: url.to_string(),
        title: format!("{subject} spotted in new photos"),
        description: String::new(),
        content: None,
        image_url: None,
        published_at,
        source_name: "Example".to_string(),
        source_domain: "example.org".to_string(),
        subject: subject.to_string(),
    }
}

pub fn candidate_with_text(
    subject: &str,
    url: &str,
    title: &str,
    source_domain: &str,
) -> CandidateArticle {
    CandidateArticle {
        title: title.to_string(),
        source_domain: source_domain.to_string(),
        ..candidate(subject, url, None)
    }
}

/// A candidate wrapped with a fixed passing score, for pipeline stages
/// downstream of the scorer.
pub fn scored(subject: &str, url: &str, published_at: Option<DateTime<Utc>>) -> ScoredArticle {
    ScoredArticle {
        article: candidate(subject, url, published_at),
        score: ArticleScore {
            visual_appeal: 70,
            relevance: 70,
            overall: 70,
            content_type: None,
            reasons: vec!["fixture".to_string()],
        },
    }
}

/// A raw API hit with a photo-heavy title so it survives scoring at
/// the default threshold.
pub fn api_article(url: &str) -> ApiArticle {
    ApiArticle {
        source: ApiSource {
            id: None,
            name: Some("People".to_string()),
        },
        author: Some("Staff".to_string()),
        title: Some("Star stuns in bikini during beach photoshoot".to_string()),
        description: Some("New photos from the weekend.".to_string()),
        url: url.to_string(),
        url_to_image: Some(format!("{url}/image.jpg")),
        published_at: Some(Utc::now()),
        content: None,
    }
}

enum Script {
    Ok {
        articles: Vec<ApiArticle>,
        rate_limit: Option<RateLimitHeaders>,
    },
    RateLimited {
        retry_after: Option<u64>,
    },
    Transient,
    ApiError {
        status: u16,
    },
}

struct ScriptedInner {
    scripts: HashMap<String, VecDeque<Script>>,
    query_log: Vec<String>,
    failing_keys: HashSet<String>,
}

/// Scripted [`SearchApi`]: responses are enqueued per query and popped
/// in order. Queries with no script left answer an empty page.
pub struct ScriptedApi {
    inner: Mutex<ScriptedInner>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ScriptedInner {
                scripts: HashMap::new(),
                query_log: Vec::new(),
                failing_keys: HashSet::new(),
            }),
        }
    }

    pub fn respond_ok(&self, query: &str, articles: Vec<ApiArticle>) {
        self.push(
            query,
            Script::Ok {
                articles,
                rate_limit: None,
            },
        );
    }

    pub fn respond_ok_with_headers(
        &self,
        query: &str,
        articles: Vec<ApiArticle>,
        rate_limit: RateLimitHeaders,
    ) {
        self.push(
            query,
            Script::Ok {
                articles,
                rate_limit: Some(rate_limit),
            },
        );
    }

    pub fn respond_rate_limited(&self, query: &str, retry_after: Option<u64>) {
        self.push(query, Script::RateLimited { retry_after });
    }

    pub fn respond_transient(&self, query: &str) {
        self.push(query, Script::Transient);
    }

    pub fn respond_api_error(&self, query: &str, status: u16) {
        self.push(query, Script::ApiError { status });
    }

    /// Make `validate_key` reject this key.
    pub fn fail_key(&self, key: &str) {
        self.lock().failing_keys.insert(key.to_string());
    }

    /// Total search calls received.
    pub fn calls(&self) -> usize {
        self.lock().query_log.len()
    }

    /// Queries in arrival order.
    pub fn query_log(&self) -> Vec<String> {
        self.lock().query_log.clone()
    }

    fn push(&self, query: &str, script: Script) {
        self.lock()
            .scripts
            .entry(query.to_string())
            .or_default()
            .push_back(script);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchApi for ScriptedApi {
    async fn search(
        &self,
        request: &SearchRequest,
        _api_key: &str,
    ) -> newsapi_client::Result<SearchResults> {
        let script = {
            let mut inner = self.lock();
            inner.query_log.push(request.query.clone());
            inner
                .scripts
                .get_mut(&request.query)
                .and_then(VecDeque::pop_front)
        };

        match script {
            None => Ok(SearchResults {
                articles: Vec::new(),
                total_results: 0,
                rate_limit: None,
            }),
            Some(Script::Ok {
                articles,
                rate_limit,
            }) => {
                let total = articles.len() as u32;
                Ok(SearchResults {
                    articles,
                    total_results: total,
                    rate_limit,
                })
            }
            Some(Script::RateLimited { retry_after }) => {
                Err(NewsApiError::RateLimited { retry_after })
            }
            Some(Script::Transient) => Err(NewsApiError::Network("connection reset".to_string())),
            Some(Script::ApiError { status }) => Err(NewsApiError::Api {
                status,
                message: "scripted error".to_string(),
            }),
        }
    }

    async fn validate_key(&self, api_key: &str) -> newsapi_client::Result<()> {
        if self.lock().failing_keys.contains(api_key) {
            return Err(NewsApiError::Api {
                status: 401,
                message: "invalid key".to_string(),
            });
        }
        Ok(())
    }
}
