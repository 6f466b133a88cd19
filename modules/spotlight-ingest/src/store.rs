//! Persistence seams for the pipeline.
//!
//! The coordinator only ever talks to these traits. [`MemoryStore`]
//! backs single-process deployments and every test; a database-backed
//! implementation plugs in behind the same traits.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use spotlight_common::{RunRecord, ScoredArticle, SpotlightError, Subject};

/// Source of the subject roster. Read-only to the pipeline; the roster
/// is curated elsewhere.
#[async_trait]
pub trait SubjectStore: Send + Sync {
    async fn list_subjects(&self) -> Result<Vec<Subject>, SpotlightError>;
}

/// Durable article storage keyed by URL.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Which of `urls` already exist in storage.
    async fn known_urls(&self, urls: &[String]) -> Result<HashSet<String>, SpotlightError>;

    /// Insert a batch, skipping URLs that raced in since the
    /// `known_urls` check. Returns the number actually inserted.
    async fn insert_articles(&self, articles: &[ScoredArticle]) -> Result<u32, SpotlightError>;
}

/// Audit trail of ingestion runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Upsert by run id: called once at start and once at finish.
    async fn record_run(&self, record: &RunRecord) -> Result<(), SpotlightError>;

    async fn latest_run(&self) -> Result<Option<RunRecord>, SpotlightError>;
}

/// Publish surface for the finished, mixed feed. Consumers read the
/// cache; they never touch article storage directly.
#[async_trait]
pub trait FeedCache: Send + Sync {
    async fn publish(&self, namespace: &str, payload: serde_json::Value)
        -> Result<(), SpotlightError>;

    async fn read(&self, namespace: &str) -> Result<Option<serde_json::Value>, SpotlightError>;
}

#[derive(Default)]
struct MemoryInner {
    subjects: Vec<Subject>,
    articles: HashMap<String, ScoredArticle>,
    runs: Vec<RunRecord>,
    cache: HashMap<String, serde_json::Value>,
}

/// In-memory implementation of every store trait.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an active, default-priority subject roster.
    pub fn with_subjects(names: &[String]) -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                subjects: names.iter().map(Subject::new).collect(),
                ..Default::default()
            }),
        }
    }

    pub async fn article_count(&self) -> usize {
        self.inner.read().await.articles.len()
    }
}

#[async_trait]
impl SubjectStore for MemoryStore {
    async fn list_subjects(&self) -> Result<Vec<Subject>, SpotlightError> {
        Ok(self.inner.read().await.subjects.clone())
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn known_urls(&self, urls: &[String]) -> Result<HashSet<String>, SpotlightError> {
        let inner = self.inner.read().await;
        Ok(urls
            .iter()
            .filter(|u| inner.articles.contains_key(*u))
            .cloned()
            .collect())
    }

    async fn insert_articles(&self, articles: &[ScoredArticle]) -> Result<u32, SpotlightError> {
        let mut inner = self.inner.write().await;
        let mut inserted = 0;
        for article in articles {
            if inner.articles.contains_key(&article.article.url) {
                continue;
            }
            inner
                .articles
                .insert(article.article.url.clone(), article.clone());
            inserted += 1;
        }
        debug!(batch = articles.len(), inserted, "Article batch stored");
        Ok(inserted)
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn record_run(&self, record: &RunRecord) -> Result<(), SpotlightError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.runs.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
        } else {
            inner.runs.push(record.clone());
        }
        Ok(())
    }

    async fn latest_run(&self) -> Result<Option<RunRecord>, SpotlightError> {
        let inner = self.inner.read().await;
        Ok(inner
            .runs
            .iter()
            .max_by_key(|r| r.started_at)
            .cloned())
    }
}

#[async_trait]
impl FeedCache for MemoryStore {
    async fn publish(
        &self,
        namespace: &str,
        payload: serde_json::Value,
    ) -> Result<(), SpotlightError> {
        self.inner
            .write()
            .await
            .cache
            .insert(namespace.to_string(), payload);
        Ok(())
    }

    async fn read(&self, namespace: &str) -> Result<Option<serde_json::Value>, SpotlightError> {
        Ok(self.inner.read().await.cache.get(namespace).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scored;
    use chrono::Utc;

    #[tokio::test]
    async fn insert_skips_existing_urls() {
        let store = MemoryStore::new();
        let first = vec![scored("A", "https://x.test/1", None)];
        assert_eq!(store.insert_articles(&first).await.unwrap(), 1);

        let second = vec![
            scored("A", "https://x.test/1", None),
            scored("A", "https://x.test/2", None),
        ];
        assert_eq!(store.insert_articles(&second).await.unwrap(), 1);
        assert_eq!(store.article_count().await, 2);
    }

    #[tokio::test]
    async fn known_urls_returns_only_stored() {
        let store = MemoryStore::new();
        store
            .insert_articles(&[scored("A", "https://x.test/1", None)])
            .await
            .unwrap();

        let known = store
            .known_urls(&["https://x.test/1".to_string(), "https://x.test/2".to_string()])
            .await
            .unwrap();
        assert!(known.contains("https://x.test/1"));
        assert!(!known.contains("https://x.test/2"));
    }

    #[tokio::test]
    async fn record_run_upserts_by_id() {
        let store = MemoryStore::new();
        let mut record = RunRecord::start(vec!["A".to_string()], Utc::now());
        store.record_run(&record).await.unwrap();

        record.added = 5;
        store.record_run(&record).await.unwrap();

        let latest = store.latest_run().await.unwrap().unwrap();
        assert_eq!(latest.id, record.id);
        assert_eq!(latest.added, 5);
    }

    #[tokio::test]
    async fn seeded_subjects_are_active() {
        let store = MemoryStore::with_subjects(&["Zendaya".to_string()]);
        let subjects = store.list_subjects().await.unwrap();
        assert_eq!(subjects.len(), 1);
        assert!(subjects[0].active);
    }

    #[tokio::test]
    async fn cache_publish_then_read() {
        let store = MemoryStore::new();
        assert!(store.read("articles").await.unwrap().is_none());
        store
            .publish("articles", serde_json::json!({"count": 3}))
            .await
            .unwrap();
        let value = store.read("articles").await.unwrap().unwrap();
        assert_eq!(value["count"], 3);
    }
}
