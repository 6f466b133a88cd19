//! Concurrent per-subject fetching against the search API.
//!
//! Subjects run in priority order, five at a time, with a short pause
//! between batches. Each subject gets its own credential selection,
//! retry loop, and error isolation: one subject failing never stops
//! the rest of the run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use newsapi_client::{ApiArticle, NewsApiClient, NewsApiError, SearchRequest, SearchResults};
use spotlight_common::{domain_of, CandidateArticle, RateLimitSnapshot, Subject};

use crate::credentials::{CallOutcome, CredentialPool};

/// Subjects fetched concurrently per batch.
pub const BATCH_SIZE: usize = 5;

/// Pause between batches, to stay polite to the API.
const INTER_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Attempts per subject before giving up.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay before retrying a transient failure; jitter is added so
/// concurrent subjects don't retry in lockstep.
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_secs(5);
const RETRY_JITTER_MS: u64 = 1000;

/// Wait applied when a 429 carries no `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// How far back searches look.
const LOOKBACK_DAYS: i64 = 7;

const PAGE_SIZE: u32 = 25;

/// Seam over the search API so the orchestrator can be driven by a
/// scripted double in tests.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(
        &self,
        request: &SearchRequest,
        api_key: &str,
    ) -> newsapi_client::Result<SearchResults>;

    async fn validate_key(&self, api_key: &str) -> newsapi_client::Result<()>;
}

#[async_trait]
impl SearchApi for NewsApiClient {
    async fn search(
        &self,
        request: &SearchRequest,
        api_key: &str,
    ) -> newsapi_client::Result<SearchResults> {
        NewsApiClient::search(self, request, api_key).await
    }

    async fn validate_key(&self, api_key: &str) -> newsapi_client::Result<()> {
        NewsApiClient::validate_key(self, api_key).await
    }
}

/// Aggregated result of one fetch phase across all subjects.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub articles: Vec<CandidateArticle>,
    /// Completed API responses. Rate-limited attempts are not counted;
    /// they are retried and show up at most once here.
    pub api_calls: u32,
    pub errors: Vec<String>,
    /// Most recent rate-limit headers seen this phase.
    pub rate_limit: Option<RateLimitSnapshot>,
    pub cancelled: bool,
}

impl FetchOutcome {
    fn absorb(&mut self, sub: SubjectFetch) {
        self.articles.extend(sub.articles);
        self.api_calls += sub.api_calls;
        self.errors.extend(sub.errors);
        if sub.rate_limit.is_some() {
            self.rate_limit = sub.rate_limit;
        }
        self.cancelled |= sub.cancelled;
    }
}

#[derive(Debug, Default)]
struct SubjectFetch {
    articles: Vec<CandidateArticle>,
    api_calls: u32,
    errors: Vec<String>,
    rate_limit: Option<RateLimitSnapshot>,
    cancelled: bool,
}

pub struct FetchOrchestrator {
    api: Arc<dyn SearchApi>,
    pool: Arc<CredentialPool>,
    language: String,
}

impl FetchOrchestrator {
    pub fn new(api: Arc<dyn SearchApi>, pool: Arc<CredentialPool>, language: String) -> Self {
        Self {
            api,
            pool,
            language,
        }
    }

    /// Fetch candidates for every active subject. Higher priority
    /// subjects go in earlier batches; within a batch all subjects run
    /// concurrently. Cancellation is honored between attempts and
    /// batches, never mid-request.
    pub async fn fetch_all(
        &self,
        subjects: &[Subject],
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let mut active: Vec<&Subject> = subjects.iter().filter(|s| s.active).collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

        info!(subjects = active.len(), "Fetch phase starting");

        let mut outcome = FetchOutcome::default();
        for (batch_no, batch) in active.chunks(BATCH_SIZE).enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            if batch_no > 0 && !sleep_unless_cancelled(INTER_BATCH_DELAY, cancel).await {
                outcome.cancelled = true;
                break;
            }

            let fetches = batch.iter().map(|s| self.fetch_subject(s, cancel));
            for sub in futures::future::join_all(fetches).await {
                outcome.absorb(sub);
            }
            if outcome.cancelled {
                break;
            }
        }

        info!(
            articles = outcome.articles.len(),
            api_calls = outcome.api_calls,
            errors = outcome.errors.len(),
            cancelled = outcome.cancelled,
            "Fetch phase complete"
        );
        outcome
    }

    async fn fetch_subject(&self, subject: &Subject, cancel: &CancellationToken) -> SubjectFetch {
        let mut result = SubjectFetch::default();
        let request = SearchRequest {
            query: format!("\"{}\"", subject.name),
            language: self.language.clone(),
            from: Utc::now() - chrono::Duration::days(LOOKBACK_DAYS),
            page_size: PAGE_SIZE,
        };

        for attempt in 1..=MAX_ATTEMPTS {
            if cancel.is_cancelled() {
                result.cancelled = true;
                return result;
            }

            let Some(selected) = self.pool.select_best(Utc::now()) else {
                result
                    .errors
                    .push(format!("{}: no healthy API keys available", subject.name));
                return result;
            };

            match self.api.search(&request, &selected.key).await {
                Ok(results) => {
                    self.pool
                        .report(selected.index, CallOutcome::success(), Utc::now());
                    result.api_calls += 1;
                    result.rate_limit = results.rate_limit.map(snapshot_from_headers);
                    debug!(
                        subject = %subject.name,
                        articles = results.articles.len(),
                        total = results.total_results,
                        "Subject fetched"
                    );
                    result.articles = results
                        .articles
                        .into_iter()
                        .filter_map(|a| candidate_from_api(a, &subject.name))
                        .collect();
                    return result;
                }
                Err(NewsApiError::RateLimited { retry_after }) => {
                    self.pool
                        .report(selected.index, CallOutcome::rate_limited(), Utc::now());
                    let wait = Duration::from_secs(retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS));
                    warn!(
                        subject = %subject.name,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "Rate limited, backing off before retry"
                    );
                    if attempt == MAX_ATTEMPTS
                        || !sleep_unless_cancelled(wait, cancel).await
                    {
                        result.cancelled = cancel.is_cancelled();
                        break;
                    }
                }
                Err(err) if err.is_transient() => {
                    self.pool
                        .report(selected.index, CallOutcome::failure(), Utc::now());
                    warn!(subject = %subject.name, attempt, error = %err, "Transient fetch failure");
                    if attempt == MAX_ATTEMPTS {
                        result.errors.push(format!("{}: {}", subject.name, err));
                        break;
                    }
                    let jitter = rand::rng().random_range(0..RETRY_JITTER_MS);
                    let wait = TRANSIENT_RETRY_DELAY + Duration::from_millis(jitter);
                    if !sleep_unless_cancelled(wait, cancel).await {
                        result.cancelled = true;
                        break;
                    }
                }
                Err(err) => {
                    // Auth errors, malformed responses: retrying with
                    // the same key will not help.
                    self.pool
                        .report(selected.index, CallOutcome::failure(), Utc::now());
                    if !matches!(err, NewsApiError::Network(_)) {
                        result.api_calls += 1;
                    }
                    warn!(subject = %subject.name, error = %err, "Fetch failed permanently");
                    result.errors.push(format!("{}: {}", subject.name, err));
                    return result;
                }
            }
        }

        if result.errors.is_empty() && !result.cancelled {
            result.errors.push(format!(
                "{}: gave up after {} attempts",
                subject.name, MAX_ATTEMPTS
            ));
        }
        result
    }

    /// Revalidate every pooled key against the live API. No-op inside
    /// the throttle window unless `force` is set.
    pub async fn run_health_check(&self, force: bool) {
        let Some(keys) = self.pool.begin_health_check(Utc::now(), force) else {
            debug!("Health check skipped, ran recently");
            return;
        };
        let mut verdicts = Vec::with_capacity(keys.len());
        for (index, key) in keys {
            let ok = self.api.validate_key(&key).await.is_ok();
            verdicts.push((index, ok));
        }
        self.pool.apply_health_check(&verdicts, Utc::now());
    }
}

/// False when the token fired before the delay elapsed.
async fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

fn snapshot_from_headers(headers: newsapi_client::RateLimitHeaders) -> RateLimitSnapshot {
    RateLimitSnapshot {
        remaining: headers.remaining,
        resets_at: headers
            .reset_epoch
            .and_then(|epoch| chrono::DateTime::from_timestamp(epoch, 0)),
    }
}

/// Map a raw API hit to a candidate. Hits without a usable title or
/// URL are dropped here, before scoring ever sees them.
fn candidate_from_api(article: ApiArticle, subject: &str) -> Option<CandidateArticle> {
    let title = article.title.filter(|t| !t.trim().is_empty() && t != "[Removed]")?;
    let source_domain = domain_of(&article.url)?;
    let source_name = article
        .source
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| source_domain.clone());

    Some(CandidateArticle {
        url: article.url,
        title,
        description: article.description.unwrap_or_default(),
        content: article.content,
        image_url: article.url_to_image,
        published_at: article.published_at,
        source_name,
        source_domain,
        subject: subject.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{api_article, ScriptedApi};

    fn subjects(names: &[&str]) -> Vec<Subject> {
        names.iter().map(|n| Subject::new(*n)).collect()
    }

    fn orchestrator(api: Arc<ScriptedApi>, keys: usize) -> FetchOrchestrator {
        let pool = Arc::new(CredentialPool::new(
            (0..keys).map(|i| format!("key-{i:04}")).collect(),
        ));
        FetchOrchestrator::new(api, pool, "en".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_every_active_subject() {
        let api = Arc::new(ScriptedApi::new());
        api.respond_ok("\"Zendaya\"", vec![api_article("https://people.com/z1")]);
        api.respond_ok("\"Sydney Sweeney\"", vec![api_article("https://pagesix.com/s1")]);

        let orch = orchestrator(api.clone(), 1);
        let mut subs = subjects(&["Zendaya", "Sydney Sweeney"]);
        subs.push(Subject {
            name: "Inactive".to_string(),
            active: false,
            priority: 99,
        });

        let outcome = orch.fetch_all(&subs, &CancellationToken::new()).await;
        assert_eq!(outcome.articles.len(), 2);
        assert_eq!(outcome.api_calls, 2);
        assert!(outcome.errors.is_empty());
        assert_eq!(api.calls(), 2, "inactive subject never queried");
    }

    #[tokio::test(start_paused = true)]
    async fn candidates_carry_their_subject_and_domain() {
        let api = Arc::new(ScriptedApi::new());
        api.respond_ok("\"Zendaya\"", vec![api_article("https://www.people.com/z1")]);

        let orch = orchestrator(api, 1);
        let outcome = orch
            .fetch_all(&subjects(&["Zendaya"]), &CancellationToken::new())
            .await;

        let article = &outcome.articles[0];
        assert_eq!(article.subject, "Zendaya");
        assert_eq!(article.source_domain, "people.com");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_then_success_counts_one_call() {
        let api = Arc::new(ScriptedApi::new());
        api.respond_rate_limited("\"Zendaya\"", Some(2));
        api.respond_ok("\"Zendaya\"", vec![api_article("https://people.com/z1")]);

        // Second key takes over while the first cools down.
        let orch = orchestrator(api.clone(), 2);
        let started = tokio::time::Instant::now();
        let outcome = orch
            .fetch_all(&subjects(&["Zendaya"]), &CancellationToken::new())
            .await;

        assert_eq!(outcome.articles.len(), 1);
        assert_eq!(outcome.api_calls, 1, "the 429 attempt is not counted");
        assert!(outcome.errors.is_empty());
        assert_eq!(api.calls(), 2);
        // The retry honored the advertised two-second wait, not the
        // sixty-second default.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2), "waited {waited:?}");
        assert!(waited < Duration::from_secs(60), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_exhaust_attempts_then_error() {
        let api = Arc::new(ScriptedApi::new());
        for _ in 0..3 {
            api.respond_transient("\"Zendaya\"");
        }

        let orch = orchestrator(api.clone(), 1);
        let outcome = orch
            .fetch_all(&subjects(&["Zendaya"]), &CancellationToken::new())
            .await;

        assert!(outcome.articles.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("Zendaya:"));
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_error_is_not_retried() {
        let api = Arc::new(ScriptedApi::new());
        api.respond_api_error("\"Zendaya\"", 401);

        let orch = orchestrator(api.clone(), 1);
        let outcome = orch
            .fetch_all(&subjects(&["Zendaya"]), &CancellationToken::new())
            .await;

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(api.calls(), 1, "permanent errors do not retry");
    }

    #[tokio::test(start_paused = true)]
    async fn one_subject_failing_does_not_stop_others() {
        let api = Arc::new(ScriptedApi::new());
        api.respond_api_error("\"Broken\"", 401);
        api.respond_ok("\"Zendaya\"", vec![api_article("https://people.com/z1")]);

        let orch = orchestrator(api, 1);
        let outcome = orch
            .fetch_all(&subjects(&["Broken", "Zendaya"]), &CancellationToken::new())
            .await;

        assert_eq!(outcome.articles.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_reports_error_without_calling_api() {
        let api = Arc::new(ScriptedApi::new());
        let orch = orchestrator(api.clone(), 0);
        let outcome = orch
            .fetch_all(&subjects(&["Zendaya"]), &CancellationToken::new())
            .await;

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("no healthy API keys"));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn higher_priority_subjects_go_first() {
        let api = Arc::new(ScriptedApi::new());
        // Six subjects with one high-priority straggler: it must land
        // in the first batch of five.
        let mut subs = subjects(&["A", "B", "C", "D", "E"]);
        subs.push(Subject {
            name: "Starlet".to_string(),
            active: true,
            priority: 10,
        });
        for s in &subs {
            api.respond_ok(&format!("\"{}\"", s.name), vec![]);
        }

        let orch = orchestrator(api.clone(), 1);
        orch.fetch_all(&subs, &CancellationToken::new()).await;

        let order = api.query_log();
        let pos = order
            .iter()
            .position(|q| q == "\"Starlet\"")
            .expect("starlet queried");
        assert!(pos < BATCH_SIZE, "priority subject in first batch, got {pos}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_batches() {
        let api = Arc::new(ScriptedApi::new());
        let names: Vec<String> = (0..7).map(|i| format!("S{i}")).collect();
        let subs: Vec<Subject> = names.iter().map(Subject::new).collect();
        for n in &names {
            api.respond_ok(&format!("\"{n}\""), vec![]);
        }

        let cancel = CancellationToken::new();
        cancel.cancel();

        let orch = orchestrator(api.clone(), 1);
        let outcome = orch.fetch_all(&subs, &cancel).await;

        assert!(outcome.cancelled);
        assert_eq!(api.calls(), 0, "already-cancelled run makes no calls");
    }

    #[tokio::test(start_paused = true)]
    async fn removed_articles_are_filtered_out() {
        let api = Arc::new(ScriptedApi::new());
        let mut removed = api_article("https://people.com/gone");
        removed.title = Some("[Removed]".to_string());
        let mut untitled = api_article("https://people.com/untitled");
        untitled.title = None;
        api.respond_ok(
            "\"Zendaya\"",
            vec![removed, untitled, api_article("https://people.com/ok")],
        );

        let orch = orchestrator(api, 1);
        let outcome = orch
            .fetch_all(&subjects(&["Zendaya"]), &CancellationToken::new())
            .await;

        assert_eq!(outcome.articles.len(), 1);
        assert_eq!(outcome.articles[0].url, "https://people.com/ok");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_snapshot_is_surfaced() {
        let api = Arc::new(ScriptedApi::new());
        api.respond_ok_with_headers(
            "\"Zendaya\"",
            vec![],
            newsapi_client::RateLimitHeaders {
                remaining: 7,
                reset_epoch: Some(1_756_100_000),
            },
        );

        let orch = orchestrator(api, 1);
        let outcome = orch
            .fetch_all(&subjects(&["Zendaya"]), &CancellationToken::new())
            .await;

        let snapshot = outcome.rate_limit.expect("snapshot captured");
        assert_eq!(snapshot.remaining, 7);
        assert!(snapshot.resets_at.is_some());
    }
}
