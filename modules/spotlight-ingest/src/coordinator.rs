//! Single-flight run coordination: fetch, score, dedup, mix, persist.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use spotlight_common::{
    Config, RunRecord, RunResult, RunStatus, ScoredArticle, SpotlightError,
};

use crate::credentials::CredentialPool;
use crate::fetch::{FetchOrchestrator, SearchApi};
use crate::mixer;
use crate::scoring::{should_keep, ContentScorer};
use crate::stats::IngestStats;
use crate::store::{ArticleStore, FeedCache, RunStore, SubjectStore};

/// Articles persisted per storage round-trip.
const INSERT_BATCH_SIZE: usize = 20;

/// Cache namespace the finished feed is published under.
pub const CACHE_NAMESPACE: &str = "articles";

pub struct RunCoordinator {
    fetcher: FetchOrchestrator,
    scorer: ContentScorer,
    pool: Arc<CredentialPool>,
    subjects: Arc<dyn SubjectStore>,
    articles: Arc<dyn ArticleStore>,
    runs: Arc<dyn RunStore>,
    cache: Arc<dyn FeedCache>,
    score_threshold: u8,
    run_interval: Duration,
    // Held for the whole run; try_lock makes overlap a fast error
    // instead of a queue.
    run_lock: Mutex<()>,
}

impl RunCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn SearchApi>,
        pool: Arc<CredentialPool>,
        subjects: Arc<dyn SubjectStore>,
        articles: Arc<dyn ArticleStore>,
        runs: Arc<dyn RunStore>,
        cache: Arc<dyn FeedCache>,
        config: &Config,
    ) -> Self {
        Self {
            fetcher: FetchOrchestrator::new(api, Arc::clone(&pool), config.language.clone()),
            scorer: ContentScorer::default(),
            pool,
            subjects,
            articles,
            runs,
            cache,
            score_threshold: config.score_threshold,
            run_interval: Duration::hours(config.run_interval_hours),
            run_lock: Mutex::new(()),
        }
    }

    /// Execute one full ingestion run. Errs only on overlap; every
    /// other failure, storage included, is folded into the returned
    /// [`RunResult`] and the persisted run record.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunResult, SpotlightError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| SpotlightError::RunInProgress)?;

        let started = Instant::now();

        if !self.pool.has_credentials() {
            return Ok(self.record_aborted("No API keys configured").await);
        }

        let roster = match self.subjects.list_subjects().await {
            Ok(roster) => roster,
            Err(err) => {
                error!(error = %err, "Subject roster unavailable");
                return Ok(self.record_aborted(&format!("subjects: {err}")).await);
            }
        };
        let active: Vec<_> = roster.into_iter().filter(|s| s.active).collect();
        if active.is_empty() {
            return Ok(self.record_aborted("No active subjects configured").await);
        }

        let names: Vec<String> = active.iter().map(|s| s.name.clone()).collect();
        let mut record = RunRecord::start(names, Utc::now() + self.run_interval);
        if let Err(err) = self.runs.record_run(&record).await {
            warn!(error = %err, "Run record write failed, continuing unrecorded");
        }
        info!(run_id = %record.id, subjects = active.len(), "Ingestion run starting");

        self.fetcher.run_health_check(false).await;
        if self.pool.select_best(Utc::now()).is_none() {
            record.status = RunStatus::Failed;
            record.errors = vec![SpotlightError::NoHealthyCredentials.to_string()];
            record.finished_at = Some(Utc::now());
            if let Err(err) = self.runs.record_run(&record).await {
                warn!(error = %err, "Run record write failed");
            }
            warn!("Every configured key is invalid or cooling down, run aborted");
            return Ok(RunResult::failed(SpotlightError::NoHealthyCredentials.to_string()));
        }

        let outcome = self.fetcher.fetch_all(&active, cancel).await;
        let fetched = outcome.articles.len();
        record.errors = outcome.errors;

        let kept: Vec<ScoredArticle> = outcome
            .articles
            .into_iter()
            .map(|a| self.scorer.score(a))
            .filter(|s| should_keep(s, self.score_threshold))
            .collect();
        let kept_count = kept.len();

        let deduped = mixer::dedupe_by_url(kept);
        let in_batch_duplicates = (kept_count - deduped.len()) as u32;

        let urls: Vec<String> = deduped.iter().map(|s| s.article.url.clone()).collect();
        let known = match self.articles.known_urls(&urls).await {
            Ok(known) => known,
            Err(err) => {
                warn!(error = %err, "URL lookup failed, treating batch as all-new");
                record.errors.push(format!("storage: {err}"));
                HashSet::new()
            }
        };
        let mut fresh: Vec<ScoredArticle> = deduped
            .into_iter()
            .filter(|s| !known.contains(&s.article.url))
            .collect();
        let duplicates = in_batch_duplicates + known.len() as u32;

        // The mixer expects newest-first input; fetch results arrive
        // grouped by subject. Undated articles sort last.
        fresh.sort_by(|a, b| b.article.published_at.cmp(&a.article.published_at));

        let mixed = mixer::mix(fresh, Utc::now());

        let mut added = 0;
        for batch in mixed.articles.chunks(INSERT_BATCH_SIZE) {
            match self.articles.insert_articles(batch).await {
                Ok(count) => added += count,
                Err(err) => {
                    // Skip the failed chunk; later chunks still get
                    // their shot.
                    error!(error = %err, "Article batch insert failed");
                    record.errors.push(format!("storage: {err}"));
                }
            }
        }

        if added > 0 {
            match serde_json::to_value(&mixed.articles) {
                Ok(payload) => {
                    if let Err(err) = self.cache.publish(CACHE_NAMESPACE, payload).await {
                        warn!(error = %err, "Feed cache publish failed");
                        record.errors.push(format!("cache: {err}"));
                    }
                }
                Err(err) => record.errors.push(format!("serialize: {err}")),
            }
        }

        record.processed = fetched as u32;
        record.added = added;
        record.duplicates = duplicates;
        record.duration_ms = started.elapsed().as_millis() as u64;
        record.finished_at = Some(Utc::now());
        record.status = if record.errors.is_empty() && !outcome.cancelled {
            RunStatus::Success
        } else if added > 0 || fetched > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        };
        if let Err(err) = self.runs.record_run(&record).await {
            warn!(error = %err, "Final run record write failed");
        }

        let stats = IngestStats {
            subjects: active.len(),
            fetched,
            kept: kept_count,
            duplicates,
            added,
            api_calls: outcome.api_calls,
            forced_placements: mixed.forced_placements,
            errors: record.errors.len(),
            duration_ms: record.duration_ms,
        };
        info!(run_id = %record.id, status = %record.status, %stats, "Ingestion run finished");

        Ok(RunResult {
            success: matches!(record.status, RunStatus::Success | RunStatus::Partial),
            processed: record.processed,
            added: record.added,
            duplicates: record.duplicates,
            errors: record.errors.clone(),
            duration_ms: record.duration_ms,
        })
    }

    /// Run only when the previous run's schedule says so.
    pub async fn run_if_due(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<RunResult>, SpotlightError> {
        if !self.is_run_due(Utc::now()).await {
            return Ok(None);
        }
        self.run(cancel).await.map(Some)
    }

    /// A run is due when none has ever happened or the latest run's
    /// `next_due` has passed. Failed runs still push the schedule so a
    /// broken configuration does not retry hot. An unreadable run
    /// history counts as due; the run itself will surface the outage.
    pub async fn is_run_due(&self, now: DateTime<Utc>) -> bool {
        match self.runs.latest_run().await {
            Ok(None) => true,
            Ok(Some(run)) => run.next_due <= now,
            Err(err) => {
                warn!(error = %err, "Run history unavailable, assuming a run is due");
                true
            }
        }
    }

    /// Persist a run that failed before any fetching happened. Record
    /// write failures are logged, never surfaced; the caller always
    /// gets a structured result.
    async fn record_aborted(&self, reason: &str) -> RunResult {
        warn!(reason, "Ingestion run aborted");
        let mut record = RunRecord::start(Vec::new(), Utc::now() + self.run_interval);
        record.status = RunStatus::Failed;
        record.errors = vec![reason.to_string()];
        record.finished_at = Some(Utc::now());
        if let Err(err) = self.runs.record_run(&record).await {
            warn!(error = %err, "Aborted-run record write failed");
        }
        RunResult::failed(reason)
    }
}
