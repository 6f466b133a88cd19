use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Subjects ---

/// A tracked celebrity whose canonical name is used as a search term.
/// Created and edited by the admin surface; read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub active: bool,
    /// Higher priority subjects are fetched in earlier batches.
    pub priority: u32,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            priority: 0,
        }
    }
}

// --- Articles ---

/// A raw search API result. Exists only within one pipeline run until
/// it survives scoring, dedup, and mixing and gets persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateArticle {
    /// Unique key for deduplication.
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub source_domain: String,
    /// The subject whose query produced this hit.
    pub subject: String,
}

/// Extract the registrable host of a URL, without the `www.` prefix.
/// `https://www.people.com/article` -> `people.com`.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_lowercase())
}

// --- Scoring ---

/// Visual content category, ordered by scoring priority. The first
/// category an article matches becomes its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Swimwear,
    RedCarpet,
    Fitness,
    Fashion,
    Vacation,
    Candid,
    Event,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Swimwear => write!(f, "swimwear"),
            ContentType::RedCarpet => write!(f, "red_carpet"),
            ContentType::Fitness => write!(f, "fitness"),
            ContentType::Fashion => write!(f, "fashion"),
            ContentType::Vacation => write!(f, "vacation"),
            ContentType::Candid => write!(f, "candid"),
            ContentType::Event => write!(f, "event"),
        }
    }
}

/// Quality dimensions for one candidate article. Deterministic for
/// identical (title, description, source_domain) inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleScore {
    pub visual_appeal: u8,
    pub relevance: u8,
    /// `round(0.7 * visual_appeal + 0.3 * relevance)` after clamping.
    pub overall: u8,
    pub content_type: Option<ContentType>,
    /// Human-readable trail of every contribution that moved the score.
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredArticle {
    pub article: CandidateArticle,
    pub score: ArticleScore,
}

// --- Runs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Audit trail for one ingestion run. Created at run start, finalized
/// at run end, persisted by the run store collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub subjects: Vec<String>,
    pub status: RunStatus,
    pub processed: u32,
    pub added: u32,
    pub duplicates: u32,
    pub duration_ms: u64,
    pub errors: Vec<String>,
    pub next_due: DateTime<Utc>,
}

impl RunRecord {
    pub fn start(subjects: Vec<String>, next_due: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            subjects,
            status: RunStatus::Running,
            processed: 0,
            added: 0,
            duplicates: 0,
            duration_ms: 0,
            errors: Vec::new(),
            next_due,
        }
    }
}

/// Structured result handed back to whoever triggered the run. The
/// coordinator always returns one of these, even on total failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub processed: u32,
    pub added: u32,
    pub duplicates: u32,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl RunResult {
    /// A run that failed before doing any work.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            processed: 0,
            added: 0,
            duplicates: 0,
            errors: vec![reason.into()],
            duration_ms: 0,
        }
    }
}

// --- Telemetry ---

/// Most recent rate-limit headers observed from the search API.
/// Best-effort: only for operator visibility, never for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub remaining: u32,
    pub resets_at: Option<DateTime<Utc>>,
}
