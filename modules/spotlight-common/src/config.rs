use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Search API keys, healthiest-first rotation pool. May be empty;
    /// the coordinator reports that as a configuration failure instead
    /// of panicking at startup.
    pub newsapi_keys: Vec<String>,

    /// ISO 639-1 language filter passed to the search API.
    pub language: String,

    /// Minimum overall score for an article to be ingested.
    pub score_threshold: u8,

    /// Hours until the next scheduled run is due.
    pub run_interval_hours: i64,

    /// Subject names seeded into the in-memory subject store by the
    /// binary. Deployments with a real subject store leave this unset.
    pub subjects: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            newsapi_keys: csv_env("NEWSAPI_KEYS"),
            language: env::var("NEWS_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            score_threshold: parsed_env("INGEST_SCORE_THRESHOLD", 55),
            run_interval_hours: parsed_env("RUN_INTERVAL_HOURS", 6),
            subjects: csv_env("SPOTLIGHT_SUBJECTS"),
        }
    }

    /// Log the loaded configuration without exposing key material.
    pub fn log_redacted(&self) {
        info!(
            api_keys = self.newsapi_keys.len(),
            language = %self.language,
            score_threshold = self.score_threshold,
            run_interval_hours = self.run_interval_hours,
            subjects = self.subjects.len(),
            "Configuration loaded"
        );
    }
}

/// Parse a comma-separated env var into trimmed, non-empty entries.
fn csv_env(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_env_splits_and_trims() {
        env::set_var("SPOTLIGHT_TEST_CSV", "a, b ,,c");
        assert_eq!(csv_env("SPOTLIGHT_TEST_CSV"), vec!["a", "b", "c"]);
        env::remove_var("SPOTLIGHT_TEST_CSV");
    }

    #[test]
    fn csv_env_empty_when_unset() {
        assert!(csv_env("SPOTLIGHT_TEST_UNSET").is_empty());
    }

    #[test]
    fn parsed_env_falls_back_to_default() {
        env::set_var("SPOTLIGHT_TEST_NUM", "not a number");
        assert_eq!(parsed_env("SPOTLIGHT_TEST_NUM", 55u8), 55);
        env::remove_var("SPOTLIGHT_TEST_NUM");
    }
}
