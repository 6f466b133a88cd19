//! Per-run counters, formatted for the end-of-run log line.

use std::fmt;

/// Everything one ingestion run did, for telemetry and the run record.
#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub subjects: usize,
    /// Candidates returned by the search API.
    pub fetched: usize,
    /// Candidates at or above the score threshold.
    pub kept: usize,
    /// In-batch URL duplicates plus already-stored URLs.
    pub duplicates: u32,
    pub added: u32,
    pub api_calls: u32,
    pub forced_placements: u32,
    pub errors: usize,
    pub duration_ms: u64,
}

impl IngestStats {
    /// Share of fetched candidates that survived scoring.
    pub fn keep_rate(&self) -> f64 {
        if self.fetched == 0 {
            return 0.0;
        }
        self.kept as f64 / self.fetched as f64
    }
}

impl fmt::Display for IngestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subjects={} fetched={} kept={} ({:.0}%) duplicates={} added={} api_calls={} forced={} errors={} duration={}ms",
            self.subjects,
            self.fetched,
            self.kept,
            self.keep_rate() * 100.0,
            self.duplicates,
            self.added,
            self.api_calls,
            self.forced_placements,
            self.errors,
            self.duration_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_rate_handles_empty_run() {
        let stats = IngestStats::default();
        assert_eq!(stats.keep_rate(), 0.0);
    }

    #[test]
    fn display_is_one_line() {
        let stats = IngestStats {
            subjects: 3,
            fetched: 40,
            kept: 10,
            duplicates: 2,
            added: 8,
            api_calls: 3,
            forced_placements: 0,
            errors: 1,
            duration_ms: 1234,
        };
        let line = stats.to_string();
        assert!(line.contains("kept=10 (25%)"));
        assert!(!line.contains('\n'));
    }
}
