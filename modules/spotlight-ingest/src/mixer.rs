//! URL deduplication and time-bucketed diversity mixing.
//!
//! Mixing only reorders within fixed recency buckets, so the output
//! stays newest-first at the macro level while no subject dominates
//! more than [`MAX_CONSECUTIVE_PER_SUBJECT`] adjacent slots.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use spotlight_common::ScoredArticle;

/// Maximum adjacent articles about the same subject.
pub const MAX_CONSECUTIVE_PER_SUBJECT: usize = 2;

/// Bucket upper bounds in hours of age; anything older (or undated)
/// lands in the final bucket.
const BUCKET_BOUNDS_HOURS: [i64; 3] = [6, 12, 24];
const BUCKET_COUNT: usize = BUCKET_BOUNDS_HOURS.len() + 1;

/// Buckets at or below this size are returned unmodified.
const MIN_BUCKET_TO_MIX: usize = 2;

/// Remove URL duplicates; first occurrence wins, order otherwise
/// preserved.
pub fn dedupe_by_url(articles: Vec<ScoredArticle>) -> Vec<ScoredArticle> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.article.url.clone()))
        .collect()
}

#[derive(Debug)]
pub struct MixResult {
    pub articles: Vec<ScoredArticle>,
    /// Times the consecutive limit had to be overridden because a
    /// bucket's remainder was all one subject.
    pub forced_placements: u32,
}

/// Reorder a newest-first, deduplicated article list so no subject
/// holds more than the consecutive limit of adjacent slots. Articles
/// never move across bucket boundaries.
pub fn mix(articles: Vec<ScoredArticle>, now: DateTime<Utc>) -> MixResult {
    let mut buckets: [Vec<ScoredArticle>; BUCKET_COUNT] = Default::default();
    for article in articles {
        let idx = bucket_index(article.article.published_at, now);
        buckets[idx].push(article);
    }

    let mut out = Vec::new();
    let mut forced_placements = 0;
    for (idx, bucket) in buckets.into_iter().enumerate() {
        if bucket.len() <= MIN_BUCKET_TO_MIX {
            out.extend(bucket);
            continue;
        }
        let size = bucket.len();
        let forced_before = forced_placements;
        out.extend(mix_bucket(bucket, &mut forced_placements));
        if forced_placements > forced_before {
            debug!(
                bucket = idx,
                size,
                forced = forced_placements - forced_before,
                "Bucket mixed with forced placements"
            );
        }
    }

    MixResult {
        articles: out,
        forced_placements,
    }
}

/// Which bucket an article belongs to, by age relative to `now`.
/// Undated articles are treated as oldest.
pub(crate) fn bucket_index(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> usize {
    let Some(published) = published_at else {
        return BUCKET_COUNT - 1;
    };
    let age_hours = (now - published).num_hours();
    for (idx, bound) in BUCKET_BOUNDS_HOURS.iter().enumerate() {
        if age_hours < *bound {
            return idx;
        }
    }
    BUCKET_COUNT - 1
}

/// Greedy in-bucket mix: take the chronologically-next article unless
/// its subject has exhausted the consecutive limit, in which case the
/// first article from a different subject is pulled forward. If the
/// remainder is all one subject, the limit is overridden rather than
/// stalling.
fn mix_bucket(mut pending: Vec<ScoredArticle>, forced_placements: &mut u32) -> Vec<ScoredArticle> {
    let mut out = Vec::with_capacity(pending.len());
    let mut last_subject: Option<String> = None;
    let mut consecutive = 0usize;

    while !pending.is_empty() {
        let mut pick = 0;
        if consecutive >= MAX_CONSECUTIVE_PER_SUBJECT
            && last_subject.as_deref() == Some(pending[0].article.subject.as_str())
        {
            match pending
                .iter()
                .position(|a| Some(a.article.subject.as_str()) != last_subject.as_deref())
            {
                Some(idx) => pick = idx,
                None => {
                    // Everything left is the same subject. Place it
                    // anyway so the mix terminates.
                    *forced_placements += 1;
                    warn!(
                        subject = %pending[0].article.subject,
                        remaining = pending.len(),
                        "Consecutive limit overridden, no alternate subject left in bucket"
                    );
                }
            }
        }

        let placed = pending.remove(pick);
        if last_subject.as_deref() == Some(placed.article.subject.as_str()) {
            consecutive += 1;
        } else {
            last_subject = Some(placed.article.subject.clone());
            consecutive = 1;
        }
        out.push(placed);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scored;
    use chrono::Duration;

    fn urls(articles: &[ScoredArticle]) -> Vec<&str> {
        articles.iter().map(|a| a.article.url.as_str()).collect()
    }

    fn subjects(articles: &[ScoredArticle]) -> Vec<&str> {
        articles.iter().map(|a| a.article.subject.as_str()).collect()
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let now = Utc::now();
        // Same URL matched by two different subjects.
        let input = vec![
            scored("A", "https://x.test/shared", Some(now)),
            scored("B", "https://x.test/shared", Some(now)),
            scored("B", "https://x.test/other", Some(now)),
        ];
        let out = dedupe_by_url(input);
        assert_eq!(urls(&out), vec!["https://x.test/shared", "https://x.test/other"]);
        assert_eq!(out[0].article.subject, "A", "first occurrence wins");
    }

    #[test]
    fn dedupe_output_is_a_subsequence_of_input() {
        let now = Utc::now();
        let input: Vec<_> = (0..8)
            .map(|i| scored("A", &format!("https://x.test/{}", i % 4), Some(now)))
            .collect();
        let out = dedupe_by_url(input.clone());

        assert_eq!(out.len(), 4);
        let mut cursor = 0;
        for kept in &out {
            let found = input[cursor..]
                .iter()
                .position(|a| a.article.url == kept.article.url)
                .expect("kept article exists downstream of cursor");
            cursor += found + 1;
        }
    }

    #[test]
    fn consecutive_limit_pulls_other_subject_forward() {
        let now = Utc::now();
        // A1 A2 A3 B1, newest first, all inside the 6h bucket.
        let input = vec![
            scored("A", "a1", Some(now)),
            scored("A", "a2", Some(now - Duration::minutes(1))),
            scored("A", "a3", Some(now - Duration::minutes(2))),
            scored("B", "b1", Some(now - Duration::minutes(3))),
        ];
        let result = mix(input, now);
        assert_eq!(urls(&result.articles), vec!["a1", "a2", "b1", "a3"]);
        assert_eq!(result.forced_placements, 0);
    }

    #[test]
    fn single_subject_bucket_forces_placement_and_terminates() {
        let now = Utc::now();
        let input: Vec<_> = (0..5)
            .map(|i| scored("A", &format!("a{i}"), Some(now - Duration::minutes(i))))
            .collect();
        let result = mix(input, now);
        assert_eq!(result.articles.len(), 5, "mix must stay total");
        assert_eq!(subjects(&result.articles), vec!["A"; 5]);
        assert!(result.forced_placements > 0, "override must be flagged");
    }

    #[test]
    fn articles_never_cross_bucket_boundaries() {
        let now = Utc::now();
        let input = vec![
            scored("A", "fresh1", Some(now - Duration::hours(1))),
            scored("A", "fresh2", Some(now - Duration::hours(2))),
            scored("A", "fresh3", Some(now - Duration::hours(3))),
            scored("A", "mid1", Some(now - Duration::hours(7))),
            scored("B", "mid2", Some(now - Duration::hours(8))),
            scored("B", "day1", Some(now - Duration::hours(13))),
            scored("A", "old1", Some(now - Duration::hours(30))),
            scored("B", "undated", None),
        ];
        let before: Vec<Vec<String>> = partition_urls(&input, now);
        let result = mix(input, now);
        let after: Vec<Vec<String>> = partition_urls(&result.articles, now);

        for (b, a) in before.iter().zip(after.iter()) {
            let mut b = b.clone();
            let mut a = a.clone();
            b.sort();
            a.sort();
            assert_eq!(b, a, "bucket membership must be preserved");
        }
    }

    fn partition_urls(articles: &[ScoredArticle], now: DateTime<Utc>) -> Vec<Vec<String>> {
        let mut buckets = vec![Vec::new(); BUCKET_COUNT];
        for article in articles {
            buckets[bucket_index(article.article.published_at, now)]
                .push(article.article.url.clone());
        }
        buckets
    }

    #[test]
    fn tiny_buckets_are_left_alone() {
        let now = Utc::now();
        // Two same-subject articles: under the limit for mixing, so
        // they stay adjacent and in order.
        let input = vec![
            scored("A", "a1", Some(now)),
            scored("A", "a2", Some(now - Duration::minutes(1))),
        ];
        let result = mix(input, now);
        assert_eq!(urls(&result.articles), vec!["a1", "a2"]);
    }

    #[test]
    fn undated_articles_fall_in_oldest_bucket() {
        let now = Utc::now();
        assert_eq!(bucket_index(None, now), BUCKET_COUNT - 1);
        assert_eq!(bucket_index(Some(now - Duration::hours(1)), now), 0);
        assert_eq!(bucket_index(Some(now - Duration::hours(6)), now), 1);
        assert_eq!(bucket_index(Some(now - Duration::hours(12)), now), 2);
        assert_eq!(bucket_index(Some(now - Duration::hours(24)), now), 3);
        assert_eq!(bucket_index(Some(now - Duration::days(10)), now), 3);
    }

    #[test]
    fn interleaved_subjects_keep_chronological_order() {
        let now = Utc::now();
        let input = vec![
            scored("A", "a1", Some(now)),
            scored("B", "b1", Some(now - Duration::minutes(1))),
            scored("A", "a2", Some(now - Duration::minutes(2))),
            scored("B", "b2", Some(now - Duration::minutes(3))),
        ];
        let result = mix(input, now);
        assert_eq!(urls(&result.articles), vec!["a1", "b1", "a2", "b2"]);
        assert_eq!(result.forced_placements, 0);
    }
}
