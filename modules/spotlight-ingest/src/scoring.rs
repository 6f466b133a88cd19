//! Content quality scoring for candidate articles.
//!
//! Scoring is a pure function of (title, description, source domain)
//! against the configured [`Lexicon`]: additive keyword and domain
//! contributions, clamped to [0, 100] per dimension, then combined
//! into a weighted overall score. Every contribution is recorded as a
//! human-readable reason so rejected articles can be explained after
//! the fact.

use spotlight_common::{ArticleScore, CandidateArticle, ScoredArticle};

use crate::lexicon::{DomainTier, Lexicon};

/// Dimension baselines. An article with no signal either way lands at
/// visual 40 / relevance 50 and is rejected by the default threshold.
const VISUAL_BASE: i32 = 40;
const RELEVANCE_BASE: i32 = 50;

const HIGH_VALUE_WEIGHT: i32 = 15;
const HIGH_VALUE_CAP: i32 = 45;
const MEDIUM_VALUE_WEIGHT: i32 = 6;
const MEDIUM_VALUE_CAP: i32 = 18;
const LOW_VALUE_PENALTY: i32 = 12;

/// Bonus when any action verb or photo indicator matches.
const FOREGROUND_VISUAL_BONUS: i32 = 12;
const FOREGROUND_RELEVANCE_BONUS: i32 = 15;
/// Penalty when nothing proves the article is anchored on imagery.
const NO_PHOTO_PENALTY: i32 = 15;

/// (visual, relevance) adjustments per domain tier.
const PREMIUM_DOMAIN_BONUS: (i32, i32) = (15, 15);
const GOOD_DOMAIN_BONUS: (i32, i32) = (8, 8);
const AVOID_DOMAIN_PENALTY: (i32, i32) = (-20, -15);

/// Weighted overall: visual appeal dominates.
const VISUAL_WEIGHT: f64 = 0.7;
const RELEVANCE_WEIGHT: f64 = 0.3;

pub struct ContentScorer {
    lexicon: Lexicon,
}

impl ContentScorer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn score(&self, article: CandidateArticle) -> ScoredArticle {
        let score = self.score_text(&article.title, &article.description, &article.source_domain);
        ScoredArticle { article, score }
    }

    /// Score one candidate from its text and source domain. Pure:
    /// identical inputs always produce identical output.
    pub fn score_text(&self, title: &str, description: &str, source_domain: &str) -> ArticleScore {
        let haystack = format!("{} {}", title, description).to_lowercase();
        let mut visual = VISUAL_BASE;
        let mut relevance = RELEVANCE_BASE;
        let mut reasons = Vec::new();

        // 1. Keyword tiers.
        let high = matches_in(&haystack, &self.lexicon.high_value);
        if !high.is_empty() {
            let contribution = (high.len() as i32 * HIGH_VALUE_WEIGHT).min(HIGH_VALUE_CAP);
            visual += contribution;
            reasons.push(format!(
                "high-value keywords {} (+{} visual)",
                quoted(&high),
                contribution
            ));
        }

        let medium = matches_in(&haystack, &self.lexicon.medium_value);
        if !medium.is_empty() {
            let contribution = (medium.len() as i32 * MEDIUM_VALUE_WEIGHT).min(MEDIUM_VALUE_CAP);
            visual += contribution;
            reasons.push(format!(
                "medium-value keywords {} (+{} visual)",
                quoted(&medium),
                contribution
            ));
        }

        let low = matches_in(&haystack, &self.lexicon.low_value);
        if !low.is_empty() {
            let penalty = low.len() as i32 * LOW_VALUE_PENALTY;
            visual -= penalty;
            reasons.push(format!(
                "low-value keywords {} (-{} visual)",
                quoted(&low),
                penalty
            ));
        }

        // 2. Subject foregrounding. The article is assumed not to be
        // visually anchored unless a photo indicator proves otherwise.
        let action = matches_in(&haystack, &self.lexicon.action_verbs);
        let photo = matches_in(&haystack, &self.lexicon.photo_indicators);
        if !action.is_empty() || !photo.is_empty() {
            visual += FOREGROUND_VISUAL_BONUS;
            relevance += FOREGROUND_RELEVANCE_BONUS;
            reasons.push(format!(
                "subject foregrounded by {} (+{} visual, +{} relevance)",
                quoted(&merged(&action, &photo)),
                FOREGROUND_VISUAL_BONUS,
                FOREGROUND_RELEVANCE_BONUS
            ));
        }
        if photo.is_empty() {
            visual -= NO_PHOTO_PENALTY;
            reasons.push(format!("no photo indicator (-{} visual)", NO_PHOTO_PENALTY));
        }

        // 3. Source domain tier.
        let tier = self.lexicon.domain_tier(source_domain);
        let (dv, dr) = match tier {
            DomainTier::Premium => PREMIUM_DOMAIN_BONUS,
            DomainTier::Good => GOOD_DOMAIN_BONUS,
            DomainTier::Neutral => (0, 0),
            DomainTier::Avoid => AVOID_DOMAIN_PENALTY,
        };
        if dv != 0 || dr != 0 {
            visual += dv;
            relevance += dr;
            reasons.push(format!(
                "source {} is tier {:?} ({:+} visual, {:+} relevance)",
                source_domain, tier, dv, dr
            ));
        }

        // 4. Content type: first matching category wins.
        let mut content_type = None;
        for rule in &self.lexicon.content_types {
            if rule.keywords.iter().any(|k| haystack.contains(k.as_str())) {
                visual += rule.weight;
                reasons.push(format!("content type {} (+{} visual)", rule.tag, rule.weight));
                content_type = Some(rule.tag);
                break;
            }
        }

        // 5. Clamp, then weight.
        let visual_appeal = visual.clamp(0, 100) as u8;
        let relevance = relevance.clamp(0, 100) as u8;
        let overall = (VISUAL_WEIGHT * visual_appeal as f64 + RELEVANCE_WEIGHT * relevance as f64)
            .round() as u8;

        ArticleScore {
            visual_appeal,
            relevance,
            overall,
            content_type,
            reasons,
        }
    }
}

impl Default for ContentScorer {
    fn default() -> Self {
        Self::new(Lexicon::english())
    }
}

/// Threshold check. The threshold is caller-supplied so batch
/// ingestion and live search can apply different strictness.
pub fn should_keep(scored: &ScoredArticle, threshold: u8) -> bool {
    scored.score.overall >= threshold
}

/// Keywords from `list` found in `haystack` (already lowercased).
fn matches_in<'a>(haystack: &str, list: &'a [String]) -> Vec<&'a str> {
    list.iter()
        .filter(|k| haystack.contains(k.as_str()))
        .map(String::as_str)
        .collect()
}

fn quoted(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| format!("\"{w}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn merged<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<&'a str> {
    a.iter().chain(b.iter()).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotlight_common::ContentType;

    fn scorer() -> ContentScorer {
        ContentScorer::default()
    }

    #[test]
    fn scoring_is_deterministic() {
        let s = scorer();
        let a = s.score_text(
            "Star stuns in bikini on the beach",
            "New photos from Malibu.",
            "people.com",
        );
        let b = s.score_text(
            "Star stuns in bikini on the beach",
            "New photos from Malibu.",
            "people.com",
        );
        assert_eq!(a.overall, b.overall);
        assert_eq!(a, b);
    }

    #[test]
    fn high_value_photo_premium_scores_above_80() {
        let s = scorer();
        let score = s.score_text(
            "Star stuns in bikini during Malibu photoshoot",
            "Exclusive photos from the weekend.",
            "people.com",
        );
        assert!(
            score.overall > 80,
            "expected > 80, got {} ({:?})",
            score.overall,
            score.reasons
        );
        assert_eq!(score.content_type, Some(ContentType::Swimwear));
    }

    #[test]
    fn hard_news_story_is_rejected() {
        let s = scorer();
        let score = s.score_text(
            "Celebrity gives interview about ongoing lawsuit",
            "The trial continues next week.",
            "reuters.com",
        );
        assert!(score.overall < 30, "got {}", score.overall);
        assert_eq!(score.content_type, None);
    }

    #[test]
    fn missing_photo_indicator_is_penalized() {
        let s = scorer();
        let with_photo = s.score_text(
            "Actor at the premiere, pictured on the red carpet",
            "",
            "example.org",
        );
        let without_photo =
            s.score_text("Actor attends the premiere red carpet", "", "example.org");
        assert!(with_photo.visual_appeal > without_photo.visual_appeal);
        assert!(without_photo
            .reasons
            .iter()
            .any(|r| r.contains("no photo indicator")));
    }

    #[test]
    fn high_value_contribution_is_capped() {
        let s = scorer();
        // Five high-value keywords, but contribution caps at +45.
        let score = s.score_text(
            "Bikini beach photoshoot before the gala premiere",
            "",
            "example.org",
        );
        let capped = score
            .reasons
            .iter()
            .find(|r| r.starts_with("high-value"))
            .expect("high-value reason present");
        assert!(capped.contains("+45 visual"), "reason: {capped}");
    }

    #[test]
    fn avoid_domain_drags_score_down() {
        let s = scorer();
        let premium = s.score_text("Star spotted in new photos", "", "pagesix.com");
        let wire = s.score_text("Star spotted in new photos", "", "apnews.com");
        assert!(premium.overall > wire.overall);
    }

    #[test]
    fn first_matching_content_type_wins() {
        let s = scorer();
        // Matches both Swimwear ("beach") and Fashion ("style") —
        // Swimwear has higher priority.
        let score = s.score_text("Beach style icons, pictured", "", "example.org");
        assert_eq!(score.content_type, Some(ContentType::Swimwear));
    }

    #[test]
    fn every_contribution_leaves_a_reason() {
        let s = scorer();
        let score = s.score_text(
            "Star stuns in bikini, photos inside",
            "Workout routine and gym looks.",
            "people.com",
        );
        assert!(score.reasons.len() >= 4, "reasons: {:?}", score.reasons);
    }

    #[test]
    fn should_keep_is_a_threshold_comparison() {
        let s = scorer();
        let scored = s.score(crate::testing::candidate_with_text(
            "A",
            "https://x.test/1",
            "Star stuns in bikini during photoshoot",
            "people.com",
        ));
        let overall = scored.score.overall;
        assert!(should_keep(&scored, overall));
        assert!(!should_keep(&scored, overall + 1));
    }
}
