//! Keyword and domain rule lists for the content quality scorer.
//!
//! The scorer is entirely data-driven: swap the lexicon to retarget a
//! different language or market without touching scoring code. The
//! built-in lists cover the English/US celebrity beat.

use serde::{Deserialize, Serialize};

use spotlight_common::ContentType;

/// Editorial quality tier of a source domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainTier {
    /// Entertainment outlets with strong photo coverage.
    Premium,
    /// Fashion and lifestyle outlets.
    Good,
    Neutral,
    /// Hard-news wires; celebrity hits there are rarely visual.
    Avoid,
}

/// One content-type rule: first rule whose keywords match tags the
/// article and contributes its weight to visual appeal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTypeRule {
    pub tag: ContentType,
    pub weight: i32,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRule {
    pub tier: DomainTier,
    pub domains: Vec<String>,
}

/// The full rule set for one language/locale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    /// Strong visual/lifestyle signal.
    pub high_value: Vec<String>,
    /// General personal-life terms.
    pub medium_value: Vec<String>,
    /// Interview/political/legal/financial/health/drama terms. Penalized.
    pub low_value: Vec<String>,
    /// Verbs that put the subject visually front and center.
    pub action_verbs: Vec<String>,
    /// Terms proving the article is anchored on imagery.
    pub photo_indicators: Vec<String>,
    /// Ordered by priority; first match wins.
    pub content_types: Vec<ContentTypeRule>,
    pub domains: Vec<DomainRule>,
}

impl Lexicon {
    /// Built-in English/US celebrity lexicon.
    pub fn english() -> Self {
        Self {
            high_value: strings(&[
                "bikini", "swimsuit", "beach", "poolside", "red carpet", "premiere", "gala",
                "gown", "fashion week", "runway", "photoshoot", "workout", "fitness", "gym",
                "yacht", "vacation", "getaway", "wedding dress", "date night", "music festival",
                "instagram post", "selfie",
            ]),
            medium_value: strings(&[
                "style", "outfit", "dress", "romance", "dating", "boyfriend", "girlfriend",
                "family outing", "baby bump", "night out", "shopping", "birthday party",
                "new home", "engagement",
            ]),
            low_value: strings(&[
                "interview", "statement", "lawsuit", "court", "trial", "arrest", "charges",
                "politics", "election", "senate", "divorce settlement", "custody", "hospital",
                "diagnosis", "rehab", "feud", "slams", "claps back", "controversy", "scandal",
                "investment", "net worth", "stock",
            ]),
            action_verbs: strings(&[
                "stuns", "dazzles", "flaunts", "shows off", "debuts", "rocks", "turns heads",
                "steps out", "arrives", "slays",
            ]),
            photo_indicators: strings(&[
                "photo", "photos", "pics", "pictured", "photographed", "snapped", "spotted",
                "seen", "poses", "posing", "shoot", "paparazzi", "in pictures", "gallery",
            ]),
            content_types: vec![
                rule(ContentType::Swimwear, 18, &["bikini", "swimsuit", "beach", "poolside"]),
                rule(
                    ContentType::RedCarpet,
                    15,
                    &["red carpet", "premiere", "gala", "awards"],
                ),
                rule(ContentType::Fitness, 12, &["workout", "gym", "fitness", "yoga"]),
                rule(
                    ContentType::Fashion,
                    10,
                    &["fashion", "style", "outfit", "gown", "dress"],
                ),
                rule(
                    ContentType::Vacation,
                    10,
                    &["vacation", "yacht", "getaway", "holiday"],
                ),
                rule(
                    ContentType::Candid,
                    8,
                    &["spotted", "steps out", "street style", "shopping"],
                ),
                rule(
                    ContentType::Event,
                    6,
                    &["festival", "party", "concert", "show"],
                ),
            ],
            domains: vec![
                DomainRule {
                    tier: DomainTier::Premium,
                    domains: strings(&[
                        "people.com",
                        "dailymail.co.uk",
                        "eonline.com",
                        "pagesix.com",
                        "tmz.com",
                        "justjared.com",
                        "hollywoodlife.com",
                        "usmagazine.com",
                        "etonline.com",
                    ]),
                },
                DomainRule {
                    tier: DomainTier::Good,
                    domains: strings(&[
                        "popsugar.com",
                        "elle.com",
                        "vogue.com",
                        "harpersbazaar.com",
                        "instyle.com",
                        "cosmopolitan.com",
                        "glamour.com",
                    ]),
                },
                DomainRule {
                    tier: DomainTier::Avoid,
                    domains: strings(&[
                        "reuters.com",
                        "apnews.com",
                        "bloomberg.com",
                        "wsj.com",
                        "cnbc.com",
                        "politico.com",
                        "bbc.com",
                        "bbc.co.uk",
                    ]),
                },
            ],
        }
    }

    /// Tier for a source domain; unknown domains are neutral.
    pub fn domain_tier(&self, domain: &str) -> DomainTier {
        let domain = domain.to_lowercase();
        for rule in &self.domains {
            if rule.domains.iter().any(|d| d == &domain) {
                return rule.tier;
            }
        }
        DomainTier::Neutral
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::english()
    }
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn rule(tag: ContentType, weight: i32, keywords: &[&str]) -> ContentTypeRule {
    ContentTypeRule {
        tag,
        weight,
        keywords: strings(keywords),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_tier_lookup_is_case_insensitive() {
        let lex = Lexicon::english();
        assert_eq!(lex.domain_tier("People.com"), DomainTier::Premium);
        assert_eq!(lex.domain_tier("vogue.com"), DomainTier::Good);
        assert_eq!(lex.domain_tier("reuters.com"), DomainTier::Avoid);
        assert_eq!(lex.domain_tier("example.org"), DomainTier::Neutral);
    }

    #[test]
    fn content_type_rules_keep_priority_order() {
        let lex = Lexicon::english();
        assert_eq!(lex.content_types[0].tag, ContentType::Swimwear);
        assert!(lex.content_types[0].weight >= lex.content_types.last().unwrap().weight);
    }

    #[test]
    fn lexicon_round_trips_through_json() {
        // Locale lists are meant to be swappable as data.
        let lex = Lexicon::english();
        let json = serde_json::to_string(&lex).unwrap();
        let back: Lexicon = serde_json::from_str(&json).unwrap();
        assert_eq!(back.high_value, lex.high_value);
        assert_eq!(back.domains.len(), lex.domains.len());
    }
}
