//! Credential health tracking for the search API key pool.
//!
//! Every fetch obtains a key from [`CredentialPool::select_best`] right
//! before the call and reports the outcome right after. Health scores
//! decay on failures and rate limits, recover on successes and elapsed
//! cooldowns. State is in-memory only and rebuilt on restart.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Consecutive failures before a key is considered invalid until a
/// health re-check succeeds.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Cooldown window after a rate-limited response.
const COOLDOWN_SECS: i64 = 3600;

/// Minimum spacing between throttled health checks.
const HEALTH_CHECK_INTERVAL_SECS: i64 = 300;

const SUCCESS_REWARD: i32 = 2;
const FAILURE_PENALTY: i32 = 10;
const RATE_LIMIT_PENALTY: i32 = 20;

/// Health restored when a cooldown expires.
const RECOVERED_HEALTH: u8 = 50;

/// Minimum health after a validation call succeeds.
const VALIDATED_HEALTH: u8 = 60;

/// Result of one API call, as seen by the caller.
#[derive(Debug, Clone, Copy)]
pub struct CallOutcome {
    pub success: bool,
    pub rate_limited: bool,
}

impl CallOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            rate_limited: false,
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            rate_limited: false,
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            success: false,
            rate_limited: true,
        }
    }
}

/// A key handed out for one call. `index` is the registration position
/// and doubles as the report handle.
#[derive(Debug, Clone)]
pub struct SelectedCredential {
    pub index: usize,
    pub key: String,
}

/// Read-only view of one credential's counters for telemetry.
#[derive(Debug, Clone)]
pub struct CredentialHealth {
    /// Last four characters of the key, for log correlation.
    pub key_suffix: String,
    pub valid: bool,
    pub rate_limited: bool,
    pub health: u8,
    pub consecutive_failures: u32,
    pub requests: u64,
    pub successes: u64,
    pub rate_limit_hits: u64,
    pub cooldown_until: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct CredentialState {
    key: String,
    valid: bool,
    rate_limited: bool,
    health: u8,
    consecutive_failures: u32,
    requests: u64,
    successes: u64,
    rate_limit_hits: u64,
    cooldown_until: Option<DateTime<Utc>>,
}

impl CredentialState {
    fn new(key: String) -> Self {
        Self {
            key,
            valid: true,
            rate_limited: false,
            health: 100,
            consecutive_failures: 0,
            requests: 0,
            successes: 0,
            rate_limit_hits: 0,
            cooldown_until: None,
        }
    }

    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        matches!(self.cooldown_until, Some(until) if until > now)
    }

    /// Clear an elapsed cooldown, restoring partial health.
    fn maybe_recover(&mut self, now: DateTime<Utc>) {
        if let Some(until) = self.cooldown_until {
            if until <= now {
                self.cooldown_until = None;
                self.rate_limited = false;
                self.health = self.health.max(RECOVERED_HEALTH);
            }
        }
    }
}

struct PoolInner {
    creds: Vec<CredentialState>,
    last_health_check: Option<DateTime<Utc>>,
}

/// Thread-safe pool of search API credentials. Shared across the
/// concurrent fetch tasks of a batch; all mutation happens under one
/// lock with no awaits inside the critical section.
pub struct CredentialPool {
    inner: Mutex<PoolInner>,
}

impl CredentialPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                creds: keys.into_iter().map(CredentialState::new).collect(),
                last_health_check: None,
            }),
        }
    }

    /// True when at least one key is configured, healthy or not.
    pub fn has_credentials(&self) -> bool {
        !self.lock().creds.is_empty()
    }

    /// Pick the healthiest eligible credential, or `None` when every
    /// key is invalid or cooling down. Callers treat `None` as
    /// "ingestion cannot proceed this cycle", not a fatal error.
    ///
    /// Preference order: not rate-limited over rate-limited, then
    /// higher health, then registration order (the primary key wins
    /// ties).
    pub fn select_best(&self, now: DateTime<Utc>) -> Option<SelectedCredential> {
        let mut inner = self.lock();

        for cred in inner.creds.iter_mut() {
            cred.maybe_recover(now);
        }

        inner
            .creds
            .iter()
            .enumerate()
            .filter(|(_, c)| c.valid && !c.in_cooldown(now))
            .min_by_key(|(index, c)| (c.rate_limited, std::cmp::Reverse(c.health), *index))
            .map(|(index, c)| SelectedCredential {
                index,
                key: c.key.clone(),
            })
    }

    /// Record the outcome of a call made with the credential at
    /// `index`. Success: +2 health (capped at 100), failure streak
    /// reset. Failure: −10 health (floored at 0). Rate limit: a further
    /// −20 and a one-hour cooldown.
    pub fn report(&self, index: usize, outcome: CallOutcome, now: DateTime<Utc>) {
        let mut inner = self.lock();
        let Some(cred) = inner.creds.get_mut(index) else {
            warn!(index, "Outcome reported for unknown credential");
            return;
        };

        cred.requests += 1;

        if outcome.success {
            cred.successes += 1;
            cred.consecutive_failures = 0;
            cred.health = apply_delta(cred.health, SUCCESS_REWARD);
            return;
        }

        cred.consecutive_failures += 1;
        cred.health = apply_delta(cred.health, -FAILURE_PENALTY);

        if outcome.rate_limited {
            cred.rate_limit_hits += 1;
            cred.rate_limited = true;
            cred.health = apply_delta(cred.health, -RATE_LIMIT_PENALTY);
            cred.cooldown_until = Some(now + Duration::seconds(COOLDOWN_SECS));
            warn!(
                key = %suffix(&cred.key),
                health = cred.health,
                "Credential rate limited, cooling down for an hour"
            );
        }

        if cred.consecutive_failures >= MAX_CONSECUTIVE_FAILURES && cred.valid {
            cred.valid = false;
            warn!(
                key = %suffix(&cred.key),
                failures = cred.consecutive_failures,
                "Credential marked invalid after repeated failures"
            );
        }
    }

    /// Start a health check. Returns the keys to validate, or `None`
    /// when a check ran within the last five minutes and `force` is
    /// not set. The caller validates each key against the API and
    /// feeds the verdicts to [`apply_health_check`].
    ///
    /// [`apply_health_check`]: CredentialPool::apply_health_check
    pub fn begin_health_check(
        &self,
        now: DateTime<Utc>,
        force: bool,
    ) -> Option<Vec<(usize, String)>> {
        let mut inner = self.lock();
        if !force {
            if let Some(last) = inner.last_health_check {
                if now - last < Duration::seconds(HEALTH_CHECK_INTERVAL_SECS) {
                    return None;
                }
            }
        }
        inner.last_health_check = Some(now);
        Some(
            inner
                .creds
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.key.clone()))
                .collect(),
        )
    }

    /// Apply validation verdicts: a passing key is restored to valid
    /// with at least partial health and its failure streak cleared; a
    /// failing key loses health. Elapsed cooldowns are cleared either
    /// way.
    pub fn apply_health_check(&self, verdicts: &[(usize, bool)], now: DateTime<Utc>) {
        let mut inner = self.lock();
        for &(index, ok) in verdicts {
            let Some(cred) = inner.creds.get_mut(index) else {
                continue;
            };
            cred.maybe_recover(now);
            if ok {
                cred.valid = true;
                cred.consecutive_failures = 0;
                cred.health = cred.health.max(VALIDATED_HEALTH);
            } else {
                cred.health = apply_delta(cred.health, -FAILURE_PENALTY);
            }
        }
        let healthy = inner.creds.iter().filter(|c| c.valid).count();
        info!(
            total = inner.creds.len(),
            healthy, "Credential health check applied"
        );
    }

    /// Per-credential counters for telemetry, keys redacted.
    pub fn snapshot(&self) -> Vec<CredentialHealth> {
        self.lock()
            .creds
            .iter()
            .map(|c| CredentialHealth {
                key_suffix: suffix(&c.key),
                valid: c.valid,
                rate_limited: c.rate_limited,
                health: c.health,
                consecutive_failures: c.consecutive_failures,
                requests: c.requests,
                successes: c.successes,
                rate_limit_hits: c.rate_limit_hits,
                cooldown_until: c.cooldown_until,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolInner> {
        // A poisoned lock means a panic mid-update; the counters are
        // advisory, so continue with whatever state is there.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn apply_delta(health: u8, delta: i32) -> u8 {
    (health as i32 + delta).clamp(0, 100) as u8
}

fn suffix(key: &str) -> String {
    let tail = key
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| &key[i..])
        .unwrap_or(key);
    format!("...{tail}")
}
