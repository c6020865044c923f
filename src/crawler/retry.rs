//! Retry budget and backoff for page fetches
//!
//! | Failure | Retried | Wait before next attempt |
//! |---------|---------|--------------------------|
//! | Timeout / connect / reset | yes | `2^k` seconds (k = failed attempt, 0-indexed) |
//! | HTTP 5xx | yes | `2^k` seconds |
//! | HTTP 429 | yes | `Retry-After`, else 60 s |
//! | Other 4xx | no | - |
//! | Invalid URL / robots denied | no | - |

use crate::crawler::fetcher::FetchErrorKind;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Wait used for 429 responses without a usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Upper bound on any single wait
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

const BASE_DELAY: Duration = Duration::from_secs(1);

/// How many times to retry and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub retry_budget: u32,
    pub base_delay: Duration,
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_RETRY_BUDGET)
    }
}

impl RetryPolicy {
    pub fn new(retry_budget: u32) -> Self {
        Self {
            retry_budget,
            base_delay: BASE_DELAY,
            default_retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    /// Total attempts, first one included
    pub fn max_attempts(&self) -> u32 {
        self.retry_budget.saturating_add(1)
    }

    /// Whether a failure on `attempt` (0-indexed) earns another try
    pub fn should_retry(&self, kind: FetchErrorKind, attempt: u32) -> bool {
        kind.is_retryable() && attempt < self.retry_budget
    }

    /// Exponential backoff: `base * 2^attempt`, capped
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(MAX_RETRY_AFTER)
            .min(MAX_RETRY_AFTER)
    }

    /// Wait before retrying after a failure on `attempt`
    ///
    /// Rate-limited responses honor the server's `Retry-After` value.
    pub fn retry_delay(
        &self,
        kind: FetchErrorKind,
        attempt: u32,
        retry_after: Option<&str>,
    ) -> Duration {
        match kind {
            FetchErrorKind::RateLimited => retry_after
                .and_then(|value| parse_retry_after(value, SystemTime::now()))
                .unwrap_or_else(|| {
                    debug!(
                        "No usable Retry-After, waiting {:?}",
                        self.default_retry_after
                    );
                    self.default_retry_after
                }),
            _ => self.backoff_delay(attempt),
        }
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts delta-seconds or an HTTP-date. Returns `None` for garbled values
/// and dates already in the past. Values above [`MAX_RETRY_AFTER`] are capped.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        return Some(cap(Duration::from_secs(seconds.unsigned_abs())));
    }

    let date = httpdate::parse_http_date(value).ok()?;
    match date.duration_since(now) {
        Ok(delay) => Some(cap(delay)),
        Err(_) => {
            debug!("Retry-After date {} is in the past", value);
            None
        }
    }
}

fn cap(delay: Duration) -> Duration {
    if delay > MAX_RETRY_AFTER {
        warn!(
            delay_secs = delay.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping"
        );
        MAX_RETRY_AFTER
    } else {
        delay
    }
}
