use std::time::Duration;
use tokio::time::Instant;

/// Tracks the state of a domain during crawling
///
/// Used to serialize requests to a host that declares a robots.txt
/// `Crawl-delay`: each worker reserves the next free slot and sleeps until
/// it arrives, so concurrent workers are spaced out instead of all waiting
/// the same amount and firing together.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of requests made to this domain in the current crawl
    pub request_count: u32,

    /// Earliest instant the next request to this domain may start
    pub next_allowed: Option<Instant>,
}

impl DomainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next request slot and returns how long to wait for it
    ///
    /// # Arguments
    ///
    /// * `delay` - Minimum spacing between requests to this domain
    /// * `now` - The current time instant
    pub fn reserve_slot(&mut self, delay: Duration, now: Instant) -> Duration {
        self.request_count += 1;

        let start = match self.next_allowed {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next_allowed = Some(start + delay);
        start - now
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        match self.next_allowed {
            Some(next) if next > now => Some(next - now),
            _ => None,
        }
    }
}
