//! Live crawl statistics
//!
//! [`StatisticsCollector::record`] is the single merge point: every emitted
//! [`FetchResult`] passes through it exactly once, under one lock. Readers
//! get [`CrawlStatistics`] snapshots.

use crate::crawler::{FetchErrorKind, FetchResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Results that reached the network
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Results that never reached the network (robots denied, invalid URL)
    pub skipped_requests: u64,
    /// Mean over requests that reached the network
    pub average_response_time_ms: f64,
    pub requests_by_domain: HashMap<String, u64>,
    pub status_code_distribution: HashMap<u16, u64>,
    pub errors_by_kind: HashMap<FetchErrorKind, u64>,
    /// Links found on fetched pages, before admission filtering
    pub total_links: u64,
    pub requests_per_second: f64,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl CrawlStatistics {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            skipped_requests: 0,
            average_response_time_ms: 0.0,
            requests_by_domain: HashMap::new(),
            status_code_distribution: HashMap::new(),
            errors_by_kind: HashMap::new(),
            total_links: 0,
            requests_per_second: 0.0,
            start_time: now,
            last_updated: now,
        }
    }

    /// Emitted results, skipped ones included
    pub fn total_results(&self) -> u64 {
        self.total_requests + self.skipped_requests
    }

    /// Percentage of network requests that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        }
    }

    pub fn unique_domains(&self) -> usize {
        self.requests_by_domain.len()
    }
}

impl Default for CrawlStatistics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Inner {
    stats: CrawlStatistics,
    total_response_ms: u128,
    started: Instant,
}

impl Inner {
    fn new() -> Self {
        Self {
            stats: CrawlStatistics::new(),
            total_response_ms: 0,
            started: Instant::now(),
        }
    }
}

/// Thread-safe accumulator of [`CrawlStatistics`]
#[derive(Debug)]
pub struct StatisticsCollector {
    inner: Mutex<Inner>,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Merges one emitted result
    pub fn record(&self, result: &FetchResult) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let domain = result.domain();
        let stats = &mut inner.stats;

        if let Some(kind) = result.error_kind {
            *stats.errors_by_kind.entry(kind).or_insert(0) += 1;
        }

        if result.is_skipped() {
            stats.skipped_requests += 1;
        } else {
            stats.total_requests += 1;
            if result.is_success {
                stats.successful_requests += 1;
            } else {
                stats.failed_requests += 1;
            }
            if let Some(status) = result.status_code {
                *stats.status_code_distribution.entry(status).or_insert(0) += 1;
            }
            if let Some(domain) = domain {
                *stats.requests_by_domain.entry(domain).or_insert(0) += 1;
            }
            stats.total_links += result.discovered_links.len() as u64;

            inner.total_response_ms += u128::from(result.response_time_ms);
            inner.stats.average_response_time_ms =
                inner.total_response_ms as f64 / inner.stats.total_requests as f64;
        }

        inner.stats.last_updated = Utc::now();
    }

    /// Point-in-time copy with the request rate filled in
    pub fn snapshot(&self) -> CrawlStatistics {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut stats = inner.stats.clone();
        let elapsed = inner.started.elapsed().as_secs_f64();
        stats.requests_per_second = if elapsed > 0.0 {
            stats.total_requests as f64 / elapsed
        } else {
            0.0
        };
        stats
    }

    /// Starts over with empty statistics
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner = Inner::new();
    }
}

impl Default for StatisticsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total requests: {}", stats.total_requests);
    println!("  Successful: {}", stats.successful_requests);
    println!("  Failed: {}", stats.failed_requests);
    println!("  Skipped: {}", stats.skipped_requests);
    println!("  Unique domains: {}", stats.unique_domains());
    println!("  Links found: {}", stats.total_links);
    println!(
        "  Average response time: {:.1}ms",
        stats.average_response_time_ms
    );
    println!("  Requests/sec: {:.2}", stats.requests_per_second);
    println!();

    if !stats.status_code_distribution.is_empty() {
        println!("Status Codes:");
        let mut codes: Vec<_> = stats.status_code_distribution.iter().collect();
        codes.sort_by_key(|(code, _)| **code);
        for (code, count) in codes {
            println!("  {}: {}", code, count);
        }
        println!();
    }

    if !stats.errors_by_kind.is_empty() {
        println!("Error Summary:");
        let mut errors: Vec<_> = stats.errors_by_kind.iter().collect();
        errors.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        for (kind, count) in errors {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if !stats.requests_by_domain.is_empty() {
        println!("Requests by Domain:");
        let mut domains: Vec<_> = stats.requests_by_domain.iter().collect();
        domains.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (domain, count) in domains.into_iter().take(20) {
            println!("  {}: {}", domain, count);
        }
        println!();
    }

    println!("Success Rate: {:.1}%", stats.success_rate());
}
