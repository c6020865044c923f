//! Robots.txt handling module
//!
//! [`RobotsPolicy`] fetches `<origin>/robots.txt` at most once per origin per
//! TTL window and answers permission, crawl-delay and sitemap queries from
//! the cached document. Concurrent first queries for the same origin share
//! one fetch.

mod cache;
mod parser;

pub use cache::{CachedRobots, ROBOTS_TTL_HOURS};
pub use parser::{RobotsDocument, RobotsRuleSet};

use crate::crawler::HttpTransport;
use crate::url::origin_of;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

/// Timeout for robots.txt requests
pub const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-origin robots.txt cache and query surface
pub struct RobotsPolicy {
    transport: Arc<dyn HttpTransport>,
    cache: DashMap<String, Arc<OnceCell<CachedRobots>>>,
    ttl: chrono::Duration,
    timeout: Duration,
}

impl RobotsPolicy {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            cache: DashMap::new(),
            ttl: chrono::Duration::hours(ROBOTS_TTL_HOURS),
            timeout: ROBOTS_FETCH_TIMEOUT,
        }
    }

    /// Overrides the cache lifetime
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// Absent, unreachable or non-2xx robots.txt allows everything.
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        let allowed = self.document(url).await.is_allowed(url.as_str(), user_agent);
        if !allowed {
            debug!("robots.txt disallows {} for {}", url, user_agent);
        }
        allowed
    }

    /// Crawl delay the origin declares for the given user agent
    pub async fn crawl_delay(&self, url: &Url, user_agent: &str) -> Option<Duration> {
        self.document(url).await.crawl_delay(user_agent)
    }

    /// `Sitemap:` URLs declared by the origin's robots.txt
    pub async fn sitemaps(&self, url: &Url) -> Vec<String> {
        self.document(url).await.sitemap_urls.clone()
    }

    /// Number of origins currently cached
    pub fn cached_origins(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached document
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Returns the cached document for the URL's origin, fetching if needed
    pub async fn document(&self, url: &Url) -> Arc<RobotsDocument> {
        let Some(origin) = origin_of(url) else {
            return Arc::new(RobotsDocument::allow_all());
        };

        let cell = self.cell_for(&origin);
        let cached = cell.get_or_init(|| self.fetch(&origin)).await;
        Arc::clone(&cached.document)
    }

    fn cell_for(&self, origin: &str) -> Arc<OnceCell<CachedRobots>> {
        let mut entry = self
            .cache
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()));

        let stale = entry
            .value()
            .get()
            .map(|cached| cached.is_stale(self.ttl))
            .unwrap_or(false);
        if stale {
            debug!("robots.txt for {} expired, refetching", origin);
            *entry.value_mut() = Arc::new(OnceCell::new());
        }

        Arc::clone(entry.value())
    }

    async fn fetch(&self, origin: &str) -> CachedRobots {
        let robots_url = match Url::parse(&format!("{}/robots.txt", origin)) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build robots.txt URL for {}: {}", origin, e);
                return CachedRobots::new(RobotsDocument::allow_all());
            }
        };

        let document = match self
            .transport
            .get(&robots_url, &HashMap::new(), self.timeout)
            .await
        {
            Ok(response) if response.is_success() => {
                debug!("Fetched {}", robots_url);
                RobotsDocument::parse(&response.text())
            }
            Ok(response) => {
                debug!(
                    "{} answered {}, allowing all",
                    robots_url, response.status_code
                );
                RobotsDocument::allow_all()
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}, allowing all", robots_url, e);
                RobotsDocument::allow_all()
            }
        };

        CachedRobots::new(document)
    }
}

impl std::fmt::Debug for RobotsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotsPolicy")
            .field("cached_origins", &self.cache.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
