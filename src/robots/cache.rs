//! Robots.txt caching implementation

use crate::robots::RobotsDocument;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// How long a fetched robots.txt stays authoritative
pub const ROBOTS_TTL_HOURS: i64 = 24;

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub document: Arc<RobotsDocument>,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Wraps a document stamped with the current time
    pub fn new(document: RobotsDocument) -> Self {
        Self {
            document: Arc::new(document),
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the entry is older than `ttl`
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }

    /// Returns the age of the cached robots.txt
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}
