//! Crawl strategies and their frontier factory

use crate::crawler::frontier::{
    BreadthFirstFrontier, DepthFirstFrontier, Frontier, PageImportance, PriorityFrontier,
    SitemapFrontier,
};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Traversal discipline for a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlStrategy {
    /// Level by level from the seeds
    #[default]
    BreadthFirst,
    /// One branch at a time
    DepthFirst,
    /// Highest `importance - depth` first
    Priority,
    /// Only the URLs listed in the seeds' sitemaps
    Sitemap,
}

impl CrawlStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BreadthFirst => "breadth-first",
            Self::DepthFirst => "depth-first",
            Self::Priority => "priority",
            Self::Sitemap => "sitemap",
        }
    }

    /// Worker count used when the caller does not pick one
    pub fn default_concurrency(&self) -> usize {
        match self {
            Self::Priority => 3,
            _ => crate::config::DEFAULT_CONCURRENCY,
        }
    }

    /// Creates an empty frontier for this discipline
    pub fn build_frontier(&self, importance: Arc<PageImportance>) -> Box<dyn Frontier> {
        match self {
            Self::BreadthFirst => Box::new(BreadthFirstFrontier::new()),
            Self::DepthFirst => Box::new(DepthFirstFrontier::new()),
            Self::Priority => Box::new(PriorityFrontier::new(importance)),
            Self::Sitemap => Box::new(SitemapFrontier::new()),
        }
    }
}

impl fmt::Display for CrawlStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrawlStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bfs" | "breadth-first" | "breadth_first" => Ok(Self::BreadthFirst),
            "dfs" | "depth-first" | "depth_first" => Ok(Self::DepthFirst),
            "priority" => Ok(Self::Priority),
            "sitemap" => Ok(Self::Sitemap),
            other => Err(format!(
                "unknown strategy '{}' (expected bfs, dfs, priority or sitemap)",
                other
            )),
        }
    }
}
