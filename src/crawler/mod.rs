//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - HTML parsing and link extraction
//! - Traversal disciplines (frontiers) and the strategy that picks one
//! - Request scheduling and rate limiting
//! - Overall crawl coordination

mod coordinator;
mod engine;
mod fetcher;
mod frontier;
mod parser;
pub mod retry;
mod scheduler;
mod strategy;
mod transport;

pub use coordinator::{Coordinator, CrawlHandle, Crawler};
pub use engine::Engine;
pub use fetcher::{FetchErrorKind, FetchResult, Fetcher, Renderer};
pub use frontier::{
    BreadthFirstFrontier, DepthFirstFrontier, Frontier, FrontierEntry, PageImportance,
    PriorityFrontier, SitemapFrontier,
};
pub use parser::{extract_links, ExtractedLinks};
pub use retry::{parse_retry_after, RetryPolicy};
pub use scheduler::{ActiveClaim, Claim, Scheduler};
pub use strategy::CrawlStrategy;
pub use transport::{
    build_http_client, HttpTransport, ReqwestTransport, TransportError, TransportResponse,
};

#[cfg(test)]
pub(crate) use transport::testing;
