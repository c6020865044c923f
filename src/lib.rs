//! Sumi-Harvest: a concurrent crawling engine for web ingestion
//!
//! This crate decides which URLs to fetch, in what order and with how much
//! parallelism, while honoring robots.txt, sitemaps, retry budgets and
//! server-declared rate limits. Fetched pages are streamed out as
//! [`FetchResult`] records for downstream preprocessing.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod sitemap;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
///
/// Fetch-level failures never show up here: they are carried as data on
/// [`FetchResult`]. These variants cover misuse of the public API and
/// configuration problems, which fail fast before any network activity.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("No seed URLs were provided")]
    NoSeeds,

    #[error("Invalid seed URL {url}: {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("Invalid crawl phase transition: {0}")]
    Phase(#[from] state::PhaseError),

    #[error("Crawl worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, CrawlOptions};
pub use crawler::{CrawlHandle, CrawlStrategy, Crawler, Engine, FetchErrorKind, FetchResult};
pub use output::{CrawlStatistics, StatisticsCollector};
pub use state::CrawlPhase;
pub use url::{extract_domain, normalize_url, UrlFilter};
