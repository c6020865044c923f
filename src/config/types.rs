use crate::crawler::CrawlStrategy;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Default maximum link depth from the seeds
pub const DEFAULT_MAX_DEPTH: u32 = 3;
/// Default page budget per crawl
pub const DEFAULT_MAX_PAGES: usize = 100;
/// Default number of parallel workers
pub const DEFAULT_CONCURRENCY: usize = 5;
/// Default number of retries after the first attempt
pub const DEFAULT_RETRY_BUDGET: u32 = 3;
/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default capacity of the bounded result channel
pub const DEFAULT_RESULT_BUFFER: usize = 32;

/// Path extensions never worth fetching for text ingestion
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "ico", "tif", "tiff", "avif", "mp3", "wav",
    "ogg", "flac", "aac", "mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "zip", "tar", "gz",
    "tgz", "bz2", "xz", "rar", "7z", "exe", "dmg", "iso", "bin", "msi", "apk", "deb", "rpm",
    "woff", "woff2", "ttf", "otf", "eot", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
];

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlOptions,
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<UserAgentConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    /// Traversal discipline used when the CLI doesn't override it
    #[serde(default)]
    pub strategy: CrawlStrategy,
    /// Seed URLs (page URLs, or sitemap URLs for the sitemap strategy)
    #[serde(default)]
    pub seeds: Vec<String>,
    /// External page-importance scores used by the priority strategy
    #[serde(default)]
    pub importance: HashMap<String, i64>,
}

impl Config {
    /// Returns the crawl options with the user agent resolved
    ///
    /// A `[user-agent]` section, when present, overrides `crawler.user-agent`.
    pub fn crawl_options(&self) -> CrawlOptions {
        let mut options = self.crawler.clone();
        if let Some(ua) = &self.user_agent {
            options.user_agent = ua.header_value();
        }
        options
    }
}

/// Crawl behavior options
///
/// Immutable for the lifetime of a crawl; every worker reads the same copy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlOptions {
    /// Maximum link depth from the seeds (seeds are depth 0)
    pub max_depth: u32,

    /// Maximum number of results emitted by one crawl
    pub max_pages: usize,

    /// Number of parallel workers
    pub concurrency: usize,

    /// Pause each worker takes after a fetch (milliseconds)
    pub delay_between_fetches_ms: u64,

    /// Retries after the first attempt for transient failures
    pub retry_budget: u32,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Regular expressions; when non-empty a link must match one
    pub include_patterns: Vec<String>,

    /// Regular expressions; a link matching any is rejected
    pub exclude_patterns: Vec<String>,

    /// Path extensions (without dot) that are never fetched
    pub excluded_extensions: Vec<String>,

    /// Host scope (`example.com` or `*.example.com`); empty means any host
    pub allowed_domains: Vec<String>,

    /// User-Agent header sent with every request and matched against robots.txt
    pub user_agent: String,

    /// Whether robots.txt rules and crawl delays are honored
    pub respect_robots_txt: bool,

    /// Whether image references are collected from fetched pages
    pub include_images: bool,

    /// Capacity of the bounded result channel
    pub result_buffer: usize,

    /// Route fetches through the dynamic renderer when one is attached
    pub render_dynamic: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_pages: DEFAULT_MAX_PAGES,
            concurrency: DEFAULT_CONCURRENCY,
            delay_between_fetches_ms: 0,
            retry_budget: DEFAULT_RETRY_BUDGET,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            allowed_domains: Vec::new(),
            user_agent: default_user_agent(),
            respect_robots_txt: true,
            include_images: false,
            result_buffer: DEFAULT_RESULT_BUFFER,
            render_dynamic: false,
        }
    }
}

impl CrawlOptions {
    /// Pause between fetches as a Duration
    pub fn delay_between_fetches(&self) -> Duration {
        Duration::from_millis(self.delay_between_fetches_ms)
    }

    /// Per-request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Options tuned for the given traversal discipline
    pub fn for_strategy(strategy: CrawlStrategy) -> Self {
        Self {
            concurrency: strategy.default_concurrency(),
            ..Self::default()
        }
    }
}

fn default_user_agent() -> String {
    format!("sumi-harvest/{}", env!("CARGO_PKG_VERSION"))
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Path to the markdown summary file, if one should be written
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}
