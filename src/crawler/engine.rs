//! The crawling engine
//!
//! [`Engine`] wires the fetcher, robots policy, sitemap source and link
//! extractor together behind the [`Crawler`] trait, and starts crawls with a
//! frontier picked by [`CrawlStrategy`]. Robots and sitemap caches live on
//! the engine and are shared by every crawl it starts; all other state is
//! per crawl.

use crate::config::{validate_options, CrawlOptions};
use crate::crawler::coordinator::{check_seed, Coordinator, CrawlHandle, Crawler};
use crate::crawler::fetcher::{FetchResult, Fetcher, Renderer};
use crate::crawler::frontier::PageImportance;
use crate::crawler::parser::{extract_links, ExtractedLinks};
use crate::crawler::strategy::CrawlStrategy;
use crate::crawler::transport::{HttpTransport, ReqwestTransport};
use crate::output::CrawlStatistics;
use crate::robots::RobotsPolicy;
use crate::sitemap::SitemapSource;
use crate::url::UrlFilter;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// Entry point for running crawls
#[derive(Clone)]
pub struct Engine {
    options: Arc<CrawlOptions>,
    filter: UrlFilter,
    fetcher: Fetcher,
    robots: Arc<RobotsPolicy>,
    sitemaps: Arc<SitemapSource>,
    importance: Arc<PageImportance>,
}

impl Engine {
    /// Creates an engine backed by a reqwest client
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the HTTP client
    /// cannot be built.
    pub fn new(options: CrawlOptions) -> Result<Self> {
        validate_options(&options)?;
        let transport = ReqwestTransport::new(&options.user_agent)?;
        Self::with_transport(options, Arc::new(transport))
    }

    /// Creates an engine over a caller-supplied transport
    pub fn with_transport(options: CrawlOptions, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        validate_options(&options)?;
        let filter = UrlFilter::from_options(&options)?;
        let options = Arc::new(options);

        Ok(Self {
            fetcher: Fetcher::new(Arc::clone(&transport), Arc::clone(&options)),
            robots: Arc::new(RobotsPolicy::new(Arc::clone(&transport))),
            sitemaps: Arc::new(SitemapSource::new(transport)),
            importance: Arc::new(PageImportance::default()),
            filter,
            options,
        })
    }

    /// Routes pages through a dynamic renderer when `render-dynamic` is on
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.fetcher = self.fetcher.with_renderer(renderer);
        self
    }

    /// Importance scores consulted by the priority strategy
    pub fn with_importance(mut self, scores: HashMap<String, i64>) -> Self {
        self.importance = Arc::new(PageImportance::new(scores));
        self
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    pub fn robots(&self) -> &RobotsPolicy {
        &self.robots
    }

    pub fn sitemaps(&self) -> &SitemapSource {
        &self.sitemaps
    }

    /// Starts a crawl and returns a handle streaming its results
    ///
    /// For [`CrawlStrategy::Sitemap`] each seed is either a sitemap URL
    /// (ending in `.xml`) or a page whose site's sitemaps are discovered
    /// through robots.txt; the resolved page list is crawled without
    /// following links. Listed pages pass through the same filters as
    /// discovered links, while a seed whose site lists nothing is crawled
    /// as is.
    pub async fn start(&self, strategy: CrawlStrategy, seeds: Vec<String>) -> Result<CrawlHandle> {
        self.start_with_token(strategy, seeds, CancellationToken::new())
            .await
    }

    /// Like [`Engine::start`], cancelled through a caller-owned token
    pub async fn start_with_token(
        &self,
        strategy: CrawlStrategy,
        seeds: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<CrawlHandle> {
        if seeds.is_empty() {
            return Err(HarvestError::NoSeeds);
        }
        for seed in &seeds {
            check_seed(seed)?;
        }

        let (seeds, listed) = match strategy {
            CrawlStrategy::Sitemap => self.resolve_sitemap_seeds(seeds).await?,
            _ => (seeds, Vec::new()),
        };

        Coordinator::new(
            Arc::new(self.clone()),
            Arc::clone(&self.options),
            self.filter.clone(),
            strategy.build_frontier(Arc::clone(&self.importance)),
        )
        .with_listed_pages(listed)
        .start_with_token(seeds, cancel)
    }

    /// Runs a crawl to completion and returns every result
    pub async fn crawl(
        &self,
        strategy: CrawlStrategy,
        seeds: Vec<String>,
    ) -> Result<(Vec<FetchResult>, CrawlStatistics)> {
        self.start(strategy, seeds).await?.collect().await
    }

    /// Splits sitemap-strategy seeds into seeds crawled directly and the
    /// pages their sitemaps list
    async fn resolve_sitemap_seeds(&self, seeds: Vec<String>) -> Result<(Vec<String>, Vec<String>)> {
        let mut seen = HashSet::new();
        let mut direct = Vec::new();
        let mut pages = Vec::new();

        for seed in seeds {
            let url = Url::parse(&seed).map_err(|e| HarvestError::InvalidSeed {
                url: seed.clone(),
                reason: e.to_string(),
            })?;

            let found = if looks_like_sitemap(&url) {
                self.sitemaps.extract_urls(&seed).await
            } else {
                self.sitemaps.discover(&url, &self.robots).await
            };

            if found.is_empty() {
                warn!("No sitemap entries for {}, crawling it directly", seed);
                direct.push(seed);
                continue;
            }
            pages.extend(found.into_iter().filter(|page| seen.insert(page.clone())));
        }

        info!(
            "Sitemap strategy resolved {} URLs ({} seeds crawled directly)",
            pages.len(),
            direct.len()
        );
        Ok((direct, pages))
    }
}

fn looks_like_sitemap(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.ends_with(".xml") || path.ends_with(".xml.gz")
}

#[async_trait]
impl Crawler for Engine {
    async fn fetch(&self, url: &str, depth: u32, cancel: &CancellationToken) -> FetchResult {
        self.fetcher.fetch(url, depth, cancel).await
    }

    fn extract_links(&self, html: &str, base_url: &Url) -> ExtractedLinks {
        extract_links(html, base_url, self.options.include_images)
    }

    async fn is_allowed(&self, url: &Url) -> bool {
        self.robots.is_allowed(url, &self.options.user_agent).await
    }

    async fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        self.robots.crawl_delay(url, &self.options.user_agent).await
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("fetcher", &self.fetcher)
            .field("cached_robots", &self.robots.cached_origins())
            .finish()
    }
}
