//! Sitemap discovery and expansion
//!
//! [`SitemapSource`] turns a sitemap URL into the flat list of page URLs it
//! describes, following `<sitemapindex>` children breadth-first up to
//! [`MAX_SITEMAP_DEPTH`] levels and fetching each child at most once.

mod parser;

pub use parser::{
    extract_locs_fallback, parse_sitemap, SitemapEntry, SitemapParseError, SITEMAP_NAMESPACE,
};

use crate::crawler::HttpTransport;
use crate::robots::RobotsPolicy;
use crate::url::origin_of;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

/// Deepest sitemap-index nesting that is followed
pub const MAX_SITEMAP_DEPTH: usize = 5;

/// Timeout for sitemap requests
pub const SITEMAP_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches and flattens sitemaps, caching results per sitemap URL
pub struct SitemapSource {
    transport: Arc<dyn HttpTransport>,
    cache: DashMap<String, Arc<OnceCell<Arc<Vec<String>>>>>,
    timeout: Duration,
}

impl SitemapSource {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            cache: DashMap::new(),
            timeout: SITEMAP_FETCH_TIMEOUT,
        }
    }

    /// Returns every page URL reachable from `sitemap_url`
    ///
    /// Order follows the documents; duplicates are dropped. Unreachable or
    /// empty sitemaps yield an empty list.
    pub async fn extract_urls(&self, sitemap_url: &str) -> Vec<String> {
        let cell = Arc::clone(
            self.cache
                .entry(sitemap_url.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let urls = cell
            .get_or_init(|| async { Arc::new(self.expand(sitemap_url).await) })
            .await;
        urls.as_ref().clone()
    }

    /// Finds page URLs for the site a seed belongs to
    ///
    /// Uses the `Sitemap:` lines of the origin's robots.txt, falling back to
    /// `<origin>/sitemap.xml` when there are none.
    pub async fn discover(&self, seed: &Url, robots: &RobotsPolicy) -> Vec<String> {
        let mut sitemaps = robots.sitemaps(seed).await;
        if sitemaps.is_empty() {
            match origin_of(seed) {
                Some(origin) => sitemaps.push(format!("{}/sitemap.xml", origin)),
                None => return Vec::new(),
            }
        }

        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        for sitemap in sitemaps {
            for url in self.extract_urls(&sitemap).await {
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
        }

        info!("Discovered {} URLs from sitemaps of {}", urls.len(), seed);
        urls
    }

    async fn expand(&self, root: &str) -> Vec<String> {
        let mut queue = VecDeque::from([(root.to_string(), 0usize)]);
        let mut fetched: HashSet<String> = HashSet::from([root.to_string()]);
        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        while let Some((sitemap_url, depth)) = queue.pop_front() {
            if depth > MAX_SITEMAP_DEPTH {
                warn!(
                    "Skipping {}: sitemap nesting deeper than {}",
                    sitemap_url, MAX_SITEMAP_DEPTH
                );
                continue;
            }

            let Some(body) = self.fetch(&sitemap_url).await else {
                continue;
            };

            let entries = match parse_sitemap(&body) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        "Malformed sitemap {}: {}; falling back to <loc> scan",
                        sitemap_url, e
                    );
                    extract_locs_fallback(&body)
                }
            };

            for entry in entries {
                match entry {
                    SitemapEntry::Url(url) => {
                        if seen.insert(url.clone()) {
                            urls.push(url);
                        }
                    }
                    SitemapEntry::Sitemap(child) => {
                        if fetched.insert(child.clone()) {
                            queue.push_back((child, depth + 1));
                        }
                    }
                }
            }
        }

        debug!("Sitemap {} expanded to {} URLs", root, urls.len());
        urls
    }

    async fn fetch(&self, sitemap_url: &str) -> Option<String> {
        let url = match Url::parse(sitemap_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid sitemap URL {}: {}", sitemap_url, e);
                return None;
            }
        };

        match self.transport.get(&url, &HashMap::new(), self.timeout).await {
            Ok(response) if response.is_success() => Some(response.text()),
            Ok(response) => {
                warn!("Sitemap {} answered {}", sitemap_url, response.status_code);
                None
            }
            Err(e) => {
                warn!("Failed to fetch sitemap {}: {}", sitemap_url, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for SitemapSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SitemapSource")
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::MockTransport;

    fn urlset(locs: &[&str]) -> String {
        let body: String = locs
            .iter()
            .map(|l| format!("<url><loc>{}</loc></url>", l))
            .collect();
        format!(
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
            body
        )
    }

    fn index(locs: &[&str]) -> String {
        let body: String = locs
            .iter()
            .map(|l| format!("<sitemap><loc>{}</loc></sitemap>", l))
            .collect();
        format!(
            r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</sitemapindex>"#,
            body
        )
    }

    #[tokio::test]
    async fn test_index_flattens_children() {
        let transport = Arc::new(MockTransport::new());
        transport
            .respond(
                "https://example.com/sitemap.xml",
                200,
                &index(&["https://example.com/a.xml", "https://example.com/b.xml"]),
            )
            .respond("https://example.com/a.xml", 200, &urlset(&["https://example.com/1"]))
            .respond("https://example.com/b.xml", 200, &urlset(&["https://example.com/2"]));
        let source = SitemapSource::new(transport);

        let urls = source.extract_urls("https://example.com/sitemap.xml").await;
        assert_eq!(urls, vec!["https://example.com/1", "https://example.com/2"]);
    }

    #[tokio::test]
    async fn test_child_fetched_once_and_urls_deduped() {
        let transport = Arc::new(MockTransport::new());
        transport
            .respond(
                "https://example.com/sitemap.xml",
                200,
                &index(&["https://example.com/a.xml", "https://example.com/a.xml"]),
            )
            .respond(
                "https://example.com/a.xml",
                200,
                &urlset(&["https://example.com/1", "https://example.com/1"]),
            );
        let source = SitemapSource::new(transport.clone());

        let urls = source.extract_urls("https://example.com/sitemap.xml").await;
        assert_eq!(urls, vec!["https://example.com/1"]);
        assert_eq!(transport.request_count("https://example.com/a.xml"), 1);
    }

    #[tokio::test]
    async fn test_self_referencing_index_terminates() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "https://example.com/sitemap.xml",
            200,
            &index(&["https://example.com/sitemap.xml"]),
        );
        let source = SitemapSource::new(transport.clone());

        assert!(source
            .extract_urls("https://example.com/sitemap.xml")
            .await
            .is_empty());
        assert_eq!(transport.request_count("https://example.com/sitemap.xml"), 1);
    }

    #[tokio::test]
    async fn test_depth_cap() {
        let transport = Arc::new(MockTransport::new());
        // s0 -> s1 -> ... -> s7, each level one index deeper
        for level in 0..7 {
            transport.respond(
                &format!("https://example.com/s{}.xml", level),
                200,
                &index(&[format!("https://example.com/s{}.xml", level + 1).as_str()]),
            );
        }
        transport.respond("https://example.com/s7.xml", 200, &urlset(&["https://example.com/deep"]));
        let source = SitemapSource::new(transport.clone());

        assert!(source
            .extract_urls("https://example.com/s0.xml")
            .await
            .is_empty());
        assert_eq!(transport.request_count("https://example.com/s5.xml"), 1);
        assert_eq!(transport.request_count("https://example.com/s6.xml"), 0);
    }

    #[tokio::test]
    async fn test_malformed_uses_fallback() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "https://example.com/sitemap.xml",
            200,
            "<urlset><url><loc>https://example.com/1</loc></url><url><loc>https://example.com/2</loc>",
        );
        let source = SitemapSource::new(transport);

        let urls = source.extract_urls("https://example.com/sitemap.xml").await;
        assert_eq!(urls, vec!["https://example.com/1", "https://example.com/2"]);
    }

    #[tokio::test]
    async fn test_unreachable_is_empty_and_cached() {
        let transport = Arc::new(MockTransport::new());
        let source = SitemapSource::new(transport.clone());

        assert!(source.extract_urls("https://example.com/missing.xml").await.is_empty());
        assert!(source.extract_urls("https://example.com/missing.xml").await.is_empty());
        assert_eq!(transport.request_count("https://example.com/missing.xml"), 1);
    }

    #[tokio::test]
    async fn test_discover_uses_robots_then_default() {
        let transport = Arc::new(MockTransport::new());
        transport
            .respond(
                "https://a.example/robots.txt",
                200,
                "Sitemap: https://a.example/custom.xml\n",
            )
            .respond("https://a.example/custom.xml", 200, &urlset(&["https://a.example/x"]))
            .respond("https://b.example/sitemap.xml", 200, &urlset(&["https://b.example/y"]));
        let robots = RobotsPolicy::new(transport.clone());
        let source = SitemapSource::new(transport);

        let a = source
            .discover(&Url::parse("https://a.example/").unwrap(), &robots)
            .await;
        assert_eq!(a, vec!["https://a.example/x"]);

        let b = source
            .discover(&Url::parse("https://b.example/page").unwrap(), &robots)
            .await;
        assert_eq!(b, vec!["https://b.example/y"]);
    }
}
