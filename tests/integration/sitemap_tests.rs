//! Sitemap discovery and sitemap-strategy crawls

use crate::support::{options, page, page_expecting, paths, robots};
use std::sync::Arc;
use sumi_harvest::crawler::{HttpTransport, ReqwestTransport};
use sumi_harvest::robots::RobotsPolicy;
use sumi_harvest::sitemap::SitemapSource;
use sumi_harvest::{CrawlOptions, CrawlStrategy, Engine};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> Arc<dyn HttpTransport> {
    Arc::new(ReqwestTransport::new("TestBot/1.0").expect("client"))
}

fn urlset(base: &str, paths: &[&str]) -> String {
    let entries: String = paths
        .iter()
        .map(|p| format!("<url><loc>{}{}</loc></url>", base, p))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        entries
    )
}

async fn xml(server: &MockServer, route: &str, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/xml"))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sitemap_index_expands_children_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    let index = format!(
        r#"<?xml version="1.0"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{base}/one.xml</loc></sitemap>
  <sitemap><loc>{base}/two.xml</loc></sitemap>
  <sitemap><loc>{base}/one.xml</loc></sitemap>
</sitemapindex>"#
    );
    xml(&server, "/index.xml", index, 1).await;
    xml(&server, "/one.xml", urlset(&base, &["/a"]), 1).await;
    xml(&server, "/two.xml", urlset(&base, &["/b", "/a"]), 1).await;

    let source = SitemapSource::new(transport());
    let urls = source.extract_urls(&format!("{}/index.xml", base)).await;

    assert_eq!(urls, vec![format!("{}/a", base), format!("{}/b", base)]);

    // Cached: no second round of requests
    let again = source.extract_urls(&format!("{}/index.xml", base)).await;
    assert_eq!(again.len(), 2);
}

#[tokio::test]
async fn test_malformed_sitemap_falls_back_to_loc_scan() {
    let server = MockServer::start().await;
    let base = server.uri();
    let broken = format!(
        "<urlset><url><loc>{base}/x</loc></url><url><loc>{base}/y</loc>",
        base = base
    );
    xml(&server, "/sitemap.xml", broken, 1).await;

    let urls = SitemapSource::new(transport())
        .extract_urls(&format!("{}/sitemap.xml", base))
        .await;

    assert_eq!(urls, vec![format!("{}/x", base), format!("{}/y", base)]);
}

#[tokio::test]
async fn test_unreachable_sitemap_is_empty() {
    let server = MockServer::start().await;
    let urls = SitemapSource::new(transport())
        .extract_urls(&format!("{}/missing.xml", server.uri()))
        .await;
    assert!(urls.is_empty());
}

#[tokio::test]
async fn test_discover_uses_robots_sitemap_lines() {
    let server = MockServer::start().await;
    let base = server.uri();
    robots(&server, &format!("User-agent: *\nAllow: /\nSitemap: {}/maps/pages.xml\n", base)).await;
    xml(&server, "/maps/pages.xml", urlset(&base, &["/listed"]), 1).await;
    xml(&server, "/sitemap.xml", urlset(&base, &["/unused"]), 0).await;

    let transport = transport();
    let robots_policy = RobotsPolicy::new(transport.clone());
    let seed = Url::parse(&format!("{}/", base)).expect("seed");
    let urls = SitemapSource::new(transport)
        .discover(&seed, &robots_policy)
        .await;

    assert_eq!(urls, vec![format!("{}/listed", base)]);
}

#[tokio::test]
async fn test_discover_falls_back_to_default_location() {
    let server = MockServer::start().await;
    let base = server.uri();
    xml(&server, "/sitemap.xml", urlset(&base, &["/p"]), 1).await;

    let transport = transport();
    let robots_policy = RobotsPolicy::new(transport.clone());
    let seed = Url::parse(&format!("{}/deep/page", base)).expect("seed");
    let urls = SitemapSource::new(transport)
        .discover(&seed, &robots_policy)
        .await;

    assert_eq!(urls, vec![format!("{}/p", base)]);
}

#[tokio::test]
async fn test_sitemap_strategy_crawls_listed_pages_only() {
    let server = MockServer::start().await;
    let base = server.uri();
    xml(&server, "/sitemap.xml", urlset(&base, &["/one", "/two"]), 1).await;
    page(&server, "/one", &["/not-listed"]).await;
    page(&server, "/two", &[]).await;
    page_expecting(&server, "/not-listed", &[], 0).await;

    let (results, stats) = Engine::new(options(2))
        .expect("engine")
        .crawl(CrawlStrategy::Sitemap, vec![format!("{}/", base)])
        .await
        .expect("crawl");

    let mut crawled = paths(&results);
    crawled.sort();
    assert_eq!(crawled, vec!["/one", "/two"]);
    assert!(results.iter().all(|r| r.depth == 0));
    assert_eq!(stats.successful_requests, 2);
}

#[tokio::test]
async fn test_sitemap_strategy_without_sitemap_crawls_seed() {
    let server = MockServer::start().await;
    page(&server, "/", &["/child"]).await;
    page_expecting(&server, "/child", &[], 0).await;

    let (results, _) = Engine::new(options(1))
        .expect("engine")
        .crawl(CrawlStrategy::Sitemap, vec![format!("{}/", server.uri())])
        .await
        .expect("crawl");

    assert_eq!(paths(&results), vec!["/"]);
}

#[tokio::test]
async fn test_sitemap_strategy_applies_filters_to_listed_pages() {
    let server = MockServer::start().await;
    let base = server.uri();
    xml(
        &server,
        "/sitemap.xml",
        urlset(&base, &["/ok", "/admin/x", "/file.pdf"]),
        1,
    )
    .await;
    page(&server, "/ok", &[]).await;
    page_expecting(&server, "/admin/x", &[], 0).await;
    page_expecting(&server, "/file.pdf", &[], 0).await;

    let opts = CrawlOptions {
        exclude_patterns: vec!["/admin/".to_string()],
        ..options(2)
    };
    let (results, _) = Engine::new(opts)
        .expect("engine")
        .crawl(CrawlStrategy::Sitemap, vec![format!("{}/sitemap.xml", base)])
        .await
        .expect("crawl");

    assert_eq!(paths(&results), vec!["/ok"]);
}

#[tokio::test]
async fn test_sitemap_strategy_stops_at_page_budget() {
    let server = MockServer::start().await;
    let base = server.uri();
    let listed: Vec<String> = (0..10).map(|i| format!("/listed/{}", i)).collect();
    let refs: Vec<&str> = listed.iter().map(String::as_str).collect();
    xml(&server, "/sitemap.xml", urlset(&base, &refs), 1).await;
    Mock::given(method("GET"))
        .respond_with(crate::support::html(&[]))
        .mount(&server)
        .await;

    let opts = CrawlOptions {
        max_pages: 4,
        ..options(3)
    };
    let (results, stats) = Engine::new(opts)
        .expect("engine")
        .crawl(CrawlStrategy::Sitemap, vec![format!("{}/sitemap.xml", base)])
        .await
        .expect("crawl");

    assert_eq!(results.len(), 4);
    assert_eq!(stats.total_results(), 4);
    assert!(paths(&results).iter().all(|p| p.starts_with("/listed/")));
}
