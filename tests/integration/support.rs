//! Helpers shared by the integration tests

use sumi_harvest::{CrawlOptions, FetchResult};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Options for a polite but fast test crawl
pub fn options(concurrency: usize) -> CrawlOptions {
    CrawlOptions {
        concurrency,
        request_timeout_secs: 5,
        user_agent: "TestBot/1.0".to_string(),
        ..CrawlOptions::default()
    }
}

/// An HTML page whose body links to each of `links`
pub fn html(links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", anchors),
        "text/html",
    )
}

/// Mounts an HTML page at `route` linking to `links`
pub async fn page(server: &MockServer, route: &str, links: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(links))
        .mount(server)
        .await;
}

/// Mounts an HTML page that must be fetched exactly `times` times
pub async fn page_expecting(server: &MockServer, route: &str, links: &[&str], times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(links))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts a robots.txt body
pub async fn robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Paths of the results in emission order
pub fn paths(results: &[FetchResult]) -> Vec<String> {
    results
        .iter()
        .map(|r| {
            url::Url::parse(&r.url)
                .map(|u| u.path().to_string())
                .unwrap_or_else(|_| r.url.clone())
        })
        .collect()
}
