//! End-to-end crawl tests over a mock site

use crate::support::{html, options, page, page_expecting, paths, robots};
use std::collections::HashSet;
use std::time::Duration;
use sumi_harvest::{CrawlOptions, CrawlPhase, CrawlStrategy, Engine, FetchErrorKind};
use tokio_stream::StreamExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn crawl(
    server: &MockServer,
    options: CrawlOptions,
    strategy: CrawlStrategy,
) -> (Vec<sumi_harvest::FetchResult>, sumi_harvest::CrawlStatistics) {
    Engine::new(options)
        .expect("engine")
        .crawl(strategy, vec![format!("{}/", server.uri())])
        .await
        .expect("crawl")
}

/// Root links to /a and /b; /a links to /a/1; /b links to /b/1
async fn two_branch_site(server: &MockServer) {
    page(server, "/", &["/a", "/b"]).await;
    page(server, "/a", &["/a/1"]).await;
    page(server, "/b", &["/b/1"]).await;
    page(server, "/a/1", &["/"]).await;
    page(server, "/b/1", &[]).await;
}

#[tokio::test]
async fn test_bfs_level_order_single_worker() {
    let server = MockServer::start().await;
    two_branch_site(&server).await;

    let (results, stats) = crawl(&server, options(1), CrawlStrategy::BreadthFirst).await;

    assert_eq!(paths(&results), vec!["/", "/a", "/b", "/a/1", "/b/1"]);
    assert_eq!(stats.successful_requests, 5);
    assert_eq!(results[0].discovered_links.len(), 2);
    assert_eq!(
        results[3].parent_url.as_deref(),
        Some(format!("{}/a", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_dfs_branch_exhaustion() {
    let server = MockServer::start().await;
    page(&server, "/", &["/a", "/b"]).await;
    page(&server, "/a", &["/a/1"]).await;
    page(&server, "/a/1", &[]).await;
    page(&server, "/b", &[]).await;

    let (results, _) = crawl(&server, options(1), CrawlStrategy::DepthFirst).await;

    assert_eq!(paths(&results), vec!["/", "/a", "/a/1", "/b"]);
}

#[tokio::test]
async fn test_no_double_visit_under_concurrency() {
    let server = MockServer::start().await;
    let all = ["/", "/p1", "/p2", "/p3", "/p4", "/p5", "/p6"];
    for route in all {
        // Every page links to every page, with and without trailing slash
        let mut links: Vec<String> = all.iter().map(|p| p.to_string()).collect();
        links.extend(all.iter().skip(1).map(|p| format!("{}/", p)));
        let refs: Vec<&str> = links.iter().map(String::as_str).collect();
        page_expecting(&server, route, &refs, 1).await;
    }

    let (results, _) = crawl(&server, options(4), CrawlStrategy::BreadthFirst).await;

    assert_eq!(results.len(), all.len());
    let unique: HashSet<_> = paths(&results).into_iter().collect();
    assert_eq!(unique.len(), all.len());
    // Mock expectations are verified when the server drops
}

#[tokio::test]
async fn test_depth_bound() {
    let server = MockServer::start().await;
    page(&server, "/", &["/one"]).await;
    page(&server, "/one", &["/two"]).await;
    page_expecting(&server, "/two", &["/three"], 0).await;

    let opts = CrawlOptions {
        max_depth: 1,
        ..options(2)
    };
    let (results, _) = crawl(&server, opts, CrawlStrategy::BreadthFirst).await;

    assert_eq!(paths(&results), vec!["/", "/one"]);
    assert!(results.iter().all(|r| r.depth <= 1));
}

#[tokio::test]
async fn test_page_bound_under_concurrency() {
    let server = MockServer::start().await;
    let children: Vec<String> = (0..20).map(|i| format!("/item/{}", i)).collect();
    let refs: Vec<&str> = children.iter().map(String::as_str).collect();
    page(&server, "/", &refs).await;
    Mock::given(method("GET"))
        .respond_with(html(&[]))
        .mount(&server)
        .await;

    let opts = CrawlOptions {
        max_pages: 5,
        ..options(4)
    };
    let (results, stats) = crawl(&server, opts, CrawlStrategy::BreadthFirst).await;

    assert_eq!(results.len(), 5);
    assert_eq!(stats.total_results(), 5);
}

#[tokio::test]
async fn test_robots_allow_wins_over_disallow() {
    let server = MockServer::start().await;
    robots(
        &server,
        "User-agent: *\nDisallow: /private\nAllow: /private/public\n",
    )
    .await;
    page(&server, "/", &["/private/secret", "/private/public/page"]).await;
    page_expecting(&server, "/private/secret", &[], 0).await;
    page_expecting(&server, "/private/public/page", &[], 1).await;

    let (results, stats) = crawl(&server, options(1), CrawlStrategy::BreadthFirst).await;

    let secret = results
        .iter()
        .find(|r| r.url.ends_with("/private/secret"))
        .expect("denied result is emitted");
    assert_eq!(secret.error_kind, Some(FetchErrorKind::RobotsDenied));
    assert!(!secret.is_success);
    assert_eq!(stats.skipped_requests, 1);
    assert_eq!(stats.successful_requests, 2);
}

#[tokio::test]
async fn test_robots_404_allows_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    page(&server, "/", &["/anything"]).await;
    page(&server, "/anything", &[]).await;

    let (results, _) = crawl(&server, options(2), CrawlStrategy::BreadthFirst).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_success));
}

#[tokio::test]
async fn test_user_agent_specific_robots_group() {
    let server = MockServer::start().await;
    robots(
        &server,
        "User-agent: TestBot\nDisallow: /bots-keep-out\n\nUser-agent: *\nDisallow: /\n",
    )
    .await;
    page(&server, "/", &["/open", "/bots-keep-out"]).await;
    page(&server, "/open", &[]).await;
    page_expecting(&server, "/bots-keep-out", &[], 0).await;

    let (results, _) = crawl(&server, options(1), CrawlStrategy::BreadthFirst).await;

    assert_eq!(paths(&results), vec!["/", "/open", "/bots-keep-out"]);
    assert_eq!(results[2].error_kind, Some(FetchErrorKind::RobotsDenied));
}

#[tokio::test]
async fn test_exclude_patterns_and_extensions() {
    let server = MockServer::start().await;
    page(
        &server,
        "/",
        &["/docs/intro", "/admin/panel", "/report.pdf", "/docs/logo.PNG"],
    )
    .await;
    page(&server, "/docs/intro", &[]).await;
    page_expecting(&server, "/admin/panel", &[], 0).await;

    let opts = CrawlOptions {
        exclude_patterns: vec!["/admin/".to_string()],
        ..options(2)
    };
    let (results, _) = crawl(&server, opts, CrawlStrategy::BreadthFirst).await;

    assert_eq!(paths(&results), vec!["/", "/docs/intro"]);
}

#[tokio::test]
async fn test_priority_strategy_filters_and_budget() {
    let server = MockServer::start().await;
    page(
        &server,
        "/",
        &["/admin/panel", "/guide.pdf", "/a", "/b", "/c", "/d"],
    )
    .await;
    page_expecting(&server, "/admin/panel", &[], 0).await;
    page_expecting(&server, "/guide.pdf", &[], 0).await;
    for route in ["/a", "/b", "/c", "/d"] {
        page(&server, route, &[]).await;
    }

    let opts = CrawlOptions {
        max_pages: 3,
        exclude_patterns: vec!["/admin/".to_string()],
        ..options(1)
    };
    let (results, _) = crawl(&server, opts, CrawlStrategy::Priority).await;

    assert_eq!(results.len(), 3);
    assert_eq!(paths(&results)[0], "/");
    assert!(paths(&results)
        .iter()
        .all(|p| !p.starts_with("/admin/") && !p.ends_with(".pdf")));
}

#[tokio::test]
async fn test_failed_pages_are_emitted_not_retried() {
    let server = MockServer::start().await;
    page(&server, "/", &["/missing"]).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (results, stats) = crawl(&server, options(1), CrawlStrategy::BreadthFirst).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[1].status_code, Some(404));
    assert_eq!(results[1].error_kind, Some(FetchErrorKind::Permanent));
    assert_eq!(stats.failed_requests, 1);
    assert_eq!(stats.status_code_distribution.get(&404), Some(&1));
}

#[tokio::test]
async fn test_cancellation_stops_new_work() {
    let server = MockServer::start().await;
    let children: Vec<String> = (0..40).map(|i| format!("/slow/{}", i)).collect();
    let refs: Vec<&str> = children.iter().map(String::as_str).collect();
    page(&server, "/", &refs).await;
    Mock::given(method("GET"))
        .respond_with(html(&[]).set_delay(Duration::from_millis(100)))
        .mount(&server)
        .await;

    let engine = Engine::new(options(2)).expect("engine");
    let mut handle = engine
        .start(CrawlStrategy::BreadthFirst, vec![format!("{}/", server.uri())])
        .await
        .expect("start");

    let first = handle.next_result().await.expect("first result");
    assert!(first.is_success);
    handle.cancel();
    assert_eq!(handle.phase(), CrawlPhase::Cancelled);

    let stats = handle.join().await.expect("join");
    assert!(stats.total_results() < 41);
}

#[tokio::test]
async fn test_results_as_stream() {
    let server = MockServer::start().await;
    two_branch_site(&server).await;

    let engine = Engine::new(options(3)).expect("engine");
    let stream = engine
        .start(CrawlStrategy::BreadthFirst, vec![format!("{}/", server.uri())])
        .await
        .expect("start")
        .into_stream();

    let urls: Vec<String> = stream.map(|r| r.url).collect().await;
    assert_eq!(urls.len(), 5);
}

#[tokio::test]
async fn test_invalid_seed_rejected_before_network() {
    let engine = Engine::new(options(1)).expect("engine");
    let err = engine
        .start(
            CrawlStrategy::BreadthFirst,
            vec!["ftp://example.com/file".to_string()],
        )
        .await
        .err()
        .expect("invalid seed");
    assert!(matches!(err, sumi_harvest::HarvestError::InvalidSeed { .. }));
}
