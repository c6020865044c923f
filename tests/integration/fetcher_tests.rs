//! Fetcher retry and rate-limit behavior over real HTTP

use crate::support::options;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sumi_harvest::crawler::{Fetcher, ReqwestTransport};
use sumi_harvest::{CrawlOptions, FetchErrorKind};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(options: CrawlOptions) -> Fetcher {
    let transport = ReqwestTransport::new(&options.user_agent).expect("client");
    Fetcher::new(Arc::new(transport), Arc::new(options))
}

#[tokio::test]
async fn test_429_with_retry_after_waits_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = fetcher(options(1))
        .fetch(
            &format!("{}/limited", server.uri()),
            0,
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_success);
    assert_eq!(result.status_code, Some(200));
    assert_eq!(result.body_text().as_deref(), Some("finally"));
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test]
async fn test_404_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetcher(options(1))
        .fetch(&format!("{}/gone", server.uri()), 0, &CancellationToken::new())
        .await;

    assert!(!result.is_success);
    assert_eq!(result.status_code, Some(404));
    assert_eq!(result.error_kind, Some(FetchErrorKind::Permanent));
}

#[tokio::test]
async fn test_server_error_retried_with_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = fetcher(options(1))
        .fetch(&format!("{}/flaky", server.uri()), 0, &CancellationToken::new())
        .await;

    assert!(result.is_success);
    // first backoff step is one second
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_retry_budget_exhausted_reports_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let opts = CrawlOptions {
        retry_budget: 1,
        ..options(1)
    };
    let result = fetcher(opts)
        .fetch(&format!("{}/down", server.uri()), 0, &CancellationToken::new())
        .await;

    assert!(!result.is_success);
    assert_eq!(result.status_code, Some(500));
    assert_eq!(result.error_kind, Some(FetchErrorKind::Transient));
    assert_eq!(result.error_message.as_deref(), Some("HTTP 500"));
}

#[tokio::test]
async fn test_timeout_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let opts = CrawlOptions {
        retry_budget: 0,
        request_timeout_secs: 1,
        ..options(1)
    };
    let result = fetcher(opts)
        .fetch(&format!("{}/slow", server.uri()), 0, &CancellationToken::new())
        .await;

    assert!(!result.is_success);
    assert_eq!(result.status_code, None);
    assert_eq!(result.error_kind, Some(FetchErrorKind::Transient));
}

#[tokio::test]
async fn test_redirect_records_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>moved</p>", "text/html"))
        .mount(&server)
        .await;

    let url = format!("{}/old", server.uri());
    let result = fetcher(options(1))
        .fetch(&url, 0, &CancellationToken::new())
        .await;

    assert!(result.is_success);
    assert_eq!(result.url, url);
    assert_eq!(result.final_url, format!("{}/new", server.uri()));
    assert!(result.is_html());
}

#[tokio::test]
async fn test_user_agent_header_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(header("user-agent", "TestBot/1.0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetcher(options(1))
        .fetch(&format!("{}/ua", server.uri()), 0, &CancellationToken::new())
        .await;
    assert!(result.is_success);
}

#[tokio::test]
async fn test_cancel_during_rate_limit_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = fetcher(options(1))
        .fetch(&format!("{}/busy", server.uri()), 0, &cancel)
        .await;

    assert_eq!(result.error_kind, Some(FetchErrorKind::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
}
