//! HTTP fetcher implementation
//!
//! [`Fetcher::fetch`] never returns an error: every outcome, including
//! exhausted retries and invalid input, is a [`FetchResult`] whose
//! `error_kind` says what went wrong. See [`crate::crawler::retry`] for the
//! retry table.

use crate::config::CrawlOptions;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::transport::{HttpTransport, TransportError, TransportResponse};
use crate::url::{extract_domain, is_crawlable_scheme};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Why a fetch did not produce a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Timeout, connection failure or 5xx; retried
    Transient,
    /// HTTP 429; retried after `Retry-After`
    RateLimited,
    /// 4xx other than 429, or an unrecoverable transport error
    Permanent,
    /// Not an absolute http(s) URL
    InvalidUrl,
    /// robots.txt forbids the URL; never fetched
    RobotsDenied,
    /// Crawl cancelled while waiting to retry
    Cancelled,
}

impl FetchErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited)
    }

    /// Skips never reach the network
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::RobotsDenied | Self::InvalidUrl)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::Permanent => "permanent",
            Self::InvalidUrl => "invalid_url",
            Self::RobotsDenied => "robots_denied",
            Self::Cancelled => "cancelled",
        }
    }

    /// Classifies a completed response that was not 2xx
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            500..=599 => Self::Transient,
            _ => Self::Permanent,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of fetching one URL
///
/// Self-contained and immutable once emitted.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL as it was dequeued
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    pub status_code: Option<u16>,
    pub is_success: bool,
    pub body: Option<Vec<u8>>,
    /// Lowercase header names
    pub headers: HashMap<String, String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub response_time_ms: u64,
    pub crawled_at: DateTime<Utc>,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub discovered_links: Vec<String>,
    pub image_urls: Vec<String>,
    pub error_message: Option<String>,
    pub error_kind: Option<FetchErrorKind>,
}

impl FetchResult {
    /// A failed result with no response attached
    pub fn failure(
        url: impl Into<String>,
        depth: u32,
        kind: FetchErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status_code: None,
            is_success: false,
            body: None,
            headers: HashMap::new(),
            content_type: None,
            content_length: None,
            response_time_ms: 0,
            crawled_at: Utc::now(),
            depth,
            parent_url: None,
            discovered_links: Vec::new(),
            image_urls: Vec::new(),
            error_message: Some(message.into()),
            error_kind: Some(kind),
        }
    }

    /// A skipped result for a URL robots.txt forbids
    pub fn robots_denied(url: impl Into<String>, depth: u32) -> Self {
        Self::failure(url, depth, FetchErrorKind::RobotsDenied, "Disallowed by robots.txt")
    }

    fn from_response(url: &str, depth: u32, response: TransportResponse, elapsed: Duration) -> Self {
        let is_success = response.is_success();
        let content_type = response.header("content-type").map(str::to_string);
        let content_length = response
            .header("content-length")
            .and_then(|v| v.trim().parse().ok())
            .or(Some(response.body.len() as u64));
        let (error_kind, error_message) = if is_success {
            (None, None)
        } else {
            (
                Some(FetchErrorKind::from_status(response.status_code)),
                Some(format!("HTTP {}", response.status_code)),
            )
        };

        Self {
            url: url.to_string(),
            final_url: response.final_url,
            status_code: Some(response.status_code),
            is_success,
            body: is_success.then_some(response.body),
            headers: response.headers,
            content_type,
            content_length,
            response_time_ms: elapsed.as_millis() as u64,
            crawled_at: Utc::now(),
            depth,
            parent_url: None,
            discovered_links: Vec::new(),
            image_urls: Vec::new(),
            error_message,
            error_kind,
        }
    }

    /// Attaches the page this URL was discovered on
    pub fn with_parent(mut self, parent_url: Option<String>) -> Self {
        self.parent_url = parent_url;
        self
    }

    /// True when the response declares an HTML body
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            })
            .unwrap_or(false)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Host of the final URL
    pub fn domain(&self) -> Option<String> {
        Url::parse(&self.final_url)
            .or_else(|_| Url::parse(&self.url))
            .ok()
            .and_then(|u| extract_domain(&u))
    }

    /// True for results that never reached the network
    pub fn is_skipped(&self) -> bool {
        self.error_kind.map(|k| k.is_skip()).unwrap_or(false)
    }
}

/// Dynamic renderer for pages that need script execution
///
/// The rendering engine itself lives outside this crate; implementors only
/// have to produce a [`FetchResult`] shaped like the HTTP path would.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Whether this URL should go through the renderer
    fn should_render(&self, _url: &Url) -> bool {
        true
    }

    async fn render(&self, url: &Url, depth: u32, options: &CrawlOptions) -> FetchResult;
}

/// Fetches pages with retries, backoff and `Retry-After` handling
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    renderer: Option<Arc<dyn Renderer>>,
    policy: RetryPolicy,
    options: Arc<CrawlOptions>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, options: Arc<CrawlOptions>) -> Self {
        Self {
            transport,
            renderer: None,
            policy: RetryPolicy::new(options.retry_budget),
            options,
        }
    }

    /// Routes eligible URLs through a dynamic renderer when
    /// `render_dynamic` is set
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL, retrying transient failures within the budget
    ///
    /// Cancellation interrupts backoff waits only; a request already on the
    /// wire completes.
    pub async fn fetch(&self, url: &str, depth: u32, cancel: &CancellationToken) -> FetchResult {
        let parsed = match Url::parse(url) {
            Ok(parsed) if is_crawlable_scheme(&parsed) => parsed,
            Ok(parsed) => {
                return FetchResult::failure(
                    url,
                    depth,
                    FetchErrorKind::InvalidUrl,
                    format!("Unsupported URL scheme: {}", parsed.scheme()),
                )
            }
            Err(e) => {
                return FetchResult::failure(
                    url,
                    depth,
                    FetchErrorKind::InvalidUrl,
                    format!("Invalid URL: {}", e),
                )
            }
        };

        if self.options.render_dynamic {
            if let Some(renderer) = self.renderer.as_ref().filter(|r| r.should_render(&parsed)) {
                debug!("Rendering {} dynamically", url);
                return renderer.render(&parsed, depth, &self.options).await;
            }
        }

        let headers = HashMap::from([
            ("user-agent".to_string(), self.options.user_agent.clone()),
            ("accept".to_string(), ACCEPT.to_string()),
        ]);
        let timeout = self.options.request_timeout();

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let outcome = self.transport.get(&parsed, &headers, timeout).await;
            let elapsed = started.elapsed();

            let (result, retry_after) = match outcome {
                Ok(response) => {
                    let retry_after = response.header("retry-after").map(str::to_string);
                    (
                        FetchResult::from_response(url, depth, response, elapsed),
                        retry_after,
                    )
                }
                Err(e) => (transport_failure(url, depth, &e, elapsed), None),
            };

            let Some(kind) = result.error_kind else {
                debug!("Fetched {} in {}ms", url, result.response_time_ms);
                return result;
            };

            if !self.policy.should_retry(kind, attempt) {
                if kind.is_retryable() {
                    warn!(
                        "Giving up on {} after {} attempts: {}",
                        url,
                        attempt + 1,
                        result.error_message.as_deref().unwrap_or("unknown error")
                    );
                } else {
                    debug!("Not retrying {} ({})", url, kind);
                }
                return result;
            }

            let delay = self
                .policy
                .retry_delay(kind, attempt, retry_after.as_deref());
            warn!(
                "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                attempt + 1,
                self.policy.max_attempts(),
                url,
                kind,
                delay
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Cancelled while backing off on {}", url);
                    let mut cancelled = result;
                    cancelled.error_kind = Some(FetchErrorKind::Cancelled);
                    return cancelled;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

fn transport_failure(url: &str, depth: u32, error: &TransportError, elapsed: Duration) -> FetchResult {
    let kind = if error.is_transient() {
        FetchErrorKind::Transient
    } else {
        FetchErrorKind::Permanent
    };
    let mut result = FetchResult::failure(url, depth, kind, error.to_string());
    result.response_time_ms = elapsed.as_millis() as u64;
    result
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("policy", &self.policy)
            .field("has_renderer", &self.renderer.is_some())
            .finish()
    }
}
