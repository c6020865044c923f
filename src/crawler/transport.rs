//! HTTP transport seam
//!
//! Everything that touches the network (page fetches, robots.txt, sitemaps)
//! goes through [`HttpTransport`], so tests can swap in a double and the
//! engine never depends on reqwest directly.

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed by the default transport
pub const MAX_REDIRECTS: usize = 10;

/// A completed HTTP exchange, whatever its status code
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status_code: u16,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// URL after redirects
    pub final_url: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure to complete an HTTP exchange
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("invalid request: {0}")]
    Invalid(String),
}

impl TransportError {
    /// Returns true for failures worth retrying
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let message = e.to_string();
        if e.is_timeout() {
            Self::Timeout(message)
        } else if e.is_connect() {
            Self::Connect(message)
        } else if e.is_redirect() || e.is_builder() {
            Self::Invalid(message)
        } else if e.is_body() || e.is_decode() {
            Self::Body(message)
        } else {
            Self::Request(message)
        }
    }
}

/// Issues GET requests on behalf of the engine
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs a GET and returns the response for any status code
    async fn get(
        &self,
        url: &Url,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - Value sent in the User-Agent header
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::crawler::build_http_client;
///
/// let client = build_http_client("HarvestBot/1.0 (+https://example.com/about)").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Default transport backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent)?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url.clone()).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status_code,
            headers,
            body,
            final_url,
        })
    }
}
