use crate::UrlError;
use url::Url;

/// List of tracking query parameters dropped from deduplication keys
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes a URL into its canonical form for deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not http:// or https://
/// 3. Lowercase scheme and host
/// 4. Drop the port when it is the scheme default (80 / 443)
/// 5. Normalize path:
///    - Collapse repeated slashes
///    - Remove dot segments (. and ..)
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 6. Remove fragment (everything after #)
/// 7. Remove tracking query parameters and sort the rest
/// 8. Remove empty query string (trailing ?)
///
/// The normalized form is a dedup key. The crawler still fetches the URL as
/// it was discovered.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/docs/#intro").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/docs");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // The url crate already lowercases the scheme; hosts with IDNA get
    // lowercased here as well so "Example.COM" and "example.com" collide.
    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    if url.port().is_some() && url.port() == default_port(url.scheme()) {
        url.set_port(None)
            .map_err(|_| UrlError::Malformed("Failed to clear default port".to_string()))?;
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            // Re-encode so a decoded '&' or '=' cannot split a value
            url.query_pairs_mut().clear().extend_pairs(&params);
        }
    }

    Ok(url)
}

/// Returns the normalized string key for a URL, or `None` if it can't be crawled
pub fn normalize_key(url_str: &str) -> Option<String> {
    normalize_url(url_str).ok().map(|u| u.to_string())
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
