use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host, or `None` if the URL has no host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Builds the origin (`scheme://host[:port]`) of a URL
///
/// Robots.txt documents are cached per origin, so two URLs on the same host
/// but different ports or schemes get separate policies.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_harvest::url::origin_of;
///
/// let url = Url::parse("http://localhost:8080/file").unwrap();
/// assert_eq!(origin_of(&url), Some("http://localhost:8080".to_string()));
/// ```
pub fn origin_of(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Returns the lowercase path extension of a URL, if its last segment has one
pub fn path_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.last()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
