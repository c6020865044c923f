//! HTML link extraction
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from <a> tags and canonical links)
//! - Image references, when requested
//! - Page title

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Everything pulled out of one HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLinks {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Absolute http(s) links, fragment-free, in document order, deduplicated
    pub links: Vec<String>,

    /// Absolute image URLs, empty unless images were requested
    pub images: Vec<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// Relative references resolve against `<base href>` when the document
/// declares one, otherwise against `base_url`. `rel="nofollow"` links are
/// followed.
///
/// # Example
///
/// ```
/// use sumi_harvest::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page#top">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let extracted = extract_links(html, &base_url, false);
/// assert_eq!(extracted.title, Some("Test".to_string()));
/// assert_eq!(extracted.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn extract_links(html: &str, base_url: &Url, include_images: bool) -> ExtractedLinks {
    let document = Html::parse_document(html);
    let base = document_base(&document, base_url);

    let mut links = Dedup::default();
    for href in attr_values(&document, "a[href]", "href", |el| {
        el.value().attr("download").is_none()
    }) {
        links.push(resolve_link(href, &base));
    }
    for href in attr_values(&document, "link[rel='canonical'][href]", "href", |_| true) {
        links.push(resolve_link(href, &base));
    }

    let mut images = Dedup::default();
    if include_images {
        for src in attr_values(&document, "img[src]", "src", |_| true) {
            images.push(resolve_link(src, &base));
        }
        for src in attr_values(&document, "img[data-src]", "data-src", |_| true) {
            images.push(resolve_link(src, &base));
        }
    }

    ExtractedLinks {
        title: extract_title(&document),
        links: links.into_vec(),
        images: images.into_vec(),
    }
}

/// Order-preserving set of URLs
#[derive(Default)]
struct Dedup {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl Dedup {
    fn push(&mut self, url: Option<String>) {
        if let Some(url) = url {
            if self.seen.insert(url.clone()) {
                self.items.push(url);
            }
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}

fn attr_values<'a>(
    document: &'a Html,
    selector: &str,
    attr: &'a str,
    keep: impl Fn(&scraper::ElementRef<'a>) -> bool + 'a,
) -> Vec<&'a str> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter(|el| keep(el))
        .filter_map(|el| el.value().attr(attr))
        .collect()
}

/// The effective base for relative links: `<base href>` if present and valid
fn document_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url.to_string())
}
