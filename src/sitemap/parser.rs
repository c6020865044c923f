//! Sitemap XML parsing
//!
//! Handles both `<urlset>` and `<sitemapindex>` documents. Only elements in
//! the sitemap namespace (or with no namespace at all) count, so extension
//! elements such as `<image:loc>` never leak into the result.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Namespace declared by conforming sitemaps
pub const SITEMAP_NAMESPACE: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

/// One `<loc>` found in a sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapEntry {
    /// A page listed in a `<urlset>`
    Url(String),
    /// A child sitemap listed in a `<sitemapindex>`
    Sitemap(String),
}

#[derive(Debug, Error)]
pub enum SitemapParseError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("document ended inside <{0}>")]
    Unclosed(String),
}

#[derive(Debug)]
struct OpenElement {
    name: String,
    in_sitemap_ns: bool,
}

/// Parses a sitemap or sitemap index
///
/// # Errors
///
/// Returns an error for malformed XML, including documents that end with
/// elements still open. Callers fall back to [`extract_locs_fallback`].
pub fn parse_sitemap(xml: &str) -> Result<Vec<SitemapEntry>, SitemapParseError> {
    let mut reader = NsReader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut entries = Vec::new();
    let mut loc = String::new();

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(e)) => {
                stack.push(OpenElement {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase(),
                    in_sitemap_ns: is_sitemap_namespace(&ns),
                });
                loc.clear();
            }
            (_, Event::Text(e)) => {
                if in_loc(&stack) {
                    loc.push_str(&e.unescape()?);
                }
            }
            (_, Event::CData(e)) => {
                if in_loc(&stack) {
                    loc.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            (_, Event::End(_)) => {
                if in_loc(&stack) {
                    let value = loc.trim();
                    if !value.is_empty() {
                        let parent = &stack[stack.len() - 2].name;
                        entries.push(if parent == "sitemap" {
                            SitemapEntry::Sitemap(value.to_string())
                        } else {
                            SitemapEntry::Url(value.to_string())
                        });
                    }
                    loc.clear();
                }
                stack.pop();
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(SitemapParseError::Unclosed(open.name));
    }

    Ok(entries)
}

fn is_sitemap_namespace(ns: &ResolveResult) -> bool {
    match ns {
        ResolveResult::Unbound => true,
        ResolveResult::Bound(Namespace(uri)) => *uri == SITEMAP_NAMESPACE,
        ResolveResult::Unknown(_) => false,
    }
}

/// True when the innermost open element is a sitemap `<loc>` directly under
/// a sitemap `<url>` or `<sitemap>`
fn in_loc(stack: &[OpenElement]) -> bool {
    let [.., parent, current] = stack else {
        return false;
    };
    current.name == "loc"
        && current.in_sitemap_ns
        && parent.in_sitemap_ns
        && (parent.name == "url" || parent.name == "sitemap")
}

fn loc_regex() -> Option<&'static Regex> {
    static LOC: OnceLock<Option<Regex>> = OnceLock::new();
    LOC.get_or_init(|| {
        Regex::new(r"(?is)<loc>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</loc>").ok()
    })
    .as_ref()
}

/// Collects every `<loc>` value with a regular expression
///
/// Used when the document is not well-formed. If the text looks like a
/// sitemap index every value is treated as a child sitemap.
pub fn extract_locs_fallback(text: &str) -> Vec<SitemapEntry> {
    let Some(loc) = loc_regex() else {
        return Vec::new();
    };
    let is_index = text.to_ascii_lowercase().contains("<sitemapindex");

    loc.captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| {
            let raw = m.as_str().trim();
            quick_xml::escape::unescape(raw)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        })
        .filter(|value| !value.is_empty())
        .map(|value| {
            if is_index {
                SitemapEntry::Sitemap(value)
            } else {
                SitemapEntry::Url(value)
            }
        })
        .collect()
}
