//! Admission filters applied to every discovered link
//!
//! A link is admitted only when it is http(s), its host is inside the
//! configured domain scope, no exclude pattern matches, at least one include
//! pattern matches (when any are configured), and its path extension is not
//! on the excluded list.

use crate::config::CrawlOptions;
use crate::url::domain::{extract_domain, path_extension};
use crate::url::matcher::matches_any;
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Why a URL was turned away by the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRejection {
    /// Scheme other than http/https
    UnsupportedScheme(String),
    /// Host outside the allowed domain scope
    OutOfScope(String),
    /// Matched one of the exclude patterns
    Excluded(String),
    /// No include pattern matched
    NotIncluded,
    /// Path extension is on the excluded list
    ExcludedExtension(String),
}

/// Compiled URL admission rules
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    excluded_extensions: HashSet<String>,
    allowed_domains: Vec<String>,
}

impl UrlFilter {
    /// Compiles a filter from raw pattern lists
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if any regular expression fails
    /// to compile.
    pub fn new(
        include_patterns: &[String],
        exclude_patterns: &[String],
        excluded_extensions: &[String],
        allowed_domains: &[String],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_all(include_patterns)?,
            exclude: compile_all(exclude_patterns)?,
            excluded_extensions: excluded_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            allowed_domains: allowed_domains.to_vec(),
        })
    }

    /// Compiles a filter from crawl options
    pub fn from_options(options: &CrawlOptions) -> Result<Self, ConfigError> {
        Self::new(
            &options.include_patterns,
            &options.exclude_patterns,
            &options.excluded_extensions,
            &options.allowed_domains,
        )
    }

    /// Checks a URL against every rule, returning the first rejection
    pub fn check(&self, url: &Url) -> Result<(), FilterRejection> {
        if !is_crawlable_scheme(url) {
            return Err(FilterRejection::UnsupportedScheme(url.scheme().to_string()));
        }

        let host = extract_domain(url).unwrap_or_default();
        if !matches_any(&self.allowed_domains, &host) {
            return Err(FilterRejection::OutOfScope(host));
        }

        let candidate = url.as_str();
        if let Some(pattern) = self.exclude.iter().find(|re| re.is_match(candidate)) {
            return Err(FilterRejection::Excluded(pattern.as_str().to_string()));
        }

        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(candidate)) {
            return Err(FilterRejection::NotIncluded);
        }

        if let Some(ext) = path_extension(url) {
            if self.excluded_extensions.contains(&ext) {
                return Err(FilterRejection::ExcludedExtension(ext));
            }
        }

        Ok(())
    }

    /// Returns true if the URL passes every rule
    pub fn accepts(&self, url: &Url) -> bool {
        self.check(url).is_ok()
    }

    /// Parses and checks a raw URL string
    pub fn accepts_str(&self, url: &str) -> bool {
        Url::parse(url).map(|u| self.accepts(&u)).unwrap_or(false)
    }
}

/// Returns true for http and https URLs with a host
pub fn is_crawlable_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
        })
        .collect()
}
