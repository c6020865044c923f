//! URL handling module for Sumi-Harvest
//!
//! This module provides URL normalization (dedup keys), domain and origin
//! extraction, domain-scope wildcard matching, and link admission filters.

mod domain;
mod filter;
mod matcher;
mod normalize;

pub use domain::{extract_domain, origin_of, path_extension};
pub use filter::{is_crawlable_scheme, FilterRejection, UrlFilter};
pub use matcher::{matches_any, matches_wildcard};
pub use normalize::{normalize_key, normalize_url};
