//! Configuration module for Sumi-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlOptions, OutputConfig, UserAgentConfig, DEFAULT_CONCURRENCY,
    DEFAULT_EXCLUDED_EXTENSIONS, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAGES, DEFAULT_RETRY_BUDGET,
};

pub use parser::{
    compute_config_hash, config_digest, load_config, load_config_with_hash, parse_config,
};
pub use validation::{validate_domain_pattern, validate_options};
