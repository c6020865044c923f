//! Output module for crawl statistics and reports
//!
//! This module handles:
//! - Recording crawl statistics as results are emitted
//! - Printing statistics to the terminal
//! - Generating markdown summaries of a crawl

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary, RunInfo};
pub use stats::{print_statistics, CrawlStatistics, StatisticsCollector};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
