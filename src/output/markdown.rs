//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of a crawl,
//! including statistics, status codes, error kinds and the busiest domains.

use crate::output::stats::CrawlStatistics;
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// How many domains the summary lists
const TOP_DOMAINS: usize = 20;

/// Facts about a crawl run that the statistics don't carry
#[derive(Debug, Clone, Default)]
pub struct RunInfo {
    pub strategy: String,
    pub seeds: Vec<String>,
    pub config_hash: Option<String>,
    /// Final phase of the crawl (`completed`, `cancelled`, ...)
    pub status: String,
}

/// Generates a markdown summary and writes it to `output_path`
///
/// # Arguments
///
/// * `stats` - Final crawl statistics
/// * `run` - Run metadata
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(
    stats: &CrawlStatistics,
    run: &RunInfo,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(stats, run);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats crawl statistics as markdown
pub fn format_markdown_summary(stats: &CrawlStatistics, run: &RunInfo) -> String {
    let mut md = String::new();

    md.push_str("# Sumi-Harvest Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Strategy**: {}\n", run.strategy));
    md.push_str(&format!("- **Started**: {}\n", stats.start_time.to_rfc3339()));
    md.push_str(&format!(
        "- **Last Updated**: {}\n",
        stats.last_updated.to_rfc3339()
    ));
    let duration = (stats.last_updated - stats.start_time).num_seconds();
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        duration,
        duration as f64 / 60.0
    ));
    if !run.status.is_empty() {
        md.push_str(&format!("- **Status**: {}\n", run.status));
    }
    if let Some(hash) = &run.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    if !run.seeds.is_empty() {
        md.push_str("## Seeds\n\n");
        for seed in &run.seeds {
            md.push_str(&format!("- {}\n", seed));
        }
        md.push('\n');
    }

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Total Requests**: {}\n", stats.total_requests));
    md.push_str(&format!("- **Successful**: {}\n", stats.successful_requests));
    md.push_str(&format!("- **Failed**: {}\n", stats.failed_requests));
    md.push_str(&format!("- **Skipped**: {}\n", stats.skipped_requests));
    md.push_str(&format!("- **Unique Domains**: {}\n", stats.unique_domains()));
    md.push_str(&format!("- **Links Found**: {}\n", stats.total_links));
    md.push_str(&format!(
        "- **Average Response Time**: {:.1} ms\n",
        stats.average_response_time_ms
    ));
    md.push_str(&format!(
        "- **Requests/sec**: {:.2}\n",
        stats.requests_per_second
    ));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n\n", stats.success_rate()));

    if !stats.status_code_distribution.is_empty() {
        md.push_str("## Status Codes\n\n");
        md.push_str("| Status | Count |\n");
        md.push_str("|--------|-------|\n");

        let mut codes: Vec<_> = stats.status_code_distribution.iter().collect();
        codes.sort_by_key(|(code, _)| **code);
        for (code, count) in codes {
            md.push_str(&format!("| {} | {} |\n", code, count));
        }
        md.push('\n');
    }

    if !stats.errors_by_kind.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error Type | Count |\n");
        md.push_str("|------------|-------|\n");

        let mut errors: Vec<_> = stats.errors_by_kind.iter().collect();
        errors.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        for (kind, count) in errors {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    if !stats.requests_by_domain.is_empty() {
        md.push_str(&format!("## Top {} Domains\n\n", TOP_DOMAINS));
        md.push_str("| Domain | Requests |\n");
        md.push_str("|--------|----------|\n");

        let mut domains: Vec<_> = stats.requests_by_domain.iter().collect();
        domains.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (domain, count) in domains.iter().take(TOP_DOMAINS) {
            md.push_str(&format!("| {} | {} |\n", domain, count));
        }
        if domains.len() > TOP_DOMAINS {
            md.push_str(&format!(
                "\n... and {} more\n",
                domains.len() - TOP_DOMAINS
            ));
        }
        md.push('\n');
    }

    md
}
