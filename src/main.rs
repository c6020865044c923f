//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest crawling engine.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::crawler::{CrawlStrategy, Engine};
use sumi_harvest::output::{generate_markdown_summary, print_statistics, RunInfo};
use sumi_harvest::{CrawlPhase, FetchResult};
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a concurrent crawling engine for web ingestion
///
/// Sumi-Harvest crawls websites breadth-first, depth-first, by priority or
/// from their sitemaps, while respecting robots.txt, crawl delays and
/// server rate limits.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version)]
#[command(about = "A concurrent crawling engine for web ingestion", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Traversal strategy: bfs, dfs, priority or sitemap (overrides the config)
    #[arg(short, long, value_parser = parse_strategy)]
    strategy: Option<CrawlStrategy>,

    /// Seed URL; repeatable, replaces the seeds from the config
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

fn parse_strategy(value: &str) -> Result<CrawlStrategy, String> {
    value.parse()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).with_context(|| format!("loading {}", cli.config.display()));
        }
    };

    let strategy = cli.strategy.unwrap_or(config.strategy);
    let seeds = if cli.seeds.is_empty() {
        config.seeds.clone()
    } else {
        cli.seeds.clone()
    };
    if seeds.is_empty() {
        bail!("no seed URLs: add `seeds = [...]` to the config or pass --seed");
    }

    if cli.dry_run {
        handle_dry_run(&config, strategy, &seeds);
        return Ok(());
    }

    handle_crawl(&config, strategy, seeds, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config, strategy: CrawlStrategy, seeds: &[String]) {
    let options = config.crawl_options();

    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Strategy: {}", strategy);
    println!("  Max depth: {}", options.max_depth);
    println!("  Max pages: {}", options.max_pages);
    println!("  Concurrency: {}", options.concurrency);
    println!(
        "  Delay between fetches: {}ms",
        options.delay_between_fetches_ms
    );
    println!("  Retry budget: {}", options.retry_budget);
    println!("  Request timeout: {}s", options.request_timeout_secs);
    println!("  Respect robots.txt: {}", options.respect_robots_txt);
    println!("  User agent: {}", options.user_agent);

    if !options.allowed_domains.is_empty() {
        println!("\nAllowed Domains ({}):", options.allowed_domains.len());
        for domain in &options.allowed_domains {
            println!("  - {}", domain);
        }
    }
    if !options.include_patterns.is_empty() {
        println!("\nInclude Patterns:");
        for pattern in &options.include_patterns {
            println!("  - {}", pattern);
        }
    }
    if !options.exclude_patterns.is_empty() {
        println!("\nExclude Patterns:");
        for pattern in &options.exclude_patterns {
            println!("  - {}", pattern);
        }
    }

    println!("\nOutput:");
    match &config.output.summary_path {
        Some(path) => println!("  Summary: {}", path),
        None => println!("  Summary: (none)"),
    }

    println!("\nSeeds ({}):", seeds.len());
    for seed in seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", seeds.len());
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    strategy: CrawlStrategy,
    seeds: Vec<String>,
    config_hash: String,
) -> anyhow::Result<()> {
    let engine = Engine::new(config.crawl_options())
        .context("building crawl engine")?
        .with_importance(config.importance.clone());

    let mut handle = engine
        .start(strategy, seeds.clone())
        .await
        .context("starting crawl")?;

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            token.cancel();
        }
    });

    while let Some(result) = handle.next_result().await {
        log_result(&result);
    }

    let cancelled = handle.cancellation_token().is_cancelled();
    let stats = handle.join().await.context("waiting for crawl workers")?;

    println!();
    print_statistics(&stats);

    if let Some(path) = &config.output.summary_path {
        let run = RunInfo {
            strategy: strategy.to_string(),
            seeds,
            config_hash: Some(config_hash),
            status: if cancelled {
                CrawlPhase::Cancelled.to_string()
            } else {
                CrawlPhase::Completed.to_string()
            },
        };
        generate_markdown_summary(&stats, &run, Path::new(path))
            .with_context(|| format!("writing summary to {}", path))?;
        println!("\n✓ Summary written to: {}", path);
    }

    Ok(())
}

fn log_result(result: &FetchResult) {
    match (result.is_success, result.error_kind) {
        (true, _) => tracing::info!(
            "[{}] {} (depth {}, {}ms, {} links)",
            result.status_code.unwrap_or_default(),
            result.url,
            result.depth,
            result.response_time_ms,
            result.discovered_links.len()
        ),
        (false, Some(kind)) if kind.is_skip() => {
            tracing::debug!("[skip] {} ({})", result.url, kind)
        }
        (false, kind) => tracing::warn!(
            "[{}] {} failed: {}",
            kind.map(|k| k.as_str()).unwrap_or("error"),
            result.url,
            result.error_message.as_deref().unwrap_or("unknown error")
        ),
    }
}
