//! Crawl coordinator - worker pool orchestration
//!
//! This module runs one crawl:
//! - Seeding the frontier and moving the crawl through its phases
//! - Spawning `concurrency` workers that claim, fetch and expand entries
//! - Enforcing robots.txt, crawl delays and the page budget
//! - Streaming every [`FetchResult`] through a bounded channel
//! - Cooperative cancellation

use crate::config::{validate_options, CrawlOptions};
use crate::crawler::fetcher::{FetchErrorKind, FetchResult};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::parser::ExtractedLinks;
use crate::crawler::scheduler::{Claim, Scheduler};
use crate::output::{CrawlStatistics, StatisticsCollector};
use crate::state::{CrawlPhase, PhaseTracker};
use crate::url::{extract_domain, is_crawlable_scheme, UrlFilter};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Results between progress log lines
const PROGRESS_INTERVAL: u64 = 10;

/// Capabilities a worker needs from the crawling engine
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Fetches one URL; failures are reported in the result
    async fn fetch(&self, url: &str, depth: u32, cancel: &CancellationToken) -> FetchResult;

    /// Pulls follow-up links out of a fetched page
    fn extract_links(&self, html: &str, base_url: &Url) -> ExtractedLinks;

    /// Whether robots.txt lets us fetch this URL
    async fn is_allowed(&self, url: &Url) -> bool;

    /// Minimum spacing the URL's host asks for
    async fn crawl_delay(&self, _url: &Url) -> Option<Duration> {
        None
    }
}

/// Drives one crawl over an injected frontier
pub struct Coordinator {
    crawler: Arc<dyn Crawler>,
    options: Arc<CrawlOptions>,
    filter: UrlFilter,
    frontier: Box<dyn Frontier>,
    listed: Vec<String>,
}

impl Coordinator {
    pub fn new(
        crawler: Arc<dyn Crawler>,
        options: Arc<CrawlOptions>,
        filter: UrlFilter,
        frontier: Box<dyn Frontier>,
    ) -> Self {
        Self {
            crawler,
            options,
            filter,
            frontier,
            listed: Vec::new(),
        }
    }

    /// Adds depth-0 pages from a listing such as a sitemap
    ///
    /// Listed pages go through the include/exclude, extension and domain
    /// filters; pages that fail them are dropped without a result.
    pub fn with_listed_pages(mut self, pages: Vec<String>) -> Self {
        self.listed = pages;
        self
    }

    /// Starts the crawl and returns immediately
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails before any network activity if there are neither seeds nor
    /// listed pages, a seed is not an absolute http(s) URL, or the options
    /// are invalid.
    pub fn start(self, seeds: Vec<String>) -> Result<CrawlHandle> {
        self.start_with_token(seeds, CancellationToken::new())
    }

    /// Like [`Coordinator::start`], cancelled through a caller-owned token
    pub fn start_with_token(self, seeds: Vec<String>, cancel: CancellationToken) -> Result<CrawlHandle> {
        validate_options(&self.options)?;
        if seeds.is_empty() && self.listed.is_empty() {
            return Err(HarvestError::NoSeeds);
        }
        for seed in &seeds {
            check_seed(seed)?;
        }

        let frontier_name = self.frontier.name();
        let scheduler = Arc::new(Scheduler::new(self.frontier, self.filter, &self.options));
        let seeded = seeds.iter().filter(|seed| scheduler.seed(seed)).count();
        let listed = self
            .listed
            .iter()
            .filter(|page| scheduler.admit_listed(page))
            .count();
        if listed < self.listed.len() {
            debug!(
                "Admitted {} of {} listed pages",
                listed,
                self.listed.len()
            );
        }

        let phase = Arc::new(PhaseTracker::new());
        phase.advance(CrawlPhase::Running)?;

        let stats = Arc::new(StatisticsCollector::new());
        let (tx, results) = mpsc::channel(self.options.result_buffer.max(1));

        info!(
            "Starting {} crawl: {} seeds, {} workers, max depth {}, max pages {}",
            frontier_name,
            seeded + listed,
            self.options.concurrency,
            self.options.max_depth,
            self.options.max_pages
        );

        let context = Arc::new(WorkerContext {
            crawler: self.crawler,
            options: self.options,
            scheduler,
            stats: Arc::clone(&stats),
            phase: Arc::clone(&phase),
            cancel: cancel.clone(),
            tx,
        });
        let supervisor = tokio::spawn(supervise(context));

        Ok(CrawlHandle {
            results,
            supervisor,
            cancel,
            stats,
            phase,
        })
    }
}

pub(crate) fn check_seed(seed: &str) -> Result<()> {
    let url = Url::parse(seed).map_err(|e| HarvestError::InvalidSeed {
        url: seed.to_string(),
        reason: e.to_string(),
    })?;
    if !is_crawlable_scheme(&url) {
        return Err(HarvestError::InvalidSeed {
            url: seed.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

struct WorkerContext {
    crawler: Arc<dyn Crawler>,
    options: Arc<CrawlOptions>,
    scheduler: Arc<Scheduler>,
    stats: Arc<StatisticsCollector>,
    phase: Arc<PhaseTracker>,
    cancel: CancellationToken,
    tx: mpsc::Sender<FetchResult>,
}

async fn supervise(context: Arc<WorkerContext>) -> CrawlStatistics {
    let stats = Arc::clone(&context.stats);
    let phase = Arc::clone(&context.phase);
    let cancel = context.cancel.clone();
    let scheduler = Arc::clone(&context.scheduler);

    let mut workers = JoinSet::new();
    for id in 0..context.options.concurrency {
        workers.spawn(run_worker(Arc::clone(&context), id));
    }
    // The channel closes once the last worker lets go of its sender
    drop(context);

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!("Crawl worker failed: {}", e);
        }
    }

    if cancel.is_cancelled() {
        if phase.advance_if(CrawlPhase::Running, CrawlPhase::Cancelled) {
            debug!("Crawl cancelled while running");
        }
        phase.advance_if(CrawlPhase::Draining, CrawlPhase::Cancelled);
    } else {
        phase.advance_if(CrawlPhase::Running, CrawlPhase::Draining);
    }
    if let Err(e) = phase.advance(CrawlPhase::Completed) {
        warn!("{}", e);
    }

    let snapshot = stats.snapshot();
    info!(
        "Crawl finished: {} requests ({} ok, {} failed, {} skipped), {} admitted, {} still queued",
        snapshot.total_requests,
        snapshot.successful_requests,
        snapshot.failed_requests,
        snapshot.skipped_requests,
        scheduler.admitted_count(),
        scheduler.pending()
    );
    snapshot
}

async fn run_worker(context: Arc<WorkerContext>, id: usize) {
    let scheduler = &context.scheduler;
    let cancel = &context.cancel;
    trace!("Worker {} started", id);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let Some(permit) = scheduler.acquire_slot(cancel).await else {
            break;
        };

        let (claim, entry) = match scheduler.next_entry(cancel).await {
            Claim::Entry(claim, entry) => (claim, entry),
            Claim::Exhausted => {
                debug!("Worker {}: frontier exhausted", id);
                break;
            }
            Claim::Cancelled => break,
        };

        if !scheduler.try_reserve_page() {
            if context.phase.advance_if(CrawlPhase::Running, CrawlPhase::Draining) {
                info!(
                    "Page budget of {} reached, draining",
                    context.options.max_pages
                );
            }
            break;
        }

        let result = process_entry(&context, &entry).await;
        context.stats.record(&result);
        log_progress(&context);

        if context.tx.send(result).await.is_err() {
            debug!("Result receiver dropped, cancelling crawl");
            cancel.cancel();
            break;
        }

        drop(claim);
        drop(permit);

        let delay = context.options.delay_between_fetches();
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    trace!("Worker {} stopped", id);
}

async fn process_entry(context: &WorkerContext, entry: &FrontierEntry) -> FetchResult {
    let crawler = &context.crawler;
    let options = &context.options;

    let url = match Url::parse(&entry.url) {
        Ok(url) => url,
        Err(e) => {
            return FetchResult::failure(
                entry.url.as_str(),
                entry.depth,
                FetchErrorKind::InvalidUrl,
                format!("Invalid URL: {}", e),
            )
            .with_parent(entry.parent_url.clone())
        }
    };

    if options.respect_robots_txt {
        if !crawler.is_allowed(&url).await {
            debug!("Skipping {}: disallowed by robots.txt", url);
            return FetchResult::robots_denied(entry.url.as_str(), entry.depth)
                .with_parent(entry.parent_url.clone());
        }

        if let Some(delay) = crawler.crawl_delay(&url).await {
            let domain = extract_domain(&url).unwrap_or_default();
            let wait = context.scheduler.reserve_domain_slot(&domain, delay);
            if !wait.is_zero() {
                trace!("Waiting {:?} for crawl-delay slot on {}", wait, domain);
                tokio::select! {
                    _ = context.cancel.cancelled() => {
                        return FetchResult::failure(
                            entry.url.as_str(),
                            entry.depth,
                            FetchErrorKind::Cancelled,
                            "Crawl cancelled before fetch",
                        )
                        .with_parent(entry.parent_url.clone());
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }
    }

    let mut result = crawler
        .fetch(&entry.url, entry.depth, &context.cancel)
        .await
        .with_parent(entry.parent_url.clone());

    if result.is_success && result.is_html() {
        if let Some(html) = result.body_text() {
            let base = Url::parse(&result.final_url).unwrap_or(url);
            let extracted = crawler.extract_links(&html, &base);
            context.scheduler.enqueue_children(entry, &extracted.links);
            result.discovered_links = extracted.links;
            result.image_urls = extracted.images;
        }
    }

    result
}

fn log_progress(context: &WorkerContext) {
    let snapshot = context.stats.snapshot();
    let done = snapshot.total_results();
    if done > 0 && done % PROGRESS_INTERVAL == 0 {
        info!(
            "Progress: {} results, {} in frontier, {} active, {:.2} req/sec",
            done,
            context.scheduler.pending(),
            context.scheduler.active_workers(),
            snapshot.requests_per_second
        );
    }
}

/// A running crawl
///
/// Results arrive on `results` as they are produced. The bounded channel
/// applies backpressure: workers stall while it is full.
pub struct CrawlHandle {
    pub results: mpsc::Receiver<FetchResult>,
    supervisor: JoinHandle<CrawlStatistics>,
    cancel: CancellationToken,
    stats: Arc<StatisticsCollector>,
    phase: Arc<PhaseTracker>,
}

impl CrawlHandle {
    /// Next result, or None once the crawl is over
    pub async fn next_result(&mut self) -> Option<FetchResult> {
        self.results.recv().await
    }

    /// Stops dequeuing new work; in-flight fetches finish and are emitted
    pub fn cancel(&self) {
        if self.phase.advance_if(CrawlPhase::Running, CrawlPhase::Cancelled)
            || self.phase.advance_if(CrawlPhase::Draining, CrawlPhase::Cancelled)
        {
            info!("Crawl cancellation requested");
        }
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Statistics so far
    pub fn statistics(&self) -> CrawlStatistics {
        self.stats.snapshot()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase.current()
    }

    /// Discards remaining results and waits for the crawl to finish
    pub async fn join(mut self) -> Result<CrawlStatistics> {
        while self.results.recv().await.is_some() {}
        self.supervisor
            .await
            .map_err(|e| HarvestError::Worker(e.to_string()))
    }

    /// Gathers every result and the final statistics
    pub async fn collect(mut self) -> Result<(Vec<FetchResult>, CrawlStatistics)> {
        let mut results = Vec::new();
        while let Some(result) = self.results.recv().await {
            results.push(result);
        }
        let stats = self
            .supervisor
            .await
            .map_err(|e| HarvestError::Worker(e.to_string()))?;
        Ok((results, stats))
    }

    /// Turns the handle into a stream of results
    ///
    /// The crawl keeps running in the background; dropping the stream
    /// cancels it.
    pub fn into_stream(self) -> ReceiverStream<FetchResult> {
        ReceiverStream::new(self.results)
    }
}
