//! Shared crawl state: frontier, admission and rate limiting
//!
//! This module handles:
//! - Claiming frontier entries while tracking how many workers are busy
//! - Exactly-once admission by normalized URL
//! - Holding back deeper entries while a level is still in flight
//! - The page budget, reserved atomically before each fetch
//! - Global concurrency limiting via a semaphore
//! - Per-domain crawl-delay slots

use crate::config::CrawlOptions;
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::state::DomainState;
use crate::url::{normalize_key, UrlFilter};
use dashmap::DashSet;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

/// Longest an idle worker waits before looking at the frontier again
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Outcome of asking for the next entry
pub enum Claim<'a> {
    /// Work to do; the guard keeps the worker counted as active
    Entry(ActiveClaim<'a>, FrontierEntry),
    /// Frontier empty and no worker can add to it
    Exhausted,
    Cancelled,
}

/// Marks a worker as busy until dropped
///
/// Idle workers only give up once the frontier is empty *and* no claim is
/// outstanding, since an active worker may still enqueue discoveries.
pub struct ActiveClaim<'a> {
    scheduler: &'a Scheduler,
    depth: u32,
}

impl Drop for ActiveClaim<'_> {
    fn drop(&mut self) {
        {
            let mut in_flight = self.scheduler.lock_in_flight();
            if let Some(count) = in_flight.get_mut(&self.depth) {
                *count -= 1;
                if *count == 0 {
                    in_flight.remove(&self.depth);
                }
            }
            self.scheduler.active.fetch_sub(1, Ordering::SeqCst);
        }
        self.scheduler.notify.notify_waiters();
    }
}

/// Scheduler owns every piece of per-crawl mutable state
///
/// The scheduler coordinates:
/// - Global concurrency limits (one semaphore permit per fetch)
/// - The frontier, behind one lock shared by all workers
/// - The seen set, so each normalized URL is admitted once
/// - Claims in flight per depth, for frontiers that advance level by level
/// - The page budget
/// - Per-domain crawl-delay reservations
pub struct Scheduler {
    frontier: Mutex<Box<dyn Frontier>>,
    seen: DashSet<String>,
    in_flight: Mutex<BTreeMap<u32, usize>>,
    active: AtomicUsize,
    reserved: AtomicUsize,
    max_pages: usize,
    max_depth: u32,
    semaphore: Arc<Semaphore>,
    notify: Notify,
    domains: Mutex<HashMap<String, DomainState>>,
    filter: UrlFilter,
}

impl Scheduler {
    pub fn new(frontier: Box<dyn Frontier>, filter: UrlFilter, options: &CrawlOptions) -> Self {
        Self {
            frontier: Mutex::new(frontier),
            seen: DashSet::new(),
            in_flight: Mutex::new(BTreeMap::new()),
            active: AtomicUsize::new(0),
            reserved: AtomicUsize::new(0),
            max_pages: options.max_pages,
            max_depth: options.max_depth,
            semaphore: Arc::new(Semaphore::new(options.concurrency.max(1))),
            notify: Notify::new(),
            domains: Mutex::new(HashMap::new()),
            filter,
        }
    }

    fn lock_frontier(&self) -> MutexGuard<'_, Box<dyn Frontier>> {
        self.frontier.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, BTreeMap<u32, usize>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a depth-0 seed, bypassing the include/exclude filters
    ///
    /// Returns false for duplicates and URLs that cannot be crawled.
    pub fn seed(&self, url: &str) -> bool {
        let Some(key) = normalize_key(url) else {
            debug!("Ignoring uncrawlable seed {}", url);
            return false;
        };
        if !self.seen.insert(key) {
            trace!("Duplicate seed {}", url);
            return false;
        }
        self.lock_frontier().push(FrontierEntry::seed(url));
        true
    }

    /// Adds a depth-0 page taken from a listing such as a sitemap
    ///
    /// Unlike [`Scheduler::seed`] the page must pass the same filters as a
    /// discovered link.
    pub fn admit_listed(&self, url: &str) -> bool {
        if !self.admit(url) {
            return false;
        }
        self.lock_frontier().push(FrontierEntry::seed(url));
        true
    }

    /// Waits for a global concurrency slot
    ///
    /// Returns None when the crawl is cancelled first.
    pub async fn acquire_slot(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
        }
    }

    /// Takes the next entry, waiting while other workers may still add some
    pub async fn next_entry(&self, cancel: &CancellationToken) -> Claim<'_> {
        loop {
            if cancel.is_cancelled() {
                return Claim::Cancelled;
            }

            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut frontier = self.lock_frontier();
                let mut in_flight = self.lock_in_flight();

                // A shallower claim may still enqueue entries that belong
                // ahead of this level
                let held = frontier
                    .level_barrier()
                    .is_some_and(|depth| in_flight.range(..depth).next().is_some());

                if !held {
                    if let Some(entry) = frontier.pop() {
                        *in_flight.entry(entry.depth).or_default() += 1;
                        self.active.fetch_add(1, Ordering::SeqCst);
                        let claim = ActiveClaim {
                            scheduler: self,
                            depth: entry.depth,
                        };
                        return Claim::Entry(claim, entry);
                    }
                }
                if self.active.load(Ordering::SeqCst) == 0 {
                    return Claim::Exhausted;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Claim::Cancelled,
                _ = &mut notified => {}
                _ = tokio::time::sleep(IDLE_POLL) => {}
            }
        }
    }

    /// Reserves one page of the budget; false once `max_pages` is reached
    pub fn try_reserve_page(&self) -> bool {
        let max = self.max_pages;
        self.reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .is_ok()
    }

    fn budget_remaining(&self) -> bool {
        self.reserved.load(Ordering::SeqCst) < self.max_pages
    }

    /// Admits the links discovered on `parent` at `parent.depth + 1`
    ///
    /// Links beyond `max_depth`, outside the filters, or already seen are
    /// dropped. Returns how many were pushed.
    pub fn enqueue_children(&self, parent: &FrontierEntry, links: &[String]) -> usize {
        let depth = parent.depth + 1;
        if depth > self.max_depth {
            trace!("Not following links of {}: depth {} > {}", parent.url, depth, self.max_depth);
            return 0;
        }
        if !self.budget_remaining() {
            return 0;
        }

        let mut frontier = self.lock_frontier();
        if !frontier.accepts_discoveries() {
            return 0;
        }

        let children: Vec<FrontierEntry> = links
            .iter()
            .filter(|link| self.admit(link))
            .map(|link| FrontierEntry::child(link.as_str(), parent))
            .collect();
        let count = children.len();

        if count > 0 {
            frontier.push_children(Some(parent), children);
            drop(frontier);
            self.notify.notify_waiters();
        }

        debug!(
            "Queued {} of {} links from {} at depth {}",
            count,
            links.len(),
            parent.url,
            depth
        );
        count
    }

    fn admit(&self, link: &str) -> bool {
        let Ok(url) = Url::parse(link) else {
            return false;
        };
        if let Err(rejection) = self.filter.check(&url) {
            trace!("Rejected {}: {:?}", link, rejection);
            return false;
        }
        match normalize_key(link) {
            Some(key) => self.seen.insert(key),
            None => false,
        }
    }

    /// Reserves the next request slot for a domain and returns the wait
    pub fn reserve_domain_slot(&self, domain: &str, delay: Duration) -> Duration {
        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains
            .entry(domain.to_string())
            .or_default()
            .reserve_slot(delay, Instant::now())
    }

    /// Entries waiting in the frontier
    pub fn pending(&self) -> usize {
        self.lock_frontier().len()
    }

    /// Normalized URLs admitted so far, seeds included
    pub fn admitted_count(&self) -> usize {
        self.seen.len()
    }

    pub fn pages_reserved(&self) -> usize {
        self.reserved.load(Ordering::SeqCst)
    }

    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn frontier_name(&self) -> &'static str {
        self.lock_frontier().name()
    }
}
