//! Frontier implementations, one per traversal discipline
//!
//! A frontier only orders work. Admission (seen set, depth, budget,
//! filters) happens in the scheduler before anything is pushed.

use crate::url::normalize_key;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    /// Link distance from the seeds (seeds are 0)
    pub depth: u32,
    pub parent_url: Option<String>,
    /// Higher is more important; only the priority frontier looks at it
    pub priority: i64,
}

impl FrontierEntry {
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
            parent_url: None,
            priority: 0,
        }
    }

    pub fn child(url: impl Into<String>, parent: &FrontierEntry) -> Self {
        Self {
            url: url.into(),
            depth: parent.depth + 1,
            parent_url: Some(parent.url.clone()),
            priority: 0,
        }
    }
}

/// Ordering strategy for pending entries
pub trait Frontier: Send {
    fn push(&mut self, entry: FrontierEntry);

    /// Pushes the accepted discoveries of one page
    fn push_children(&mut self, parent: Option<&FrontierEntry>, children: Vec<FrontierEntry>) {
        let _ = parent;
        for child in children {
            self.push(child);
        }
    }

    fn pop(&mut self) -> Option<FrontierEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// False for disciplines that only crawl a pre-resolved list
    fn accepts_discoveries(&self) -> bool {
        true
    }

    /// Depth of the next entry, for disciplines that finish a level before
    /// starting the next
    ///
    /// The scheduler holds that entry back while any shallower claim is in
    /// flight. `None` means pops are never held.
    fn level_barrier(&self) -> Option<u32> {
        None
    }

    fn name(&self) -> &'static str;
}

/// FIFO by level: every depth-d entry leaves before any depth-d+1 entry
#[derive(Debug, Default)]
pub struct BreadthFirstFrontier {
    current: VecDeque<FrontierEntry>,
    next: VecDeque<FrontierEntry>,
    current_depth: Option<u32>,
}

impl BreadthFirstFrontier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Frontier for BreadthFirstFrontier {
    fn push(&mut self, entry: FrontierEntry) {
        match self.current_depth {
            Some(depth) if entry.depth > depth => self.next.push_back(entry),
            _ => {
                self.current_depth.get_or_insert(entry.depth);
                self.current.push_back(entry);
            }
        }
    }

    fn pop(&mut self) -> Option<FrontierEntry> {
        if self.current.is_empty() {
            if self.next.is_empty() {
                self.current_depth = None;
                return None;
            }
            std::mem::swap(&mut self.current, &mut self.next);
            self.current_depth = self.current.iter().map(|e| e.depth).min();
            trace!(
                "BFS advancing to depth {:?} ({} entries)",
                self.current_depth,
                self.current.len()
            );
        }
        self.current.pop_front()
    }

    fn len(&self) -> usize {
        self.current.len() + self.next.len()
    }

    fn level_barrier(&self) -> Option<u32> {
        match self.current.front() {
            Some(entry) => Some(entry.depth),
            None => self.next.iter().map(|e| e.depth).min(),
        }
    }

    fn name(&self) -> &'static str {
        "breadth-first"
    }
}

/// LIFO: a branch is exhausted before its siblings
#[derive(Debug, Default)]
pub struct DepthFirstFrontier {
    stack: Vec<FrontierEntry>,
}

impl DepthFirstFrontier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Frontier for DepthFirstFrontier {
    fn push(&mut self, entry: FrontierEntry) {
        self.stack.push(entry);
    }

    /// Children are ranked, then pushed in reverse so the best pops first
    fn push_children(&mut self, parent: Option<&FrontierEntry>, mut children: Vec<FrontierEntry>) {
        if let Some(parent) = parent.and_then(|p| Url::parse(&p.url).ok()) {
            // sort_by_key is stable: equal scores keep discovery order
            children.sort_by_key(|child| std::cmp::Reverse(link_affinity(&parent, &child.url)));
        }
        self.stack.extend(children.into_iter().rev());
    }

    fn pop(&mut self) -> Option<FrontierEntry> {
        self.stack.pop()
    }

    fn len(&self) -> usize {
        self.stack.len()
    }

    fn name(&self) -> &'static str {
        "depth-first"
    }
}

/// Ranks a child link relative to its parent page
///
/// Same host first, then longer shared path prefix, then shorter path.
fn link_affinity(parent: &Url, child: &str) -> (bool, usize, std::cmp::Reverse<usize>) {
    let Ok(child) = Url::parse(child) else {
        return (false, 0, std::cmp::Reverse(usize::MAX));
    };

    let same_host = parent.host_str() == child.host_str();
    let shared = parent
        .path_segments()
        .into_iter()
        .flatten()
        .zip(child.path_segments().into_iter().flatten())
        .take_while(|(a, b)| a == b && !a.is_empty())
        .count();
    let segments = child
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).count())
        .unwrap_or(0);

    (same_host, if same_host { shared } else { 0 }, std::cmp::Reverse(segments))
}

/// Pre-resolved list crawled in order; discoveries are ignored
#[derive(Debug, Default)]
pub struct SitemapFrontier {
    queue: VecDeque<FrontierEntry>,
}

impl SitemapFrontier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Frontier for SitemapFrontier {
    fn push(&mut self, entry: FrontierEntry) {
        self.queue.push_back(entry);
    }

    fn push_children(&mut self, _parent: Option<&FrontierEntry>, _children: Vec<FrontierEntry>) {}

    fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn accepts_discoveries(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "sitemap"
    }
}

/// External importance scores keyed by normalized URL
#[derive(Debug, Clone, Default)]
pub struct PageImportance {
    scores: HashMap<String, i64>,
}

impl PageImportance {
    pub fn new(scores: HashMap<String, i64>) -> Self {
        Self {
            scores: scores
                .into_iter()
                .map(|(url, score)| (normalize_key(&url).unwrap_or(url), score))
                .collect(),
        }
    }

    /// Score for a URL, 0 when unknown
    pub fn score(&self, url: &str) -> i64 {
        normalize_key(url)
            .and_then(|key| self.scores.get(&key).copied())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Debug)]
struct Ranked {
    score: i64,
    seq: u64,
    entry: FrontierEntry,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.seq == other.seq
    }
}

impl Eq for Ranked {}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on score; earlier insertion wins ties
        self.score
            .cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap on `priority - depth`
#[derive(Debug, Default)]
pub struct PriorityFrontier {
    heap: BinaryHeap<Ranked>,
    importance: Arc<PageImportance>,
    seq: u64,
}

impl PriorityFrontier {
    pub fn new(importance: Arc<PageImportance>) -> Self {
        Self {
            heap: BinaryHeap::new(),
            importance,
            seq: 0,
        }
    }
}

impl Frontier for PriorityFrontier {
    fn push(&mut self, mut entry: FrontierEntry) {
        if entry.priority == 0 {
            entry.priority = self.importance.score(&entry.url);
        }
        let score = entry.priority.saturating_sub(i64::from(entry.depth));
        trace!("priority {} for {}", score, entry.url);
        self.heap.push(Ranked {
            score,
            seq: self.seq,
            entry,
        });
        self.seq += 1;
    }

    fn pop(&mut self) -> Option<FrontierEntry> {
        self.heap.pop().map(|ranked| ranked.entry)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn name(&self) -> &'static str {
        "priority"
    }
}
