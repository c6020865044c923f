/// Lifecycle phases of a single crawl
///
/// ```text
/// Idle -> Running -> Draining  -> Completed
///                 \-> Cancelled -> Completed
/// ```
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

/// Represents the current phase of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Created but not started
    Idle,

    /// Workers are dequeuing and fetching
    Running,

    /// Frontier exhausted or page budget spent; in-flight work finishing
    Draining,

    /// Caller requested cancellation; in-flight work finishing
    Cancelled,

    /// All workers exited and the result channel is closed
    Completed,
}

/// Rejected phase transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move from {from} to {to}")]
pub struct PhaseError {
    pub from: CrawlPhase,
    pub to: CrawlPhase,
}

impl CrawlPhase {
    /// Returns true if moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Draining)
                | (Running, Cancelled)
                | (Draining, Cancelled)
                | (Draining, Completed)
                | (Cancelled, Completed)
        )
    }

    /// Returns true once no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true while workers may still dequeue new entries
    pub fn accepts_work(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared, validated phase cell
#[derive(Debug)]
pub struct PhaseTracker {
    phase: Mutex<CrawlPhase>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(CrawlPhase::Idle),
        }
    }

    /// Current phase
    pub fn current(&self) -> CrawlPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Moves to `next`, failing if the transition is illegal
    pub fn advance(&self, next: CrawlPhase) -> Result<CrawlPhase, PhaseError> {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if !phase.can_transition_to(next) {
            return Err(PhaseError {
                from: *phase,
                to: next,
            });
        }
        let previous = *phase;
        *phase = next;
        Ok(previous)
    }

    /// Moves to `next` only if currently in `expected`
    ///
    /// Returns false without error when the phase has already moved on, so
    /// racing workers can all request Draining and exactly one wins.
    pub fn advance_if(&self, expected: CrawlPhase, next: CrawlPhase) -> bool {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if *phase == expected && phase.can_transition_to(next) {
            *phase = next;
            true
        } else {
            false
        }
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
