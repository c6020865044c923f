//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase` / `PhaseTracker`: the validated lifecycle of one crawl
//! - `DomainState`: per-domain request spacing for robots.txt crawl delays

mod crawl_phase;
mod domain_state;

pub use crawl_phase::{CrawlPhase, PhaseError, PhaseTracker};
pub use domain_state::DomainState;
