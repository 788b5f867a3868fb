//! Retry orchestration: category table, backoff, decisions.

mod backoff;
mod orchestrator;
mod table;

pub use backoff::{JITTER_RATIO, Jitter, MIN_DELAY, NoJitter, RandomJitter, compute_delay};
pub use orchestrator::RetryOrchestrator;
pub use table::{CategoryRule, RetryTable};
