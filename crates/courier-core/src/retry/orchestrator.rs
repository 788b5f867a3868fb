//! Retry orchestrator: the default `Decider`.

use std::sync::Arc;

use super::backoff::{Jitter, RandomJitter, compute_delay};
use super::table::{CategoryRule, RetryTable};
use crate::domain::{
    Decider, Decision, DeliveryAttempt, DeliveryJob, ErrorCategory, RetryPolicy, categorize,
};

/// Categorizes the latest failure, consults the category table and the
/// tenant policy, and picks retry-with-delay or dead letter.
///
/// Pure apart from the jitter source; no I/O, no state.
#[derive(Clone)]
pub struct RetryOrchestrator {
    table: Arc<RetryTable>,
    jitter: Arc<dyn Jitter>,
}

impl RetryOrchestrator {
    pub fn new(table: RetryTable, jitter: Arc<dyn Jitter>) -> Self {
        Self {
            table: Arc::new(table),
            jitter,
        }
    }

    pub fn categorize(&self, attempt: &DeliveryAttempt) -> ErrorCategory {
        attempt.error_category.unwrap_or_else(|| {
            categorize(attempt.response_code, attempt.error_message.as_deref())
        })
    }

    pub fn is_retryable(&self, category: ErrorCategory) -> bool {
        self.table.rule(category).should_retry
    }

    pub fn rule(&self, category: ErrorCategory) -> CategoryRule {
        self.table.rule(category)
    }
}

impl Default for RetryOrchestrator {
    fn default() -> Self {
        Self::new(RetryTable::default(), Arc::new(RandomJitter))
    }
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl Decider for RetryOrchestrator {
    fn decide(
        &self,
        job: &DeliveryJob,
        latest: &DeliveryAttempt,
        policy: &RetryPolicy,
    ) -> Decision {
        let category = self.categorize(latest);
        let rule = self.table.rule(category);
        let attempts = job.attempts_made;

        if !rule.should_retry {
            return Decision::DeadLetter {
                category,
                reason: format!("{category} errors are not retried"),
            };
        }
        if attempts >= rule.max_retries {
            return Decision::DeadLetter {
                category,
                reason: format!(
                    "retry limit for {category} reached: {attempts}/{}",
                    rule.max_retries
                ),
            };
        }
        if attempts >= policy.max_retries {
            return Decision::DeadLetter {
                category,
                reason: format!(
                    "tenant retry limit reached: {attempts}/{}",
                    policy.max_retries
                ),
            };
        }

        // table delay first; the tenant value only fills a rule without one
        let initial = if rule.initial_delay.is_zero() {
            policy.initial_delay()
        } else {
            rule.initial_delay
        };
        let delay = compute_delay(
            policy.backoff_strategy,
            initial,
            rule.multiplier,
            attempts,
            policy.max_delay(),
            self.jitter.as_ref(),
        );
        Decision::Retry { delay, category }
    }
}
