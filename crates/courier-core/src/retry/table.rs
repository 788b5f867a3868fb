//! Per-category retry rules.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::ErrorCategory;

/// How one failure category is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryRule {
    pub should_retry: bool,
    pub max_retries: u32,
    pub multiplier: f64,
    pub initial_delay: Duration,
}

impl CategoryRule {
    pub const fn retry(max_retries: u32, multiplier: f64, initial_delay_ms: u64) -> Self {
        Self {
            should_retry: true,
            max_retries,
            multiplier,
            initial_delay: Duration::from_millis(initial_delay_ms),
        }
    }

    pub const fn terminal() -> Self {
        Self {
            should_retry: false,
            max_retries: 0,
            multiplier: 1.0,
            initial_delay: Duration::ZERO,
        }
    }
}

/// Immutable category → rule map, built once at startup.
#[derive(Debug, Clone)]
pub struct RetryTable {
    rules: HashMap<ErrorCategory, CategoryRule>,
}

impl RetryTable {
    pub fn new(rules: HashMap<ErrorCategory, CategoryRule>) -> Self {
        Self { rules }
    }

    /// Rule for `category`; categories missing from a custom table fall back
    /// to the `unknown` rule of the default table.
    pub fn rule(&self, category: ErrorCategory) -> CategoryRule {
        self.rules
            .get(&category)
            .or_else(|| self.rules.get(&ErrorCategory::Unknown))
            .copied()
            .unwrap_or(UNKNOWN_RULE)
    }
}

const UNKNOWN_RULE: CategoryRule = CategoryRule::retry(3, 2.0, 2_000);

impl Default for RetryTable {
    fn default() -> Self {
        use ErrorCategory::*;
        Self::new(HashMap::from([
            (Network, CategoryRule::retry(5, 2.0, 1_000)),
            (Timeout, CategoryRule::retry(3, 1.5, 2_000)),
            (ClientError, CategoryRule::terminal()),
            (ServerError, CategoryRule::retry(4, 2.0, 1_500)),
            (Authentication, CategoryRule::terminal()),
            (RateLimit, CategoryRule::retry(3, 3.0, 5_000)),
            (Unknown, UNKNOWN_RULE),
        ]))
    }
}
