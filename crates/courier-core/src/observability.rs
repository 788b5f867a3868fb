//! Queue status views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{JobId, TenantId};

/// Point-in-time depth of the delivery queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub waiting: usize,
    pub in_flight: usize,
    pub delayed: usize,
    pub completed: usize,
    pub failed: usize,
    pub paused: bool,
}

impl QueueCounts {
    /// Jobs counted against `max_depth`.
    pub fn depth(&self) -> usize {
        self.waiting + self.delayed + self.in_flight
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishOutcome {
    Completed,
    Failed,
}

/// Entry in the bounded finished-job log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedJob {
    pub job_id: JobId,
    pub tenant_id: TenantId,
    pub outcome: FinishOutcome,
    pub finished_at: DateTime<Utc>,
    /// Time between dequeue and finish of the last execution.
    pub processing_ms: u64,
}
