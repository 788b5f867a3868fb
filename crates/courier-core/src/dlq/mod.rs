//! DLQ - 終了した job の保管、参照、再投入

mod store;

pub use store::DeadLetterStore;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    DeliveryAttempt, DeliveryJob, DlqId, ErrorCategory, EventType, JobId, TenantId,
};
use crate::queue::QueueError;

pub const MAX_LIST_LIMIT: usize = 100;
pub const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DlqError {
    #[error("dead letter record {0} not found")]
    NotFound(DlqId),

    #[error("failed to re-enqueue: {0}")]
    Enqueue(#[from] QueueError),
}

/// リトライを使い切った、または終端エラーになった job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub dlq_id: DlqId,
    pub original_job: DeliveryJob,
    pub failure_history: Vec<DeliveryAttempt>,
    pub tenant_id: TenantId,
    pub event_type: EventType,
    pub first_queued_at: DateTime<Utc>,
    pub moved_to_dlq_at: DateTime<Utc>,
    pub last_error_category: ErrorCategory,
    pub failure_reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqFilter {
    pub category: Option<ErrorCategory>,
    pub tenant_id: Option<TenantId>,
}

impl DlqFilter {
    pub fn matches(&self, record: &DeadLetterRecord) -> bool {
        self.category
            .is_none_or(|c| c == record.last_error_category)
            && self
                .tenant_id
                .as_ref()
                .is_none_or(|t| *t == record.tenant_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqSummary {
    pub dlq_id: DlqId,
    pub job_id: JobId,
    pub tenant_id: TenantId,
    pub event_type: EventType,
    pub last_error_category: ErrorCategory,
    pub moved_to_dlq_at: DateTime<Utc>,
}

impl From<&DeadLetterRecord> for DlqSummary {
    fn from(r: &DeadLetterRecord) -> Self {
        Self {
            dlq_id: r.dlq_id,
            job_id: r.original_job.job_id,
            tenant_id: r.tenant_id.clone(),
            event_type: r.event_type,
            last_error_category: r.last_error_category,
            moved_to_dlq_at: r.moved_to_dlq_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqStats {
    pub total_jobs: usize,
    pub count_by_category: BTreeMap<ErrorCategory, usize>,
    pub count_by_tenant: BTreeMap<TenantId, usize>,
    pub oldest_job_age_ms: Option<u64>,
    /// 新しい順
    pub recently_added: Vec<DlqSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRetrySuccess {
    pub dlq_id: DlqId,
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRetryFailure {
    pub dlq_id: DlqId,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRetryResult {
    pub successful: Vec<BulkRetrySuccess>,
    pub failed: Vec<BulkRetryFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqThresholds {
    pub max_healthy_jobs: usize,
    pub max_healthy_age_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqHealth {
    pub status: HealthStatus,
    pub total_jobs: usize,
    pub oldest_job_age_ms: Option<u64>,
    pub warnings: Vec<String>,
    pub thresholds: DlqThresholds,
}
