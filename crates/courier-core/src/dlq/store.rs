//! DeadLetterStore - インメモリの DLQ

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    BulkRetryFailure, BulkRetryResult, BulkRetrySuccess, DeadLetterRecord, DlqError, DlqFilter,
    DlqHealth, DlqStats, DlqSummary, DlqThresholds, HealthStatus, MAX_LIST_LIMIT, RECENT_LIMIT,
};
use crate::config::DlqConfig;
use crate::domain::{DeliveryAttempt, DeliveryJob, DlqId, ErrorCategory, JobId, Priority};
use crate::ports::{Clock, IdGenerator};
use crate::queue::DeliveryQueue;

/// 終了した job を dead letter ID で保持する
///
/// ロック順は store → queue。`retry` は store のロックを持ったまま enqueue するので、
/// 代わりの job がキューに入ってからレコードが消える。
pub struct DeadLetterStore {
    records: Mutex<HashMap<DlqId, DeadLetterRecord>>,
    queue: Arc<dyn DeliveryQueue>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: DlqConfig,
}

fn age_ms(now: DateTime<Utc>, then: DateTime<Utc>) -> u64 {
    (now - then).num_milliseconds().max(0) as u64
}

/// 新しい順。同時刻は ID で順序をつける。
fn newest_first(a: &DeadLetterRecord, b: &DeadLetterRecord) -> std::cmp::Ordering {
    b.moved_to_dlq_at
        .cmp(&a.moved_to_dlq_at)
        .then_with(|| b.dlq_id.cmp(&a.dlq_id))
}

impl DeadLetterStore {
    pub fn new(
        config: DlqConfig,
        queue: Arc<dyn DeliveryQueue>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            queue,
            ids,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &DlqConfig {
        &self.config
    }

    pub async fn move_to_dlq(
        &self,
        mut job: DeliveryJob,
        failure_history: Vec<DeliveryAttempt>,
        last_category: ErrorCategory,
        reason: impl Into<String>,
    ) -> DlqId {
        let dlq_id = self.ids.dlq_id();
        let now = self.clock.now();
        job.attempts.clear();
        let record = DeadLetterRecord {
            dlq_id,
            tenant_id: job.event.tenant_id.clone(),
            event_type: job.event.event_type,
            first_queued_at: job.created_at,
            moved_to_dlq_at: now,
            last_error_category: last_category,
            failure_reason: reason.into(),
            failure_history,
            original_job: job,
        };

        tracing::warn!(
            target: "courier::dlq",
            dlq_id = %dlq_id,
            job_id = %record.original_job.job_id,
            tenant_id = %record.tenant_id,
            event_type = %record.event_type,
            category = %last_category,
            attempts = record.original_job.attempts_made,
            reason = %record.failure_reason,
            "job moved to dead letter queue"
        );

        let mut records = self.records.lock().await;
        records.insert(dlq_id, record);
        while records.len() > self.config.max_records {
            let Some(oldest) = records
                .values()
                .min_by(|a, b| newest_first(b, a))
                .map(|r| r.dlq_id)
            else {
                break;
            };
            records.remove(&oldest);
            tracing::warn!(
                target: "courier::dlq",
                dlq_id = %oldest,
                max_records = self.config.max_records,
                "dead letter store full, evicted oldest record"
            );
        }
        dlq_id
    }

    pub async fn get(&self, dlq_id: DlqId) -> Option<DeadLetterRecord> {
        self.records.lock().await.get(&dlq_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// 新しい順。`limit` は `1..=100` に丸める。
    pub async fn list(&self, filter: &DlqFilter, limit: usize, offset: usize) -> Vec<DeadLetterRecord> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let records = self.records.lock().await;
        let mut matching: Vec<&DeadLetterRecord> =
            records.values().filter(|r| filter.matches(r)).collect();
        matching.sort_by(|a, b| newest_first(a, b));
        matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> DlqStats {
        let now = self.clock.now();
        let records = self.records.lock().await;

        let mut stats = DlqStats {
            total_jobs: records.len(),
            ..DlqStats::default()
        };
        for r in records.values() {
            *stats
                .count_by_category
                .entry(r.last_error_category)
                .or_default() += 1;
            *stats.count_by_tenant.entry(r.tenant_id.clone()).or_default() += 1;
        }
        stats.oldest_job_age_ms = records
            .values()
            .map(|r| r.moved_to_dlq_at)
            .min()
            .map(|oldest| age_ms(now, oldest));

        let mut recent: Vec<&DeadLetterRecord> = records.values().collect();
        recent.sort_by(|a, b| newest_first(a, b));
        stats.recently_added = recent
            .into_iter()
            .take(RECENT_LIMIT)
            .map(DlqSummary::from)
            .collect();
        stats
    }

    /// 新しい ID で job を作り直し、high 優先度で投入する。
    /// レコードは enqueue に成功したときだけ削除する。
    pub async fn retry(&self, dlq_id: DlqId) -> Result<JobId, DlqError> {
        let mut records = self.records.lock().await;
        let record = records.get(&dlq_id).ok_or(DlqError::NotFound(dlq_id))?;

        let job = record
            .original_job
            .replay(self.ids.job_id(), dlq_id, self.clock.now());
        let tenant_id = record.tenant_id.clone();
        let job_id = self.queue.enqueue(job, Priority::High).await?;
        records.remove(&dlq_id);

        tracing::info!(
            target: "courier::dlq",
            dlq_id = %dlq_id,
            job_id = %job_id,
            tenant_id = %tenant_id,
            "dead letter replayed"
        );
        Ok(job_id)
    }

    /// ID ごとに独立して retry する。1 件の失敗で残りは止めない。
    pub async fn bulk_retry(&self, ids: &[DlqId]) -> BulkRetryResult {
        let mut result = BulkRetryResult::default();
        for &dlq_id in ids {
            match self.retry(dlq_id).await {
                Ok(job_id) => result.successful.push(BulkRetrySuccess { dlq_id, job_id }),
                Err(e) => result.failed.push(BulkRetryFailure {
                    dlq_id,
                    error: e.to_string(),
                }),
            }
        }
        result
    }

    pub async fn purge_older_than(&self, age: Duration) -> usize {
        let Ok(age) = chrono::Duration::from_std(age) else {
            return 0;
        };
        let cutoff = self.clock.now() - age;
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| r.moved_to_dlq_at >= cutoff);
        let purged = before - records.len();
        if purged > 0 {
            tracing::info!(
                target: "courier::dlq",
                purged,
                remaining = records.len(),
                "purged old dead letter records"
            );
        }
        purged
    }

    pub async fn health(&self) -> DlqHealth {
        let now = self.clock.now();
        let (total_jobs, oldest) = {
            let records = self.records.lock().await;
            (
                records.len(),
                records.values().map(|r| r.moved_to_dlq_at).min(),
            )
        };
        let oldest_job_age_ms = oldest.map(|t| age_ms(now, t));
        let thresholds = DlqThresholds {
            max_healthy_jobs: self.config.max_healthy_jobs,
            max_healthy_age_ms: self.config.max_healthy_age().as_millis() as u64,
        };

        let mut status = HealthStatus::Healthy;
        let mut warnings = Vec::new();
        if total_jobs > thresholds.max_healthy_jobs * 2 {
            status = HealthStatus::Unhealthy;
            warnings.push(format!(
                "{total_jobs} jobs in dead letter queue (unhealthy above {})",
                thresholds.max_healthy_jobs * 2
            ));
        } else if total_jobs > thresholds.max_healthy_jobs {
            status = HealthStatus::Warning;
            warnings.push(format!(
                "{total_jobs} jobs in dead letter queue (threshold {})",
                thresholds.max_healthy_jobs
            ));
        }
        if let Some(age) = oldest_job_age_ms
            && age > thresholds.max_healthy_age_ms
        {
            if status == HealthStatus::Healthy {
                status = HealthStatus::Warning;
            }
            warnings.push(format!(
                "oldest dead letter is {}h old",
                age / (60 * 60 * 1000)
            ));
        }

        DlqHealth {
            status,
            total_jobs,
            oldest_job_age_ms,
            warnings,
            thresholds,
        }
    }
}
