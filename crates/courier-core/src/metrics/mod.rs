//! Queue health and metrics.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::MetricsConfig;
use crate::dlq::DeadLetterStore;
use crate::executor::{WorkerBoard, WorkerHealth};
use crate::observability::{FinishOutcome, QueueCounts};
use crate::ports::Clock;
use crate::queue::{ClearScope, DeliveryQueue};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub completed_per_minute: f64,
    pub failed_per_minute: f64,
    pub processed_per_minute: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerUtilization {
    pub active: usize,
    pub idle: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub queue: QueueCounts,
    pub paused: bool,
    pub throughput: Throughput,
    /// Mean dequeue-to-finish time over the throughput window.
    pub average_processing_ms: f64,
    pub workers: WorkerUtilization,
    pub dlq_total: usize,
}

/// Read-only aggregation over the queue, workers and DLQ, plus the queue
/// control operations exposed to operators.
pub struct QueueMetrics {
    queue: Arc<dyn DeliveryQueue>,
    dlq: Arc<DeadLetterStore>,
    board: Arc<WorkerBoard>,
    clock: Arc<dyn Clock>,
    config: MetricsConfig,
    history: Mutex<VecDeque<MetricsSnapshot>>,
}

impl QueueMetrics {
    pub fn new(
        config: MetricsConfig,
        queue: Arc<dyn DeliveryQueue>,
        dlq: Arc<DeadLetterStore>,
        board: Arc<WorkerBoard>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            dlq,
            board,
            clock,
            history: Mutex::new(VecDeque::with_capacity(config.history_capacity)),
            config,
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Build a snapshot and append it to the history ring.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let now = self.clock.now();
        let window = self.config.throughput_window();
        let since = now
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::minutes(1));

        let queue = self.queue.counts().await;
        let finished = self.queue.finished_since(since).await;
        let completed = finished
            .iter()
            .filter(|f| f.outcome == FinishOutcome::Completed)
            .count();
        let failed = finished.len() - completed;
        let per_minute = 60.0 / window.as_secs_f64();
        let average_processing_ms = if finished.is_empty() {
            0.0
        } else {
            finished.iter().map(|f| f.processing_ms as f64).sum::<f64>() / finished.len() as f64
        };

        let (active, idle, total) = self.board.utilization().await;
        let snapshot = MetricsSnapshot {
            timestamp: now,
            paused: queue.paused,
            queue,
            throughput: Throughput {
                completed_per_minute: completed as f64 * per_minute,
                failed_per_minute: failed as f64 * per_minute,
                processed_per_minute: finished.len() as f64 * per_minute,
            },
            average_processing_ms,
            workers: WorkerUtilization {
                active,
                idle,
                total,
            },
            dlq_total: self.dlq.len().await,
        };

        let mut history = self.history.lock().await;
        history.push_back(snapshot.clone());
        while history.len() > self.config.history_capacity {
            history.pop_front();
        }
        snapshot
    }

    /// Up to `limit` most recent snapshots, oldest first.
    pub async fn history(&self, limit: usize) -> Vec<MetricsSnapshot> {
        let history = self.history.lock().await;
        let limit = limit.clamp(1, self.config.history_capacity);
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub async fn worker_health(&self) -> Vec<WorkerHealth> {
        self.board.snapshot().await
    }

    pub async fn pause(&self) {
        self.queue.pause().await;
        tracing::info!(target: "courier::queue", "queue paused");
    }

    pub async fn resume(&self) {
        self.queue.resume().await;
        tracing::info!(target: "courier::queue", "queue resumed");
    }

    pub async fn clear(&self, scope: ClearScope) -> usize {
        let removed = self.queue.clear(scope).await;
        tracing::info!(target: "courier::queue", %scope, removed, "queue cleared");
        removed
    }
}
