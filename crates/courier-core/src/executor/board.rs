//! WorkerBoard - ワーカーごとの状態

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
}

/// health endpoint 向けの 1 ワーカー分の状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub worker_id: usize,
    pub status: WorkerStatus,
    pub current_job: Option<JobId>,
    pub busy_since: Option<DateTime<Utc>>,
    /// 実行した attempt 数
    pub processed: u64,
    /// 配送できなかった attempt 数
    pub failed: u64,
}

impl WorkerHealth {
    fn idle(worker_id: usize) -> Self {
        Self {
            worker_id,
            status: WorkerStatus::Idle,
            current_job: None,
            busy_since: None,
            processed: 0,
            failed: 0,
        }
    }
}

#[derive(Debug)]
pub struct WorkerBoard {
    workers: RwLock<Vec<WorkerHealth>>,
}

impl WorkerBoard {
    pub fn new(n: usize) -> Self {
        Self {
            workers: RwLock::new((0..n).map(WorkerHealth::idle).collect()),
        }
    }

    pub async fn mark_busy(&self, worker_id: usize, job_id: JobId, since: DateTime<Utc>) {
        if let Some(w) = self.workers.write().await.get_mut(worker_id) {
            w.status = WorkerStatus::Busy;
            w.current_job = Some(job_id);
            w.busy_since = Some(since);
        }
    }

    pub async fn mark_idle(&self, worker_id: usize, delivered: bool) {
        if let Some(w) = self.workers.write().await.get_mut(worker_id) {
            w.status = WorkerStatus::Idle;
            w.current_job = None;
            w.busy_since = None;
            w.processed += 1;
            if !delivered {
                w.failed += 1;
            }
        }
    }

    pub async fn snapshot(&self) -> Vec<WorkerHealth> {
        self.workers.read().await.clone()
    }

    /// `(active, idle, total)`
    pub async fn utilization(&self) -> (usize, usize, usize) {
        let workers = self.workers.read().await;
        let active = workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Busy)
            .count();
        (active, workers.len() - active, workers.len())
    }
}
