//! Delivery queue - 優先度順、遅延再投入、容量制限

mod memory;

pub use memory::InMemoryQueue;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DeliveryJob, JobId, ParseEnumError, Priority};
use crate::observability::{FinishedJob, QueueCounts};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue saturated (max depth {max_depth})")]
    Saturated { max_depth: usize },

    #[error("job {0} is already queued")]
    Duplicate(JobId),

    #[error("queue is shut down")]
    ShutDown,
}

/// 1 つのワーカーだけに渡された job。
/// ワーカーは `complete` / `fail` / `enqueue_delayed` のいずれかで結果を返す。
#[derive(Debug, Clone)]
pub struct Lease {
    pub job: DeliveryJob,
    pub priority: Priority,
}

/// `clear` の対象。実行中の job は消さない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearScope {
    /// waiting と delayed の両方
    Waiting,
    Completed,
    Failed,
    All,
}

impl FromStr for ClearScope {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(ClearScope::Waiting),
            "completed" => Ok(ClearScope::Completed),
            "failed" => Ok(ClearScope::Failed),
            "all" => Ok(ClearScope::All),
            other => Err(ParseEnumError {
                kind: "clear scope",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ClearScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClearScope::Waiting => "waiting",
            ClearScope::Completed => "completed",
            ClearScope::Failed => "failed",
            ClearScope::All => "all",
        })
    }
}

/// Queue port
/// 実装は in-memory のみ。永続キューへの差し替えはこの trait が境界。
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn enqueue(&self, job: DeliveryJob, priority: Priority) -> Result<JobId, QueueError>;

    /// `delay` 後に ready になるよう登録する。
    /// lease 中の job をこの経路で戻す場合は容量チェックしない。
    async fn enqueue_delayed(
        &self,
        job: DeliveryJob,
        priority: Priority,
        delay: Duration,
    ) -> Result<JobId, QueueError>;

    /// 最優先の ready job を待つ。shutdown 後は `None`。
    async fn dequeue(&self) -> Option<Lease>;

    /// 配送済み job を finished log に記録
    async fn complete(&self, job_id: JobId) -> bool;

    /// DLQ 行きの job を finished log に記録
    async fn fail(&self, job_id: JobId) -> bool;

    /// waiting / delayed の job を取り除く
    async fn remove(&self, job_id: JobId) -> bool;

    async fn counts(&self) -> QueueCounts;

    async fn pause(&self);

    async fn resume(&self);

    async fn is_paused(&self) -> bool;

    async fn clear(&self, scope: ClearScope) -> usize;

    async fn finished_since(&self, since: DateTime<Utc>) -> Vec<FinishedJob>;

    /// 待機中の dequeue を全て起こす。以降の dequeue は `None` を返す。
    async fn shutdown(&self);
}
