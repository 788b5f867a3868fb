//! Decision - 失敗した attempt の後に job をどうするか
//!
//! `Decision` が「次に何をするか」、`Decider` が「どう決めるか」を表します。
//! Decider は純粋関数として実装します（I/O なし、状態変更なし）。
//! 決定の実行（再投入や DLQ への移動）は executor 側の責務です。

use std::time::Duration;

use super::attempt::DeliveryAttempt;
use super::category::ErrorCategory;
use super::job::DeliveryJob;
use super::policy::RetryPolicy;

/// 直近の attempt が失敗した job の次のアクション
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// `delay` 後に再投入
    Retry {
        delay: Duration,
        category: ErrorCategory,
    },

    /// 諦めて dead letter store へ渡す
    DeadLetter {
        category: ErrorCategory,
        reason: String,
    },
}

impl Decision {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Decision::Retry { category, .. } | Decision::DeadLetter { category, .. } => *category,
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Decision::Retry { .. })
    }
}

/// 失敗した配送をリトライするか終了するか決める。
///
/// `job.attempts_made` は `latest` の attempt を含んだ回数。
pub trait Decider: Send + Sync {
    fn decide(
        &self,
        job: &DeliveryJob,
        latest: &DeliveryAttempt,
        policy: &RetryPolicy,
    ) -> Decision;
}
