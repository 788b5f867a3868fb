//! DeliveryAttempt - 配送 attempt の履歴

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::ErrorCategory;
use super::ids::{AttemptId, JobId};

/// 1 回の HTTP 配送の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Delivered,
    Failed,
}

/// job の 1 回分の実行記録。追記のみで、結果に関係なく実行ごとに 1 件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub attempt_id: AttemptId,
    pub job_id: JobId,
    /// job 内での attempt 番号（1 始まり）
    pub attempt_number: u32,
    pub target_url: String,
    pub attempted_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,

    pub retryable: bool,
}

impl DeliveryAttempt {
    pub fn is_delivered(&self) -> bool {
        self.outcome == AttemptOutcome::Delivered
    }
}
