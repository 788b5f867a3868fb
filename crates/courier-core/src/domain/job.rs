//! DeliveryJob と配送の優先度

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attempt::DeliveryAttempt;
use super::event::{InboundEvent, ParseEnumError};
use super::ids::{DlqId, JobId};

/// dequeue の優先順位を決めるサービス階層
///
/// 宣言順がそのまま順序になる（`Urgent` が最大）。
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

/// 1 つの受信イベントを 1 つのテナントエンドポイントへ届ける job
///
/// attempt 履歴は job と一緒に持ち回るので、DLQ レコードは追加の参照なしで作れる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub job_id: JobId,
    pub event: InboundEvent,
    pub target_url: String,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<DeliveryAttempt>,

    /// DLQ レコードから再作成された job のみ Some
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_of: Option<DlqId>,
}

impl DeliveryJob {
    pub fn new(
        job_id: JobId,
        event: InboundEvent,
        target_url: impl Into<String>,
        max_attempts: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            event,
            target_url: target_url.into(),
            attempts_made: 0,
            max_attempts,
            created_at,
            attempts: Vec::new(),
            replay_of: None,
        }
    }

    /// attempt を履歴に追加する。
    /// `attempts_made` はここではなく executor が attempt 開始時に増やす。
    pub fn record_attempt(&mut self, attempt: DeliveryAttempt) {
        self.attempts.push(attempt);
    }

    pub fn last_attempt(&self) -> Option<&DeliveryAttempt> {
        self.attempts.last()
    }

    /// 手動再投入用のコピー（新しい ID、履歴なし）
    pub fn replay(&self, job_id: JobId, dlq_id: DlqId, now: DateTime<Utc>) -> Self {
        Self {
            job_id,
            event: self.event.clone(),
            target_url: self.target_url.clone(),
            attempts_made: 0,
            max_attempts: self.max_attempts,
            created_at: now,
            attempts: Vec::new(),
            replay_of: Some(dlq_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Environment, EventId, EventType, TenantId};

    fn sample_job() -> DeliveryJob {
        let event = InboundEvent {
            id: EventId::generate(),
            tenant_id: TenantId::new("acme"),
            event_type: EventType::PaymentResult,
            raw_payload: serde_json::json!({"k": 1}),
            received_at: Utc::now(),
            environment: Environment::Dev,
        };
        DeliveryJob::new(JobId::generate(), event, "http://tenant.test/hook", 3, Utc::now())
    }

    #[test]
    fn urgent_outranks_everything() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn replay_keeps_event_and_resets_history() {
        let mut job = sample_job();
        job.attempts_made = 3;
        let dlq_id = DlqId::generate();
        let new_id = JobId::generate();

        let replayed = job.replay(new_id, dlq_id, Utc::now());

        assert_eq!(replayed.job_id, new_id);
        assert_eq!(replayed.event, job.event);
        assert_eq!(replayed.target_url, job.target_url);
        assert_eq!(replayed.attempts_made, 0);
        assert!(replayed.attempts.is_empty());
        assert_eq!(replayed.replay_of, Some(dlq_id));
    }
}
