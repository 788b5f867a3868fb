//! AttemptSink port - attempt 履歴の出力先

use async_trait::async_trait;

use crate::domain::{DeliveryAttempt, DeliveryJob};

#[derive(Debug, thiserror::Error)]
#[error("attempt sink error: {0}")]
pub struct SinkError(pub String);

/// 全ての配送 attempt を受け取る。
/// 失敗はログに出すだけで配送には影響させない。
#[async_trait]
pub trait AttemptSink: Send + Sync {
    async fn record(&self, job: &DeliveryJob, attempt: &DeliveryAttempt) -> Result<(), SinkError>;
}
