//! IdGenerator port - ID 生成の抽象化
//!
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::domain::{AttemptId, DlqId, EventId, Id, IdMarker, JobId};
use crate::ports::Clock;

/// IdGenerator は時刻でソート可能な ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数のワーカーから使う）
pub trait IdGenerator: Send + Sync {
    fn event_id(&self) -> EventId;

    fn job_id(&self) -> JobId;

    fn attempt_id(&self) -> AttemptId;

    fn dlq_id(&self) -> DlqId;
}

/// UlidGenerator は Clock の時刻を ULID のタイムスタンプ部に使います。
/// FixedClock を渡せばタイムスタンプ部は決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next<T: IdMarker>(&self) -> Id<T> {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Id::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn event_id(&self) -> EventId {
        self.next()
    }

    fn job_id(&self) -> JobId {
        self.next()
    }

    fn attempt_id(&self) -> AttemptId {
        self.next()
    }

    fn dlq_id(&self) -> DlqId {
        self.next()
    }
}
