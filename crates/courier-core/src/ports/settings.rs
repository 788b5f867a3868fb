//! SettingsLookup port - テナント設定の参照

use async_trait::async_trait;

use crate::domain::{Environment, EventType, TenantId};

/// テナントのイベント送信先 URL を解決する
///
/// 設定の CRUD は別サービス。relay は読むだけ。
#[async_trait]
pub trait SettingsLookup: Send + Sync {
    /// `event_type` ごとに別エンドポイントへ振り分けられる。
    /// `None` はエンドポイント未登録。
    async fn webhook_url(
        &self,
        tenant: &TenantId,
        environment: Environment,
        event_type: EventType,
    ) -> Option<String>;
}
