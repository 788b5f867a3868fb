//! PolicyStore port - リトライポリシーの永続化

use async_trait::async_trait;

use crate::domain::{Environment, PolicyError, PolicyUpdate, RetryPolicy, TenantId};

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// 現在の policy。初回参照時はデフォルトを作成する。
    async fn get_or_create(
        &self,
        tenant: &TenantId,
        environment: Environment,
    ) -> Result<RetryPolicy, PolicyError>;

    /// 部分更新を検証して保存し、保存後の policy を返す。
    async fn update(
        &self,
        tenant: &TenantId,
        environment: Environment,
        update: &PolicyUpdate,
    ) -> Result<RetryPolicy, PolicyError>;
}
