//! InMemoryPolicyStore - 開発用のポリシーストア
//!
//! Read-through cache: 読み取りは read lock。(tenant, environment) の初回参照だけ
//! write lock を取ってデフォルトを挿入するので、同時の初回参照も同じ policy になる。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Environment, PolicyError, PolicyUpdate, RetryPolicy, TenantId};
use crate::ports::PolicyStore;

type PolicyKey = (TenantId, Environment);

#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    policies: RwLock<HashMap<PolicyKey, RetryPolicy>>,
    default_policy: RetryPolicy,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初回参照時にテナントへ渡す policy
    pub fn with_default(default_policy: RetryPolicy) -> Self {
        Self {
            policies: RwLock::new(HashMap::new()),
            default_policy,
        }
    }

    /// policy を事前登録する（設定ファイル、テスト用）。update と同じ検証を通す。
    pub async fn insert(
        &self,
        tenant: TenantId,
        environment: Environment,
        policy: RetryPolicy,
    ) -> Result<(), PolicyError> {
        policy.validate()?;
        self.policies
            .write()
            .await
            .insert((tenant, environment), policy);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.policies.read().await.len()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get_or_create(
        &self,
        tenant: &TenantId,
        environment: Environment,
    ) -> Result<RetryPolicy, PolicyError> {
        let key = (tenant.clone(), environment);
        if let Some(policy) = self.policies.read().await.get(&key) {
            return Ok(policy.clone());
        }

        let mut policies = self.policies.write().await;
        let policy = policies
            .entry(key)
            .or_insert_with(|| self.default_policy.clone());
        Ok(policy.clone())
    }

    async fn update(
        &self,
        tenant: &TenantId,
        environment: Environment,
        update: &PolicyUpdate,
    ) -> Result<RetryPolicy, PolicyError> {
        let mut policies = self.policies.write().await;
        let key = (tenant.clone(), environment);
        let current = policies
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.default_policy.clone());
        let next = current.apply(update)?;
        policies.insert(key, next.clone());
        tracing::info!(
            target: "courier::policy",
            tenant_id = %tenant,
            environment = %environment,
            max_retries = next.max_retries,
            initial_delay_ms = next.initial_delay_ms,
            backoff = %next.backoff_strategy,
            "retry policy updated"
        );
        Ok(next)
    }
}
