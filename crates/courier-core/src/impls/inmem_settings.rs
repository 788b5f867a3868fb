//! InMemorySettings - テナント設定の参照実装
//!
//! ルートのキーは (tenant, environment)。event type ごとの上書きも可能。
//! `dev` では未登録テナントに fallback URL を返せる。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Environment, EventType, TenantId};
use crate::ports::SettingsLookup;

type RouteKey = (TenantId, Environment, Option<EventType>);

#[derive(Debug, Default)]
pub struct InMemorySettings {
    routes: RwLock<HashMap<RouteKey, String>>,
    dev_fallback_url: Option<String>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dev_fallback(mut self, url: impl Into<String>) -> Self {
        self.dev_fallback_url = Some(url.into());
        self
    }

    /// テナントの全 event type 共通のエンドポイントを登録
    pub async fn register(
        &self,
        tenant: TenantId,
        environment: Environment,
        url: impl Into<String>,
    ) {
        self.routes
            .write()
            .await
            .insert((tenant, environment, None), url.into());
    }

    /// 特定の event type 用エンドポイントを登録。テナント共通より優先される。
    pub async fn register_for(
        &self,
        tenant: TenantId,
        environment: Environment,
        event_type: EventType,
        url: impl Into<String>,
    ) {
        self.routes
            .write()
            .await
            .insert((tenant, environment, Some(event_type)), url.into());
    }
}

#[async_trait]
impl SettingsLookup for InMemorySettings {
    async fn webhook_url(
        &self,
        tenant: &TenantId,
        environment: Environment,
        event_type: EventType,
    ) -> Option<String> {
        let routes = self.routes.read().await;
        let specific = routes.get(&(tenant.clone(), environment, Some(event_type)));
        let general = || routes.get(&(tenant.clone(), environment, None));

        specific
            .or_else(general)
            .cloned()
            .or_else(|| match environment {
                Environment::Dev => self.dev_fallback_url.clone(),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_specific_route_wins() {
        let settings = InMemorySettings::new();
        let tenant = TenantId::new("acme");
        settings
            .register(tenant.clone(), Environment::Production, "https://acme.test/all")
            .await;
        settings
            .register_for(
                tenant.clone(),
                Environment::Production,
                EventType::Timeout,
                "https://acme.test/timeouts",
            )
            .await;

        let timeout_url = settings
            .webhook_url(&tenant, Environment::Production, EventType::Timeout)
            .await;
        let payment_url = settings
            .webhook_url(&tenant, Environment::Production, EventType::PaymentResult)
            .await;

        assert_eq!(timeout_url.as_deref(), Some("https://acme.test/timeouts"));
        assert_eq!(payment_url.as_deref(), Some("https://acme.test/all"));
    }

    #[tokio::test]
    async fn fallback_only_applies_in_dev() {
        let settings = InMemorySettings::new().with_dev_fallback("http://localhost:4000/hook");
        let tenant = TenantId::new("unknown");

        let dev = settings
            .webhook_url(&tenant, Environment::Dev, EventType::PaymentResult)
            .await;
        let prod = settings
            .webhook_url(&tenant, Environment::Production, EventType::PaymentResult)
            .await;

        assert_eq!(dev.as_deref(), Some("http://localhost:4000/hook"));
        assert_eq!(prod, None);
    }
}
