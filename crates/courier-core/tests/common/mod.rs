#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use courier_core::config::TenantRoute;
use courier_core::domain::{Environment, ErrorCategory, RetryPolicy, TenantId};
use courier_core::retry::{CategoryRule, NoJitter, RetryOrchestrator, RetryTable};
use courier_core::{App, AppBuilder, CourierConfig};
use serde_json::Value;

pub const TENANT: &str = "tenant-t";

/// Same shape as the default table with 100ms base delays and no jitter.
pub fn fast_decider() -> Arc<RetryOrchestrator> {
    use ErrorCategory::*;
    let table = RetryTable::new(HashMap::from([
        (Network, CategoryRule::retry(5, 2.0, 100)),
        (Timeout, CategoryRule::retry(3, 1.5, 100)),
        (ClientError, CategoryRule::terminal()),
        (ServerError, CategoryRule::retry(4, 2.0, 100)),
        (Authentication, CategoryRule::terminal()),
        (RateLimit, CategoryRule::retry(3, 3.0, 100)),
        (Unknown, CategoryRule::retry(3, 2.0, 100)),
    ]));
    Arc::new(RetryOrchestrator::new(table, Arc::new(NoJitter)))
}

/// One dev route for [`TENANT`] pointing at `url`.
pub fn config_for(url: &str, policy: Option<RetryPolicy>) -> CourierConfig {
    let mut config = CourierConfig::default();
    config.workers.count = 2;
    config.metrics.sample_interval_secs = 0;
    config.tenants.push(TenantRoute {
        tenant: TenantId::new(TENANT),
        environment: Environment::Dev,
        event_type: None,
        url: url.to_string(),
        policy,
    });
    config
}

pub async fn build(config: CourierConfig) -> App {
    AppBuilder::new(config)
        .with_decider(fast_decider())
        .build()
        .await
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_raw(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn put_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `check` every 20ms until it holds or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
