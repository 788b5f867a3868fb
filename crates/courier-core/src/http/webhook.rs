//! Gateway-facing routes.
//!
//! Replies use the gateway's own `{ResultCode, ResultDesc}` shape.

use std::net::SocketAddr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AppState;
use crate::classify::{ClassifyHint, INVALID_PAYLOAD, sample_payment_result};
use crate::domain::{Environment, TenantId};
use crate::ingress::{IngressOutcome, IngressRequest};

pub const SERVICE_NAME: &str = "courier";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayReply {
    pub result_code: u8,
    pub result_desc: String,
}

impl GatewayReply {
    fn ack(desc: &str) -> Self {
        Self {
            result_code: 0,
            result_desc: desc.to_string(),
        }
    }

    fn refuse(desc: &str) -> Self {
        Self {
            result_code: 1,
            result_desc: desc.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    pub env: Option<String>,
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the socket peer.
pub fn source_addr(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    if let Some(forwarded) = header("x-forwarded-for")
        && let Some(first) = forwarded.split(',').next()
    {
        return Some(first.trim().to_string());
    }
    if let Some(real) = header("x-real-ip") {
        return Some(real.to_string());
    }
    peer.map(|p| p.ip().to_string())
}

fn environment(tenant_id: &TenantId, query: &WebhookQuery) -> Environment {
    match query.env.as_deref().map(str::parse::<Environment>) {
        None => Environment::default(),
        Some(Ok(env)) => env,
        Some(Err(e)) => {
            tracing::warn!(
                target: "courier::ingress",
                tenant_id = %tenant_id,
                error = %e,
                "unknown environment, using dev"
            );
            Environment::default()
        }
    }
}

async fn receive(
    state: AppState,
    tenant: String,
    query: WebhookQuery,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
    hint: Option<ClassifyHint>,
) -> Response {
    let tenant_id = TenantId::new(tenant);
    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        tracing::warn!(target: "courier::ingress", tenant_id = %tenant_id, "body is not JSON");
        return (
            StatusCode::BAD_REQUEST,
            Json(GatewayReply::refuse(INVALID_PAYLOAD)),
        )
            .into_response();
    };

    let request = IngressRequest {
        environment: environment(&tenant_id, &query),
        source_addr: source_addr(&headers, peer.map(|ConnectInfo(addr)| addr)),
        tenant_id,
        payload,
        hint,
    };

    match state.ingress.accept(request).await {
        IngressOutcome::Queued { .. } => Json(GatewayReply::ack("Success")).into_response(),
        IngressOutcome::Accepted { .. } => Json(GatewayReply::ack("Accepted")).into_response(),
        IngressOutcome::Rejected { reason } => {
            (StatusCode::BAD_REQUEST, Json(GatewayReply::refuse(&reason))).into_response()
        }
        IngressOutcome::Saturated { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(GatewayReply::refuse("queue saturated")),
        )
            .into_response(),
    }
}

pub async fn webhook(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(query): Query<WebhookQuery>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receive(state, tenant, query, headers, peer, body, None).await
}

pub async fn validation(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(query): Query<WebhookQuery>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receive(
        state,
        tenant,
        query,
        headers,
        peer,
        body,
        Some(ClassifyHint::Validation),
    )
    .await
}

pub async fn timeout(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(query): Query<WebhookQuery>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receive(
        state,
        tenant,
        query,
        headers,
        peer,
        body,
        Some(ClassifyHint::Timeout),
    )
    .await
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "timestamp": state.clock.now(),
    }))
}

/// Echo the canned sample for a tenant; nothing is queued.
pub async fn test_webhook(Path(tenant): Path<String>) -> Json<Value> {
    tracing::info!(target: "courier::ingress", tenant_id = %tenant, "test webhook requested");
    Json(serde_json::json!({
        "message": "Test webhook would be processed",
        "payload": sample_payment_result(),
        "tenant_id": tenant,
    }))
}
