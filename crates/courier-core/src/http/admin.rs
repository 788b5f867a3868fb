//! Operator routes under `/api`.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use serde_json::Value;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};

use super::AppState;
use super::error::{ApiError, ApiResponse, ok};
use crate::dlq::{BulkRetryResult, DeadLetterRecord, DlqFilter, DlqHealth, DlqStats};
use crate::domain::{DlqId, Environment, ErrorCategory, PolicyUpdate, RetryPolicy, TenantId};
use crate::executor::WorkerHealth;
use crate::metrics::MetricsSnapshot;
use crate::queue::ClearScope;

const DEFAULT_LIST_LIMIT: usize = 50;
const DEFAULT_HISTORY_LIMIT: usize = 20;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn parse<T>(raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

// metrics

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<MetricsSnapshot> {
    Ok(ok(state.metrics.snapshot().await))
}

pub async fn metrics_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<MetricsSnapshot>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(ok(state.metrics.history(limit).await))
}

pub async fn metrics_workers(State(state): State<AppState>) -> ApiResult<Vec<WorkerHealth>> {
    Ok(ok(state.metrics.worker_health().await))
}

pub async fn metrics_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let metrics = state.metrics.clone();
    let interval = tokio::time::interval(metrics.config().stream_interval());
    let stream = IntervalStream::new(interval).then(move |_| {
        let metrics = metrics.clone();
        async move {
            let snapshot = metrics.snapshot().await;
            Event::default().event("metrics").json_data(&snapshot)
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

pub async fn pause(State(state): State<AppState>) -> ApiResult<Value> {
    state.metrics.pause().await;
    Ok(ok(serde_json::json!({ "paused": true })))
}

pub async fn resume(State(state): State<AppState>) -> ApiResult<Value> {
    state.metrics.resume().await;
    Ok(ok(serde_json::json!({ "paused": false })))
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    pub scope: String,
}

pub async fn clear(
    State(state): State<AppState>,
    Json(req): Json<ClearRequest>,
) -> ApiResult<Value> {
    let scope: ClearScope = parse(&req.scope)?;
    let removed = state.metrics.clear(scope).await;
    Ok(ok(serde_json::json!({ "scope": scope, "removed": removed })))
}

// dead letter queue

#[derive(Debug, Default, Deserialize)]
pub struct DlqListQuery {
    pub category: Option<String>,
    pub tenant_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn dlq_stats(State(state): State<AppState>) -> ApiResult<DlqStats> {
    Ok(ok(state.dlq.stats().await))
}

pub async fn dlq_health(State(state): State<AppState>) -> ApiResult<DlqHealth> {
    Ok(ok(state.dlq.health().await))
}

pub async fn dlq_list(
    State(state): State<AppState>,
    Query(query): Query<DlqListQuery>,
) -> ApiResult<Vec<DeadLetterRecord>> {
    let filter = DlqFilter {
        category: query
            .category
            .as_deref()
            .map(parse::<ErrorCategory>)
            .transpose()?,
        tenant_id: query.tenant_id.map(TenantId::new),
    };
    let records = state
        .dlq
        .list(
            &filter,
            query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
            query.offset.unwrap_or(0),
        )
        .await;
    Ok(ok(records))
}

pub async fn dlq_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeadLetterRecord> {
    let dlq_id: DlqId = parse(&id)?;
    let record = state
        .dlq
        .get(dlq_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("dead letter record {dlq_id} not found")))?;
    Ok(ok(record))
}

pub async fn dlq_retry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let dlq_id: DlqId = parse(&id)?;
    let job_id = state.dlq.retry(dlq_id).await?;
    Ok(ok(serde_json::json!({ "dlq_id": dlq_id, "job_id": job_id })))
}

#[derive(Debug, Deserialize)]
pub struct BulkRetryRequest {
    pub ids: Vec<String>,
}

pub async fn dlq_bulk_retry(
    State(state): State<AppState>,
    Json(req): Json<BulkRetryRequest>,
) -> ApiResult<BulkRetryResult> {
    if req.ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".into()));
    }
    let ids = req
        .ids
        .iter()
        .map(|raw| parse::<DlqId>(raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ok(state.dlq.bulk_retry(&ids).await))
}

#[derive(Debug, Default, Deserialize)]
pub struct PurgeRequest {
    /// Defaults to the configured retention.
    pub older_than_ms: Option<u64>,
}

pub async fn dlq_purge(
    State(state): State<AppState>,
    body: Option<Json<PurgeRequest>>,
) -> ApiResult<Value> {
    let age = body
        .and_then(|Json(req)| req.older_than_ms)
        .map(Duration::from_millis)
        .unwrap_or_else(|| state.dlq.config().retention());
    let purged = state.dlq.purge_older_than(age).await;
    Ok(ok(serde_json::json!({ "purged": purged })))
}

// retry policies

pub async fn get_policy(
    State(state): State<AppState>,
    Path((tenant, env)): Path<(String, String)>,
) -> ApiResult<RetryPolicy> {
    let environment: Environment = parse(&env)?;
    let policy = state
        .policies
        .get_or_create(&TenantId::new(tenant), environment)
        .await?;
    Ok(ok(policy))
}

pub async fn put_policy(
    State(state): State<AppState>,
    Path((tenant, env)): Path<(String, String)>,
    Json(update): Json<PolicyUpdate>,
) -> ApiResult<RetryPolicy> {
    let environment: Environment = parse(&env)?;
    let tenant_id = TenantId::new(tenant);
    let policy = state
        .policies
        .update(&tenant_id, environment, &update)
        .await?;
    tracing::info!(
        target: "courier::http",
        tenant_id = %tenant_id,
        environment = %environment,
        max_retries = policy.max_retries,
        "retry policy updated"
    );
    Ok(ok(policy))
}
