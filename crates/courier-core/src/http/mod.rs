//! HTTP surface: gateway ingress plus the operator API.

mod admin;
mod error;
mod webhook;

pub use error::{ApiError, ApiResponse, ok};
pub use webhook::{GatewayReply, SERVICE_NAME, source_addr};

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::dlq::DeadLetterStore;
use crate::ingress::IngressService;
use crate::metrics::QueueMetrics;
use crate::ports::{Clock, PolicyStore};

/// Shared handles for every handler.
#[derive(Clone)]
pub struct AppState {
    pub ingress: Arc<IngressService>,
    pub metrics: Arc<QueueMetrics>,
    pub dlq: Arc<DeadLetterStore>,
    pub policies: Arc<dyn PolicyStore>,
    pub clock: Arc<dyn Clock>,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/metrics", get(admin::metrics))
        .route("/metrics/history", get(admin::metrics_history))
        .route("/metrics/workers", get(admin::metrics_workers))
        .route("/metrics/stream", get(admin::metrics_stream))
        .route("/metrics/queue/pause", post(admin::pause))
        .route("/metrics/queue/resume", post(admin::resume))
        .route("/metrics/queue/clear", post(admin::clear))
        .route("/dlq", get(admin::dlq_list))
        .route("/dlq/stats", get(admin::dlq_stats))
        .route("/dlq/health", get(admin::dlq_health))
        .route("/dlq/retry", post(admin::dlq_bulk_retry))
        .route("/dlq/purge", post(admin::dlq_purge))
        .route("/dlq/:id", get(admin::dlq_get))
        .route("/dlq/:id/retry", post(admin::dlq_retry))
        .route(
            "/policies/:tenant/:env",
            get(admin::get_policy).put(admin::put_policy),
        );

    Router::new()
        .route("/health", get(webhook::health))
        .route("/webhook/:tenant", post(webhook::webhook))
        .route("/webhook/:tenant/validation", post(webhook::validation))
        .route("/webhook/:tenant/timeout", post(webhook::timeout))
        .route("/test/:tenant", post(webhook::test_webhook))
        .nest("/api", api)
        .with_state(state)
}
