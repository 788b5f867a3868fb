mod common;

use axum::http::StatusCode;
use common::*;
use courier_core::classify::sample_payment_result;
use rstest::rstest;
use serde_json::{Value, json};
use tower::ServiceExt;

const NOWHERE: &str = "http://127.0.0.1:9/hook";

fn collection() -> Value {
    json!({
        "TransactionType": "Pay Bill",
        "TransID": "RKTQDM7W6S",
        "TransTime": "20231219120000",
        "TransAmount": "10.00",
        "BusinessShortCode": "600638"
    })
}

#[tokio::test]
async fn health_reports_service() {
    let app = build(config_for(NOWHERE, None)).await;

    let response = app.router().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "courier");
    assert!(body["timestamp"].is_string());
}

#[rstest]
#[case::not_json("{not json")]
#[case::unknown_shape(r#"{"hello": "world"}"#)]
#[tokio::test]
async fn invalid_payloads_are_refused(#[case] raw: &'static str) {
    let app = build(config_for(NOWHERE, None)).await;

    let response = app
        .router()
        .oneshot(post_raw(&format!("/webhook/{TENANT}"), raw))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"ResultCode": 1, "ResultDesc": "Invalid payload format"})
    );
    assert_eq!(app.queue().counts().await.depth(), 0);
}

#[tokio::test]
async fn accepted_callback_is_queued_with_priority() {
    let app = build(config_for(NOWHERE, None)).await;

    let response = app
        .router()
        .oneshot(post_json(
            &format!("/webhook/{TENANT}/validation?env=dev"),
            &collection(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"ResultCode": 0, "ResultDesc": "Success"})
    );
    let lease = app.queue().dequeue().await.unwrap();
    assert_eq!(lease.priority.as_str(), "urgent");
    assert_eq!(lease.job.event.event_type.as_str(), "collection_validation");
}

#[tokio::test]
async fn unknown_tenant_is_still_acknowledged() {
    let app = build(config_for(NOWHERE, None)).await;

    let response = app
        .router()
        .oneshot(post_json("/webhook/stranger", &sample_payment_result()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ResultDesc"], "Accepted");
    assert_eq!(app.queue().counts().await.depth(), 0);
}

#[tokio::test]
async fn saturated_queue_answers_503() {
    let mut config = config_for(NOWHERE, None);
    config.queue.max_depth = 1;
    let app = build(config).await;
    let uri = format!("/webhook/{TENANT}/timeout");

    let first = app
        .router()
        .oneshot(post_json(&uri, &sample_payment_result()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router()
        .oneshot(post_json(&uri, &sample_payment_result()))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(second).await["ResultCode"], 1);
    assert_eq!(app.queue().counts().await.waiting, 1);
}

#[tokio::test]
async fn test_endpoint_echoes_sample() {
    let app = build(config_for(NOWHERE, None)).await;

    let response = app
        .router()
        .oneshot(post_json(&format!("/test/{TENANT}"), &Value::Null))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["tenant_id"], TENANT);
    assert_eq!(body["payload"], sample_payment_result());
    assert_eq!(app.queue().counts().await.depth(), 0);
}

#[tokio::test]
async fn metrics_and_queue_controls() {
    let app = build(config_for(NOWHERE, None)).await;
    app.router()
        .oneshot(post_json(&format!("/webhook/{TENANT}"), &sample_payment_result()))
        .await
        .unwrap();

    let paused = app
        .router()
        .oneshot(post_json("/api/metrics/queue/pause", &Value::Null))
        .await
        .unwrap();
    assert_eq!(paused.status(), StatusCode::OK);

    let snapshot = body_json(app.router().oneshot(get("/api/metrics")).await.unwrap()).await;
    assert_eq!(snapshot["success"], true);
    assert_eq!(snapshot["data"]["paused"], true);
    assert_eq!(snapshot["data"]["queue"]["waiting"], 1);
    assert_eq!(snapshot["data"]["workers"]["total"], 2);

    let history =
        body_json(app.router().oneshot(get("/api/metrics/history?limit=5")).await.unwrap()).await;
    assert_eq!(history["data"].as_array().map(Vec::len), Some(1));

    let workers =
        body_json(app.router().oneshot(get("/api/metrics/workers")).await.unwrap()).await;
    assert_eq!(workers["data"][0]["status"], "idle");

    let bad = app
        .router()
        .oneshot(post_json("/api/metrics/queue/clear", &json!({"scope": "everything"})))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(bad).await["success"], false);

    let cleared = app
        .router()
        .oneshot(post_json("/api/metrics/queue/clear", &json!({"scope": "waiting"})))
        .await
        .unwrap();
    assert_eq!(body_json(cleared).await["data"]["removed"], 1);

    app.router()
        .oneshot(post_json("/api/metrics/queue/resume", &Value::Null))
        .await
        .unwrap();
    assert!(!app.queue().is_paused().await);
}

#[tokio::test]
async fn policy_read_and_update() {
    let app = build(config_for(NOWHERE, None)).await;
    let uri = format!("/api/policies/{TENANT}/staging");

    let current = body_json(app.router().oneshot(get(&uri)).await.unwrap()).await;
    assert_eq!(current["data"]["max_retries"], 3);
    assert_eq!(current["data"]["backoff_strategy"], "exponential");

    let rejected = app
        .router()
        .oneshot(put_json(&uri, &json!({"timeout_ms": 500})))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let updated = app
        .router()
        .oneshot(put_json(&uri, &json!({"max_retries": 5, "backoff_strategy": "linear"})))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let body = body_json(updated).await;
    assert_eq!(body["data"]["max_retries"], 5);
    assert_eq!(body["data"]["backoff_strategy"], "linear");
    assert_eq!(body["data"]["timeout_ms"], 25_000);

    let bad_env = app
        .router()
        .oneshot(get(&format!("/api/policies/{TENANT}/moon")))
        .await
        .unwrap();
    assert_eq!(bad_env.status(), StatusCode::BAD_REQUEST);
}

#[rstest]
#[case::bad_id("/api/dlq/not-an-id", StatusCode::BAD_REQUEST)]
#[case::unknown_id("/api/dlq/dlq-01ARZ3NDEKTSV4RRFFQ69G5FAV", StatusCode::NOT_FOUND)]
#[case::bad_category("/api/dlq?category=cosmic_rays", StatusCode::BAD_REQUEST)]
#[case::empty_list("/api/dlq?tenant_id=nobody", StatusCode::OK)]
#[case::stats("/api/dlq/stats", StatusCode::OK)]
#[case::health("/api/dlq/health", StatusCode::OK)]
#[tokio::test]
async fn dlq_read_routes(#[case] uri: &str, #[case] expected: StatusCode) {
    let app = build(config_for(NOWHERE, None)).await;

    let response = app.router().oneshot(get(uri)).await.unwrap();

    assert_eq!(response.status(), expected);
}

#[tokio::test]
async fn dlq_write_routes_validate_input() {
    let app = build(config_for(NOWHERE, None)).await;

    let empty = app
        .router()
        .oneshot(post_json("/api/dlq/retry", &json!({"ids": []})))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .router()
        .oneshot(post_json(
            "/api/dlq/retry",
            &json!({"ids": ["dlq-01ARZ3NDEKTSV4RRFFQ69G5FAV"]}),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::OK);
    let body = body_json(unknown).await;
    assert_eq!(body["data"]["successful"], json!([]));
    assert_eq!(body["data"]["failed"].as_array().map(Vec::len), Some(1));

    let purged = app
        .router()
        .oneshot(post_json("/api/dlq/purge", &json!({"older_than_ms": 1000})))
        .await
        .unwrap();
    assert_eq!(body_json(purged).await["data"]["purged"], 0);

    let health = body_json(app.router().oneshot(get("/api/dlq/health")).await.unwrap()).await;
    assert_eq!(health["data"]["status"], "healthy");
}
