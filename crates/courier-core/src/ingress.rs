//! Inbound callback intake: classify, resolve the endpoint, enqueue.
//!
//! The gateway retries anything that does not look like success, so only
//! malformed payloads and a full queue are reported back. Everything else is
//! logged and acknowledged.

use std::sync::Arc;

use serde_json::Value;

use crate::classify::{Classification, ClassifyHint, SourceCheck, SourceFilter, classify};
use crate::domain::{DeliveryJob, Environment, EventType, InboundEvent, JobId, Priority, TenantId};
use crate::ports::{Clock, IdGenerator, PolicyStore, SettingsLookup};
use crate::queue::{DeliveryQueue, QueueError};

#[derive(Debug, Clone)]
pub struct IngressRequest {
    pub tenant_id: TenantId,
    pub environment: Environment,
    pub source_addr: Option<String>,
    pub payload: Value,
    pub hint: Option<ClassifyHint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressOutcome {
    Queued {
        job_id: JobId,
        event_type: EventType,
        priority: Priority,
    },
    /// Unrecognized payload. Never queued.
    Rejected { reason: String },
    Saturated { max_depth: usize },
    /// Acknowledged but dropped; the reason has been logged.
    Accepted { reason: String },
}

/// Queue tier for each event kind. Validation callbacks block a customer
/// payment, so they go first.
pub fn priority_for(event_type: EventType) -> Priority {
    match event_type {
        EventType::CollectionValidation => Priority::Urgent,
        EventType::PaymentResult => Priority::High,
        EventType::CollectionConfirmation => Priority::Normal,
        EventType::Timeout => Priority::Low,
    }
}

pub struct IngressService {
    filter: SourceFilter,
    settings: Arc<dyn SettingsLookup>,
    policies: Arc<dyn PolicyStore>,
    queue: Arc<dyn DeliveryQueue>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl IngressService {
    pub fn new(
        filter: SourceFilter,
        settings: Arc<dyn SettingsLookup>,
        policies: Arc<dyn PolicyStore>,
        queue: Arc<dyn DeliveryQueue>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            filter,
            settings,
            policies,
            queue,
            ids,
            clock,
        }
    }

    pub async fn accept(&self, request: IngressRequest) -> IngressOutcome {
        let IngressRequest {
            tenant_id,
            environment,
            source_addr,
            payload,
            hint,
        } = request;

        if let SourceCheck::Rejected { reason } =
            self.filter.check(source_addr.as_deref(), environment)
        {
            tracing::warn!(
                target: "courier::ingress",
                tenant_id = %tenant_id,
                source = source_addr.as_deref().unwrap_or("-"),
                reason = %reason,
                "callback from outside allowed ranges"
            );
        }

        let event_type = match classify(&payload, hint) {
            Classification::Valid { event_type } => event_type,
            Classification::Invalid { reason } => {
                tracing::warn!(
                    target: "courier::ingress",
                    tenant_id = %tenant_id,
                    reason = %reason,
                    "rejected callback"
                );
                return IngressOutcome::Rejected { reason };
            }
        };

        let Some(target_url) = self
            .settings
            .webhook_url(&tenant_id, environment, event_type)
            .await
        else {
            return self.accepted(&tenant_id, "no webhook endpoint registered");
        };

        let policy = match self.policies.get_or_create(&tenant_id, environment).await {
            Ok(policy) => policy,
            Err(e) => return self.accepted(&tenant_id, &format!("policy lookup failed: {e}")),
        };

        let now = self.clock.now();
        let event = InboundEvent {
            id: self.ids.event_id(),
            tenant_id: tenant_id.clone(),
            event_type,
            raw_payload: payload,
            received_at: now,
            environment,
        };
        let job = DeliveryJob::new(
            self.ids.job_id(),
            event,
            target_url,
            policy.max_retries.max(1),
            now,
        );
        let job_id = job.job_id;
        let priority = priority_for(event_type);

        match self.queue.enqueue(job, priority).await {
            Ok(_) => {
                tracing::info!(
                    target: "courier::ingress",
                    tenant_id = %tenant_id,
                    environment = %environment,
                    event_type = %event_type,
                    job_id = %job_id,
                    priority = %priority,
                    "callback queued"
                );
                IngressOutcome::Queued {
                    job_id,
                    event_type,
                    priority,
                }
            }
            Err(QueueError::Saturated { max_depth }) => {
                tracing::error!(
                    target: "courier::ingress",
                    tenant_id = %tenant_id,
                    max_depth,
                    "queue saturated, refusing callback"
                );
                IngressOutcome::Saturated { max_depth }
            }
            Err(e) => self.accepted(&tenant_id, &e.to_string()),
        }
    }

    fn accepted(&self, tenant_id: &TenantId, reason: &str) -> IngressOutcome {
        tracing::error!(
            target: "courier::ingress",
            tenant_id = %tenant_id,
            reason,
            "callback acknowledged but not queued"
        );
        IngressOutcome::Accepted {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    use crate::classify::{parse_ranges, sample_payment_result};
    use crate::config::QueueConfig;
    use crate::domain::{PolicyError, PolicyUpdate, RetryPolicy};
    use crate::impls::{InMemoryPolicyStore, InMemorySettings};
    use crate::ports::{SystemClock, UlidGenerator};
    use crate::queue::InMemoryQueue;

    struct BrokenPolicies;

    #[async_trait::async_trait]
    impl PolicyStore for BrokenPolicies {
        async fn get_or_create(
            &self,
            _: &TenantId,
            _: Environment,
        ) -> Result<RetryPolicy, PolicyError> {
            Err(PolicyError::Storage("down".into()))
        }

        async fn update(
            &self,
            _: &TenantId,
            _: Environment,
            _: &PolicyUpdate,
        ) -> Result<RetryPolicy, PolicyError> {
            Err(PolicyError::Storage("down".into()))
        }
    }

    fn collection() -> Value {
        json!({
            "TransactionType": "Pay Bill",
            "TransID": "RKTQDM7W6S",
            "TransTime": "20231219120000",
            "TransAmount": "10.00",
            "BusinessShortCode": "600638"
        })
    }

    async fn service_with(
        max_depth: usize,
        policies: Arc<dyn PolicyStore>,
    ) -> (IngressService, Arc<InMemoryQueue>) {
        let settings = InMemorySettings::new();
        settings
            .register(TenantId::new("acme"), Environment::Dev, "http://acme.test/hook")
            .await;
        settings
            .register(
                TenantId::new("acme"),
                Environment::Production,
                "https://acme.test/hook",
            )
            .await;
        let queue = Arc::new(InMemoryQueue::new(&QueueConfig {
            max_depth,
            ..QueueConfig::default()
        }));
        let filter = SourceFilter::new(parse_ranges(&["196.201.214.0/24"]).unwrap());
        let service = IngressService::new(
            filter,
            Arc::new(settings),
            policies,
            queue.clone(),
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
        );
        (service, queue)
    }

    async fn service(max_depth: usize) -> (IngressService, Arc<InMemoryQueue>) {
        service_with(max_depth, Arc::new(InMemoryPolicyStore::new())).await
    }

    fn request(tenant: &str, payload: Value, hint: Option<ClassifyHint>) -> IngressRequest {
        IngressRequest {
            tenant_id: TenantId::new(tenant),
            environment: Environment::Dev,
            source_addr: Some("10.0.0.1".into()),
            payload,
            hint,
        }
    }

    #[rstest]
    #[case::payment(sample_payment_result(), None, EventType::PaymentResult, Priority::High)]
    #[case::timeout(
        sample_payment_result(),
        Some(ClassifyHint::Timeout),
        EventType::Timeout,
        Priority::Low
    )]
    #[case::confirmation(collection(), None, EventType::CollectionConfirmation, Priority::Normal)]
    #[case::validation(
        collection(),
        Some(ClassifyHint::Validation),
        EventType::CollectionValidation,
        Priority::Urgent
    )]
    #[tokio::test]
    async fn valid_callbacks_are_queued_by_type(
        #[case] payload: Value,
        #[case] hint: Option<ClassifyHint>,
        #[case] expected_type: EventType,
        #[case] expected_priority: Priority,
    ) {
        let (service, queue) = service(10).await;

        let outcome = service.accept(request("acme", payload, hint)).await;

        let IngressOutcome::Queued {
            event_type,
            priority,
            job_id,
        } = outcome
        else {
            panic!("expected queued, got {outcome:?}");
        };
        assert_eq!(event_type, expected_type);
        assert_eq!(priority, expected_priority);

        let lease = queue.dequeue().await.unwrap();
        assert_eq!(lease.job.job_id, job_id);
        assert_eq!(lease.priority, expected_priority);
        assert_eq!(lease.job.target_url, "http://acme.test/hook");
        assert_eq!(lease.job.max_attempts, 3);
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_and_not_queued() {
        let (service, queue) = service(10).await;

        let outcome = service
            .accept(request("acme", json!({"hello": "world"}), None))
            .await;

        assert_eq!(
            outcome,
            IngressOutcome::Rejected {
                reason: "Invalid payload format".into()
            }
        );
        assert_eq!(queue.counts().await.depth(), 0);
    }

    #[tokio::test]
    async fn unknown_tenant_is_acknowledged_without_queueing() {
        let (service, queue) = service(10).await;

        let outcome = service
            .accept(request("nobody", sample_payment_result(), None))
            .await;

        assert!(matches!(outcome, IngressOutcome::Accepted { .. }));
        assert_eq!(queue.counts().await.depth(), 0);
    }

    #[tokio::test]
    async fn policy_failure_is_acknowledged() {
        let (service, _queue) = service_with(10, Arc::new(BrokenPolicies)).await;

        let outcome = service
            .accept(request("acme", sample_payment_result(), None))
            .await;

        assert!(
            matches!(outcome, IngressOutcome::Accepted { ref reason } if reason.contains("down"))
        );
    }

    #[tokio::test]
    async fn full_queue_reports_saturation() {
        let (service, queue) = service(1).await;
        let first = service
            .accept(request("acme", sample_payment_result(), None))
            .await;
        assert!(matches!(first, IngressOutcome::Queued { .. }));

        let second = service
            .accept(request("acme", sample_payment_result(), None))
            .await;

        assert_eq!(second, IngressOutcome::Saturated { max_depth: 1 });
        assert_eq!(queue.counts().await.waiting, 1);
    }

    #[rstest]
    #[case::outside(Some("10.0.0.1"))]
    #[case::missing(None)]
    #[case::inside(Some("196.201.214.20"))]
    #[tokio::test]
    async fn source_check_never_blocks_production(#[case] source: Option<&str>) {
        let (service, queue) = service(10).await;
        let req = IngressRequest {
            environment: Environment::Production,
            source_addr: source.map(str::to_string),
            ..request("acme", sample_payment_result(), None)
        };

        let outcome = service.accept(req).await;

        assert!(matches!(outcome, IngressOutcome::Queued { .. }));
        let lease = queue.dequeue().await.unwrap();
        assert_eq!(lease.job.target_url, "https://acme.test/hook");
    }
}
