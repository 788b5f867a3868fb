//! Delivery executor: a fixed pool of workers draining the queue.

mod board;
mod deliver;
mod pool;

pub use board::{WorkerBoard, WorkerHealth, WorkerStatus};
pub use deliver::{Deliverer, DeliveryOutcome, outbound_headers};
pub use pool::WorkerPool;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::config::{DlqConfig, QueueConfig};
    use crate::dlq::DeadLetterStore;
    use crate::domain::{
        DeliveryJob, Environment, ErrorCategory, EventId, EventType, InboundEvent, JobId,
        Priority, TenantId,
    };
    use crate::impls::{InMemoryPolicyStore, TracingAttemptSink};
    use crate::ports::{
        DeliveryRequest, DeliveryResponse, DeliveryTransport, SystemClock, TransportError,
        UlidGenerator,
    };
    use crate::queue::{DeliveryQueue, InMemoryQueue};
    use crate::retry::{NoJitter, RetryOrchestrator, RetryTable};

    /// Replays canned results and remembers every request.
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<DeliveryResponse, TransportError>>>,
        seen: Mutex<Vec<DeliveryRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<DeliveryResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl DeliveryTransport for ScriptedTransport {
        async fn post(&self, request: DeliveryRequest) -> Result<DeliveryResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(DeliveryResponse {
                    status: 200,
                    body: String::new(),
                }))
        }
    }

    fn status(code: u16) -> Result<DeliveryResponse, TransportError> {
        Ok(DeliveryResponse {
            status: code,
            body: format!("status {code}"),
        })
    }

    fn deliverer(transport: Arc<ScriptedTransport>) -> (Deliverer, Arc<InMemoryQueue>) {
        let clock = Arc::new(SystemClock);
        let queue = Arc::new(InMemoryQueue::new(&QueueConfig::default()));
        let ids = Arc::new(UlidGenerator::new(SystemClock));
        let dlq = Arc::new(DeadLetterStore::new(
            DlqConfig::default(),
            queue.clone(),
            ids.clone(),
            clock.clone(),
        ));
        let d = Deliverer {
            queue: queue.clone(),
            policies: Arc::new(InMemoryPolicyStore::new()),
            transport,
            decider: Arc::new(RetryOrchestrator::new(RetryTable::default(), Arc::new(NoJitter))),
            dlq,
            sink: Arc::new(TracingAttemptSink),
            ids,
            clock,
        };
        (d, queue)
    }

    fn job() -> DeliveryJob {
        let event = InboundEvent {
            id: EventId::generate(),
            tenant_id: TenantId::new("acme"),
            event_type: EventType::CollectionConfirmation,
            raw_payload: serde_json::json!({"TransID": "X1"}),
            received_at: Utc::now(),
            environment: Environment::Dev,
        };
        DeliveryJob::new(JobId::generate(), event, "http://acme.test/hook", 3, Utc::now())
    }

    async fn lease(queue: &InMemoryQueue, j: DeliveryJob) -> crate::queue::Lease {
        queue.enqueue(j, Priority::Normal).await.unwrap();
        queue.dequeue().await.unwrap()
    }

    #[tokio::test]
    async fn success_completes_the_job() {
        let transport = Arc::new(ScriptedTransport::new(vec![status(204)]));
        let (d, queue) = deliverer(transport.clone());
        let j = job();
        let l = lease(&queue, j.clone()).await;

        assert_eq!(d.process(l).await, DeliveryOutcome::Delivered);

        let counts = queue.counts().await;
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.in_flight, 0);

        let seen = transport.seen.lock().unwrap();
        let req = &seen[0];
        assert_eq!(req.url, "http://acme.test/hook");
        assert_eq!(req.body, j.event.raw_payload);
        assert_eq!(req.timeout, Duration::from_millis(25_000));
        let header = |name: &str| {
            req.headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(header("X-Webhook-Event").as_deref(), Some("collection_confirmation"));
        assert_eq!(header("X-Webhook-Attempt").as_deref(), Some("1"));
        assert_eq!(header("X-Webhook-ID"), Some(j.event.id.to_string()));
    }

    #[tokio::test]
    async fn forbidden_goes_straight_to_dlq() {
        let transport = Arc::new(ScriptedTransport::new(vec![status(403)]));
        let (d, queue) = deliverer(transport);
        let l = lease(&queue, job()).await;

        let DeliveryOutcome::DeadLettered { dlq_id } = d.process(l).await else {
            panic!("expected dead letter");
        };

        let record = d.dlq.get(dlq_id).await.unwrap();
        assert_eq!(record.last_error_category, ErrorCategory::Authentication);
        assert_eq!(record.original_job.attempts_made, 1);
        assert_eq!(record.failure_history.len(), 1);
        assert_eq!(record.failure_history[0].response_code, Some(403));
        assert!(!record.failure_history[0].retryable);
        assert_eq!(queue.counts().await.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_is_rescheduled_with_history() {
        let transport = Arc::new(ScriptedTransport::new(vec![status(500), status(200)]));
        let (d, queue) = deliverer(transport);
        let l = lease(&queue, job()).await;

        let outcome = d.process(l).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::RetryScheduled {
                delay: Duration::from_millis(1_500)
            }
        );
        assert_eq!(queue.counts().await.delayed, 1);

        let again = queue.dequeue().await.unwrap();
        assert_eq!(again.job.attempts_made, 1);
        assert_eq!(again.job.attempts.len(), 1);
        assert_eq!(
            again.job.attempts[0].error_category,
            Some(ErrorCategory::ServerError)
        );
        assert!(again.job.attempts[0].retryable);

        assert_eq!(d.process(again).await, DeliveryOutcome::Delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_categorized() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Connect(
            "tcp connect error".into(),
        ))]));
        let (d, queue) = deliverer(transport);
        let l = lease(&queue, job()).await;

        assert!(matches!(
            d.process(l).await,
            DeliveryOutcome::RetryScheduled { .. }
        ));
        let again = tokio::time::timeout(Duration::from_secs(5), queue.dequeue())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            again.job.attempts[0].error_category,
            Some(ErrorCategory::Network)
        );
    }

    #[tokio::test]
    async fn pool_drains_queue_and_stops() {
        let transport = Arc::new(ScriptedTransport::default());
        let (d, queue) = deliverer(transport.clone());
        for _ in 0..10 {
            queue.enqueue(job(), Priority::Normal).await.unwrap();
        }

        let board = Arc::new(WorkerBoard::new(3));
        let pool = WorkerPool::spawn(3, d, board.clone());
        assert_eq!(pool.len(), 3);

        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.counts().await.completed < 10 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        pool.shutdown_and_join().await;
        let processed: u64 = board.snapshot().await.iter().map(|w| w.processed).sum();
        assert_eq!(processed, 10);
        assert_eq!(transport.seen.lock().unwrap().len(), 10);
    }
}
