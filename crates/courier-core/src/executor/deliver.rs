//! One delivery attempt, start to finish.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::dlq::DeadLetterStore;
use crate::domain::{
    AttemptOutcome, Decider, Decision, DeliveryAttempt, DeliveryJob, DlqId, ErrorCategory,
    RetryPolicy, categorize,
};
use crate::impls::http_transport::USER_AGENT;
use crate::ports::{
    AttemptSink, Clock, DeliveryRequest, DeliveryTransport, IdGenerator, PolicyStore,
};
use crate::queue::{DeliveryQueue, Lease};

/// What happened to a leased job.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Delivered,
    RetryScheduled { delay: Duration },
    DeadLettered { dlq_id: DlqId },
}

/// Everything a worker needs to run one attempt.
#[derive(Clone)]
pub struct Deliverer {
    pub queue: Arc<dyn DeliveryQueue>,
    pub policies: Arc<dyn PolicyStore>,
    pub transport: Arc<dyn DeliveryTransport>,
    pub decider: Arc<dyn Decider>,
    pub dlq: Arc<DeadLetterStore>,
    pub sink: Arc<dyn AttemptSink>,
    pub ids: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
}

/// Outbound headers for one attempt.
pub fn outbound_headers(job: &DeliveryJob) -> Vec<(String, String)> {
    vec![
        ("Content-Type".into(), "application/json".into()),
        ("User-Agent".into(), USER_AGENT.into()),
        ("X-Webhook-Event".into(), job.event.event_type.to_string()),
        ("X-Webhook-ID".into(), job.event.id.to_string()),
        ("X-Webhook-Timestamp".into(), job.event.received_at.to_rfc3339()),
        ("X-Webhook-Attempt".into(), job.attempts_made.to_string()),
    ]
}

impl Deliverer {
    async fn policy_for(&self, job: &DeliveryJob) -> RetryPolicy {
        match self
            .policies
            .get_or_create(&job.event.tenant_id, job.event.environment)
            .await
        {
            Ok(policy) => policy,
            Err(e) => {
                tracing::warn!(
                    target: "courier::delivery",
                    tenant_id = %job.event.tenant_id,
                    error = %e,
                    "policy lookup failed, using defaults"
                );
                RetryPolicy::default()
            }
        }
    }

    async fn attempt(&self, job: &DeliveryJob, policy: &RetryPolicy) -> DeliveryAttempt {
        let request = DeliveryRequest {
            url: job.target_url.clone(),
            body: job.event.raw_payload.clone(),
            headers: outbound_headers(job),
            timeout: policy.timeout(),
        };

        let attempted_at = self.clock.now();
        let started = Instant::now();
        let result = self.transport.post(request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut attempt = DeliveryAttempt {
            attempt_id: self.ids.attempt_id(),
            job_id: job.job_id,
            attempt_number: job.attempts_made,
            target_url: job.target_url.clone(),
            attempted_at,
            duration_ms,
            outcome: AttemptOutcome::Failed,
            response_code: None,
            response_body: None,
            error_message: None,
            error_category: None,
            retryable: false,
        };
        match result {
            Ok(response) if response.is_success() => {
                attempt.outcome = AttemptOutcome::Delivered;
                attempt.response_code = Some(response.status);
                attempt.response_body = Some(response.body);
            }
            Ok(response) => {
                attempt.response_code = Some(response.status);
                attempt.response_body = Some(response.body);
                attempt.error_message = Some(format!("HTTP {}", response.status));
            }
            Err(e) => {
                attempt.error_message = Some(e.to_string());
            }
        }
        if !attempt.is_delivered() {
            attempt.error_category = Some(categorize(
                attempt.response_code,
                attempt.error_message.as_deref(),
            ));
        }
        attempt
    }

    async fn record(&self, job: &DeliveryJob, attempt: &DeliveryAttempt) {
        if let Err(e) = self.sink.record(job, attempt).await {
            tracing::warn!(
                target: "courier::delivery",
                attempt_id = %attempt.attempt_id,
                error = %e,
                "failed to record attempt"
            );
        }
    }

    async fn dead_letter(
        &self,
        mut job: DeliveryJob,
        category: ErrorCategory,
        reason: String,
    ) -> DeliveryOutcome {
        let job_id = job.job_id;
        let history = std::mem::take(&mut job.attempts);
        let dlq_id = self.dlq.move_to_dlq(job, history, category, reason).await;
        self.queue.fail(job_id).await;
        DeliveryOutcome::DeadLettered { dlq_id }
    }

    /// Run one attempt for a leased job and hand the job to wherever it goes
    /// next: finished, delayed re-enqueue, or the dead letter store.
    pub async fn process(&self, lease: Lease) -> DeliveryOutcome {
        let Lease { mut job, priority } = lease;
        let policy = self.policy_for(&job).await;

        job.attempts_made += 1;
        let mut attempt = self.attempt(&job, &policy).await;

        if attempt.is_delivered() {
            tracing::info!(
                target: "courier::delivery",
                job_id = %job.job_id,
                tenant_id = %job.event.tenant_id,
                event_type = %job.event.event_type,
                attempt = job.attempts_made,
                response_code = ?attempt.response_code,
                duration_ms = attempt.duration_ms,
                "webhook delivered"
            );
            self.record(&job, &attempt).await;
            job.record_attempt(attempt);
            self.queue.complete(job.job_id).await;
            return DeliveryOutcome::Delivered;
        }

        let decision = self.decider.decide(&job, &attempt, &policy);
        attempt.error_category = Some(decision.category());
        attempt.retryable = decision.is_retry();
        tracing::warn!(
            target: "courier::delivery",
            job_id = %job.job_id,
            tenant_id = %job.event.tenant_id,
            attempt = job.attempts_made,
            response_code = ?attempt.response_code,
            error = attempt.error_message.as_deref().unwrap_or_default(),
            category = %decision.category(),
            retry = decision.is_retry(),
            "delivery attempt failed"
        );
        self.record(&job, &attempt).await;
        job.record_attempt(attempt);

        match decision {
            Decision::Retry { delay, category } => {
                let job_id = job.job_id;
                match self
                    .queue
                    .enqueue_delayed(job.clone(), priority, delay)
                    .await
                {
                    Ok(_) => {
                        tracing::info!(
                            target: "courier::delivery",
                            job_id = %job_id,
                            delay_ms = delay.as_millis() as u64,
                            "retry scheduled"
                        );
                        DeliveryOutcome::RetryScheduled { delay }
                    }
                    Err(e) => {
                        self.dead_letter(job, category, format!("could not reschedule: {e}"))
                            .await
                    }
                }
            }
            Decision::DeadLetter { category, reason } => {
                self.dead_letter(job, category, reason).await
            }
        }
    }
}
