//! Attempt sink that writes each attempt to the log.

use async_trait::async_trait;

use crate::domain::{DeliveryAttempt, DeliveryJob};
use crate::ports::{AttemptSink, SinkError};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAttemptSink;

#[async_trait]
impl AttemptSink for TracingAttemptSink {
    async fn record(&self, job: &DeliveryJob, attempt: &DeliveryAttempt) -> Result<(), SinkError> {
        tracing::debug!(
            target: "courier::attempts",
            attempt_id = %attempt.attempt_id,
            job_id = %attempt.job_id,
            tenant_id = %job.event.tenant_id,
            event_type = %job.event.event_type,
            attempt_number = attempt.attempt_number,
            outcome = ?attempt.outcome,
            response_code = ?attempt.response_code,
            error_category = ?attempt.error_category,
            duration_ms = attempt.duration_ms,
            "delivery attempt recorded"
        );
        Ok(())
    }
}
