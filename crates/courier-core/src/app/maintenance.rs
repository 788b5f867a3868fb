//! Background housekeeping: DLQ retention and metrics sampling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::dlq::DeadLetterStore;
use crate::metrics::QueueMetrics;

/// Run `tick` every `period` until the shutdown flag flips. The first tick
/// fires after one full period.
async fn every<F, Fut>(period: Duration, mut shutdown_rx: watch::Receiver<bool>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = interval.tick() => tick().await,
        }
    }
}

/// Purge dead letter records older than the configured retention.
/// Returns `None` for a zero purge interval.
pub fn spawn_retention(
    dlq: Arc<DeadLetterStore>,
    shutdown_rx: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    let period = dlq.config().purge_interval();
    if period.is_zero() {
        return None;
    }
    let retention = dlq.config().retention();
    Some(tokio::spawn(async move {
        every(period, shutdown_rx, || {
            let dlq = Arc::clone(&dlq);
            async move {
                dlq.purge_older_than(retention).await;
            }
        })
        .await;
    }))
}

/// Feed the metrics history ring. Returns `None` when sampling is disabled.
pub fn spawn_sampler(
    metrics: Arc<QueueMetrics>,
    shutdown_rx: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    let secs = metrics.config().sample_interval_secs;
    if secs == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        every(Duration::from_secs(secs), shutdown_rx, || {
            let metrics = Arc::clone(&metrics);
            async move {
                metrics.snapshot().await;
            }
        })
        .await;
    }))
}
