use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::board::WorkerBoard;
use super::deliver::{Deliverer, DeliveryOutcome};

/// WorkerPool のハンドル
/// - `request_shutdown()` で新しい dequeue を止める（実行中の attempt は最後まで走る）
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    board: Arc<WorkerBoard>,
}

impl WorkerPool {
    /// 1 つの deliverer を共有する `n` 個のワーカーを起動
    pub fn spawn(n: usize, deliverer: Deliverer, board: Arc<WorkerBoard>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let deliverer = Arc::new(deliverer);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let d = Arc::clone(&deliverer);
            let b = Arc::clone(&board);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, d, b, &mut rx).await;
            });
            joins.push(join);
        }

        tracing::info!(target: "courier::delivery", workers = n, "worker pool started");
        Self {
            shutdown_tx,
            joins,
            board,
        }
    }

    pub fn board(&self) -> Arc<WorkerBoard> {
        Arc::clone(&self.board)
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// shutdown して全ワーカーの終了を待つ
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
        tracing::info!(target: "courier::delivery", "worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    deliverer: Arc<Deliverer>,
    board: Arc<WorkerBoard>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // dequeue は待つ可能性があるので select で shutdown と競合させる
        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                // pool handle dropped
                if changed.is_err() {
                    break;
                }
                continue;
            }
            lease = deliverer.queue.dequeue() => lease,
        };

        // None はキューが shutdown 済み
        let Some(lease) = lease else {
            break;
        };

        let job_id = lease.job.job_id;
        board
            .mark_busy(worker_id, job_id, deliverer.clock.now())
            .await;
        let outcome = deliverer.process(lease).await;
        board
            .mark_idle(worker_id, matches!(outcome, DeliveryOutcome::Delivered))
            .await;
    }
    tracing::debug!(target: "courier::delivery", worker_id, "worker exited");
}
