//! InMemoryQueue - インメモリのキュー実装

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::{ClearScope, DeliveryQueue, Lease, QueueError};
use crate::config::QueueConfig;
use crate::domain::{DeliveryJob, JobId, Priority};
use crate::observability::{FinishOutcome, FinishedJob, QueueCounts};
use crate::ports::{Clock, SystemClock};

/// ready heap のエントリ。優先度が高い順、同じなら sequence 順（FIFO）。
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReadyEntry {
    priority: Priority,
    seq: u64,
    job_id: JobId,
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// delayed heap のエントリ
///
/// 順序を逆にして BinaryHeap を min-heap（早い順）として使う。
#[derive(Debug, Clone, PartialEq, Eq)]
struct DelayedEntry {
    ready_at: Instant,
    seq: u64,
    job_id: JobId,
}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Waiting,
    Delayed,
    InFlight { since: Instant },
}

struct QueuedJob {
    job: DeliveryJob,
    priority: Priority,
    slot: Slot,
    /// 有効な heap エントリと一致する値。同じ ID の古いエントリは pop 時に読み飛ばす。
    seq: u64,
}

/// キューの内部状態
struct InMemoryQueueState {
    /// waiting / delayed / in-flight の job の正本
    jobs: HashMap<JobId, QueuedJob>,

    ready: BinaryHeap<ReadyEntry>,

    delayed: BinaryHeap<DelayedEntry>,

    /// 終了した job の上限つきログ（古い順）
    finished: VecDeque<FinishedJob>,

    next_seq: u64,
    paused: bool,
    shutdown: bool,
    max_depth: usize,
    finished_capacity: usize,
}

impl InMemoryQueueState {
    fn new(config: &QueueConfig) -> Self {
        Self {
            jobs: HashMap::new(),
            ready: BinaryHeap::new(),
            delayed: BinaryHeap::new(),
            finished: VecDeque::new(),
            next_seq: 0,
            paused: false,
            shutdown: false,
            max_depth: config.max_depth,
            finished_capacity: config.finished_capacity,
        }
    }

    fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn push_ready(&mut self, job_id: JobId) {
        let seq = self.allocate_seq();
        if let Some(queued) = self.jobs.get_mut(&job_id) {
            queued.slot = Slot::Waiting;
            queued.seq = seq;
            self.ready.push(ReadyEntry {
                priority: queued.priority,
                seq,
                job_id,
            });
        }
    }

    fn push_delayed(&mut self, job_id: JobId, ready_at: Instant) {
        let seq = self.allocate_seq();
        if let Some(queued) = self.jobs.get_mut(&job_id) {
            queued.slot = Slot::Delayed;
            queued.seq = seq;
            self.delayed.push(DelayedEntry {
                ready_at,
                seq,
                job_id,
            });
        }
    }

    /// 時刻が来た delayed job を ready heap へ移す
    fn promote_due(&mut self, now: Instant) {
        while let Some(entry) = self.delayed.peek() {
            if entry.ready_at > now {
                break; // Heap is sorted, so we can stop
            }
            let Some(entry) = self.delayed.pop() else {
                break;
            };
            let live = self
                .jobs
                .get(&entry.job_id)
                .is_some_and(|q| q.slot == Slot::Delayed && q.seq == entry.seq);
            if live {
                self.push_ready(entry.job_id);
            }
        }
    }

    fn pop_ready(&mut self, now: Instant) -> Option<Lease> {
        while let Some(entry) = self.ready.pop() {
            if let Some(queued) = self.jobs.get_mut(&entry.job_id)
                && queued.slot == Slot::Waiting
                && queued.seq == entry.seq
            {
                queued.slot = Slot::InFlight { since: now };
                return Some(Lease {
                    job: queued.job.clone(),
                    priority: queued.priority,
                });
            }
        }
        None
    }

    fn next_ready_at(&self) -> Option<Instant> {
        self.delayed.peek().map(|entry| entry.ready_at)
    }

    fn ensure_capacity(&self) -> Result<(), QueueError> {
        if self.jobs.len() >= self.max_depth {
            return Err(QueueError::Saturated {
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    fn finish(
        &mut self,
        job_id: JobId,
        outcome: FinishOutcome,
        finished_at: DateTime<Utc>,
    ) -> bool {
        let Some(queued) = self.jobs.get(&job_id) else {
            return false;
        };
        let Slot::InFlight { since } = queued.slot else {
            return false;
        };
        let Some(queued) = self.jobs.remove(&job_id) else {
            return false;
        };

        self.finished.push_back(FinishedJob {
            job_id,
            tenant_id: queued.job.event.tenant_id,
            outcome,
            finished_at,
            processing_ms: since.elapsed().as_millis() as u64,
        });
        while self.finished.len() > self.finished_capacity {
            self.finished.pop_front();
        }
        true
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts {
            paused: self.paused,
            ..QueueCounts::default()
        };
        for queued in self.jobs.values() {
            match queued.slot {
                Slot::Waiting => counts.waiting += 1,
                Slot::Delayed => counts.delayed += 1,
                Slot::InFlight { .. } => counts.in_flight += 1,
            }
        }
        for finished in &self.finished {
            match finished.outcome {
                FinishOutcome::Completed => counts.completed += 1,
                FinishOutcome::Failed => counts.failed += 1,
            }
        }
        counts
    }

    fn clear_pending(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, q| matches!(q.slot, Slot::InFlight { .. }));
        // Every live heap entry belonged to a job just removed.
        self.ready.clear();
        self.delayed.clear();
        before - self.jobs.len()
    }

    fn clear_finished(&mut self, outcome: FinishOutcome) -> usize {
        let before = self.finished.len();
        self.finished.retain(|f| f.outcome != outcome);
        before - self.finished.len()
    }
}

/// インメモリの delivery queue
///
/// ワーカーは特定の job を待たない。ready が空なら、最も早い delayed job の時刻か
/// 次の通知まで眠り、起きたら昇格処理をやり直す。
pub struct InMemoryQueue {
    state: Mutex<InMemoryQueueState>,
    notify: Notify,
    clock: Arc<dyn Clock>,
}

impl InMemoryQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &QueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(InMemoryQueueState::new(config)),
            notify: Notify::new(),
            clock,
        }
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryQueue {
    async fn enqueue(&self, job: DeliveryJob, priority: Priority) -> Result<JobId, QueueError> {
        let job_id = job.job_id;
        {
            let mut state = self.state.lock().await;
            if state.shutdown {
                return Err(QueueError::ShutDown);
            }
            if state.jobs.contains_key(&job_id) {
                return Err(QueueError::Duplicate(job_id));
            }
            state.ensure_capacity()?;
            state.jobs.insert(
                job_id,
                QueuedJob {
                    job,
                    priority,
                    slot: Slot::Waiting,
                    seq: 0,
                },
            );
            state.push_ready(job_id);
        }

        // Notify waiting workers
        self.notify.notify_one();
        Ok(job_id)
    }

    async fn enqueue_delayed(
        &self,
        job: DeliveryJob,
        priority: Priority,
        delay: Duration,
    ) -> Result<JobId, QueueError> {
        let job_id = job.job_id;
        let ready_at = Instant::now() + delay;
        {
            let mut state = self.state.lock().await;
            if state.shutdown {
                return Err(QueueError::ShutDown);
            }
            match state.jobs.get_mut(&job_id) {
                Some(queued) if matches!(queued.slot, Slot::InFlight { .. }) => {
                    queued.job = job;
                    queued.priority = priority;
                }
                Some(_) => return Err(QueueError::Duplicate(job_id)),
                None => {
                    state.ensure_capacity()?;
                    state.jobs.insert(
                        job_id,
                        QueuedJob {
                            job,
                            priority,
                            slot: Slot::Delayed,
                            seq: 0,
                        },
                    );
                }
            }
            state.push_delayed(job_id, ready_at);
        }

        // A sleeping dequeuer may need an earlier wake-up.
        self.notify.notify_one();
        Ok(job_id)
    }

    async fn dequeue(&self) -> Option<Lease> {
        loop {
            // Register interest before inspecting state so a notify between
            // the check and the wait is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_wake = {
                let mut state = self.state.lock().await;
                if state.shutdown {
                    return None;
                }

                let now = Instant::now();
                state.promote_due(now);

                if !state.paused {
                    if let Some(lease) = state.pop_ready(now) {
                        let more_ready = !state.ready.is_empty();
                        drop(state);
                        if more_ready {
                            self.notify.notify_one();
                        }
                        return Some(lease);
                    }
                    state.next_ready_at()
                } else {
                    None
                }
            };

            // Wait for notification OR next delayed job time
            match next_wake {
                Some(wake_at) => {
                    tokio::select! {
                        _ = &mut notified => {},
                        _ = tokio::time::sleep_until(wake_at) => {},
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn complete(&self, job_id: JobId) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.finish(job_id, FinishOutcome::Completed, now)
    }

    async fn fail(&self, job_id: JobId) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.finish(job_id, FinishOutcome::Failed, now)
    }

    async fn remove(&self, job_id: JobId) -> bool {
        let mut state = self.state.lock().await;
        match state.jobs.get(&job_id).map(|q| q.slot) {
            Some(Slot::Waiting | Slot::Delayed) => state.jobs.remove(&job_id).is_some(),
            _ => false,
        }
    }

    async fn counts(&self) -> QueueCounts {
        self.state.lock().await.counts()
    }

    async fn pause(&self) {
        self.state.lock().await.paused = true;
    }

    async fn resume(&self) {
        self.state.lock().await.paused = false;
        self.notify.notify_waiters();
    }

    async fn is_paused(&self) -> bool {
        self.state.lock().await.paused
    }

    async fn clear(&self, scope: ClearScope) -> usize {
        let mut state = self.state.lock().await;
        match scope {
            ClearScope::Waiting => state.clear_pending(),
            ClearScope::Completed => state.clear_finished(FinishOutcome::Completed),
            ClearScope::Failed => state.clear_finished(FinishOutcome::Failed),
            ClearScope::All => {
                state.clear_pending()
                    + state.clear_finished(FinishOutcome::Completed)
                    + state.clear_finished(FinishOutcome::Failed)
            }
        }
    }

    async fn finished_since(&self, since: DateTime<Utc>) -> Vec<FinishedJob> {
        let state = self.state.lock().await;
        state
            .finished
            .iter()
            .filter(|f| f.finished_at >= since)
            .cloned()
            .collect()
    }

    async fn shutdown(&self) {
        self.state.lock().await.shutdown = true;
        self.notify.notify_waiters();
    }
}
