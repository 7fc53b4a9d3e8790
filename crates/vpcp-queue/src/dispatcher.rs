//! `QueueManager`: the public contract of spec.md §4.2
//! (`enqueue`/`status`/`update_rate_limits`), wired to a `TaskQueue` and
//! the dispatch service of `dispatch.rs`.

use crate::config::QueueConfig;
use crate::dispatch::{dispatch_service, DispatchOutcome, RateGate};
use crate::error::QueueError;
use crate::task::{QueueStatus, QueuedTask, TaskHandle};
use crate::store::TaskQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use time::OffsetDateTime;
use tower::{Service, ServiceExt};
use tower_resilience_retry::{ExponentialBackoff, IntervalFunction};
use vpcp_types::{RequestId, TaskEnvelope};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Runtime-adjustable limits (spec.md §4.2
/// `update_rate_limits({dispatches_per_second, max_concurrent_dispatches})`).
struct Limits {
    dispatches_per_second: f64,
    max_concurrent_dispatches: usize,
}

pub struct QueueManager {
    store: Arc<dyn TaskQueue>,
    client: reqwest::Client,
    worker_url: String,
    limits: Mutex<Limits>,
    backoff: ExponentialBackoff,
    max_attempts: u32,
    running: Arc<AtomicU64>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn TaskQueue>, config: QueueConfig) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
            worker_url: config.worker_url,
            limits: Mutex::new(Limits {
                dispatches_per_second: config.dispatches_per_second,
                max_concurrent_dispatches: config.max_concurrent_dispatches,
            }),
            backoff: ExponentialBackoff::new(config.min_backoff).with_max_interval(config.max_backoff),
            max_attempts: config.max_attempts,
            running: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `enqueue(envelope, {not_before, retry_policy}) -> task_handle`
    /// (spec.md §4.2). `not_before`/`retry_policy` already live on the
    /// `TaskEnvelope` (spec.md §3), so this takes the envelope whole.
    pub fn enqueue(&self, envelope: TaskEnvelope) -> Result<TaskHandle, QueueError> {
        self.store.enqueue(envelope)
    }

    /// `status() -> {approximate_depth, running, dispatch_rate, max_concurrent}`
    /// (spec.md §4.2).
    pub fn status(&self) -> Result<QueueStatus, QueueError> {
        let limits = self.limits.lock();
        Ok(QueueStatus {
            approximate_depth: self.store.depth()?,
            running: self.running.load(Ordering::Relaxed),
            dispatch_rate: limits.dispatches_per_second,
            max_concurrent: limits.max_concurrent_dispatches as u64,
        })
    }

    /// `update_rate_limits({dispatches_per_second, max_concurrent_dispatches})`
    /// (spec.md §4.2). Effective from the next tick.
    pub fn update_rate_limits(&self, dispatches_per_second: f64, max_concurrent_dispatches: usize) {
        let mut limits = self.limits.lock();
        limits.dispatches_per_second = dispatches_per_second;
        limits.max_concurrent_dispatches = max_concurrent_dispatches;
    }

    /// Drives one scheduling quantum: claims ready tasks and dispatches as
    /// many as the current rate/concurrency limits admit, spawning each
    /// delivery so slow Workers don't stall the others (spec.md §4.2
    /// "Backpressure").
    pub async fn run_tick(&self, now: OffsetDateTime) -> Result<(), QueueError> {
        let ready = self.store.ready_tasks(now)?;
        if ready.is_empty() {
            return Ok(());
        }

        let (dispatches_per_second, max_concurrent_dispatches) = {
            let limits = self.limits.lock();
            (limits.dispatches_per_second, limits.max_concurrent_dispatches)
        };

        let mut rate_gate = RateGate::new(dispatches_per_second);
        let dispatch = dispatch_service(self.client.clone(), self.worker_url.clone(), max_concurrent_dispatches);

        for task in ready {
            if !rate_gate.try_acquire().await {
                #[cfg(feature = "tracing")]
                debug!("queue dispatch rate gate exhausted for this tick");
                break;
            }

            let store = Arc::clone(&self.store);
            let running = Arc::clone(&self.running);
            let backoff = self.backoff;
            let max_attempts = self.max_attempts;

            let mut svc = dispatch.clone();
            let ready_svc = match svc.ready().await {
                Ok(svc) => svc,
                Err(_) => continue,
            };
            let call = ready_svc.call(task.envelope.clone());

            running.fetch_add(1, Ordering::Relaxed);
            tokio::spawn(async move {
                let outcome = call.await;
                running.fetch_sub(1, Ordering::Relaxed);
                handle_outcome(store.as_ref(), task, outcome, backoff, max_attempts);
            });
        }

        Ok(())
    }

    /// Sleeps until the next tick and repeats, forever (spec.md §4.2's
    /// implied daemon loop; the Scheduler has the only named `run_daemon`,
    /// but the Queue Manager needs the same shape to keep dispatching).
    pub async fn run_daemon(&self, tick_interval: StdDuration) -> ! {
        loop {
            if let Err(_err) = self.run_tick(OffsetDateTime::now_utc()).await {
                #[cfg(feature = "tracing")]
                warn!(error = %_err, "queue tick failed");
            }
            tokio::time::sleep(tick_interval).await;
        }
    }
}

fn handle_outcome(
    store: &dyn TaskQueue,
    mut task: QueuedTask,
    outcome: Result<DispatchOutcome, crate::dispatch::DispatchError>,
    backoff: ExponentialBackoff,
    max_attempts: u32,
) {
    let request_id: RequestId = task.request_id();

    match outcome {
        Ok(DispatchOutcome::Ack) => {
            let _ = store.ack(request_id);
        }
        Ok(DispatchOutcome::Permanent { .. }) => {
            let _ = store.fail_permanent(request_id);
        }
        Ok(DispatchOutcome::Transient { .. }) | Err(_) => {
            if task.envelope.attempt_no >= max_attempts {
                let _ = store.fail_permanent(request_id);
                return;
            }
            let delay = backoff.interval((task.envelope.attempt_no - 1) as usize);
            task.envelope.attempt_no += 1;
            task.next_attempt_at = OffsetDateTime::now_utc() + time_duration_from_std(delay);
            let _ = store.reschedule(task);
        }
    }
}

fn time_duration_from_std(d: StdDuration) -> time::Duration {
    time::Duration::try_from(d).unwrap_or(time::Duration::ZERO)
}
