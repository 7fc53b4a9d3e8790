//! `run_daemon()` (spec.md §4.6): sleeps until the next scheduled batch
//! time, then plans that slice and enqueues it through the Queue Manager.

use crate::config::SchedulerConfig;
use crate::plan::{plan_batch, PlannedRequest};
use crate::topic::TopicSource;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use time::{Date, OffsetDateTime};
use vpcp_budget::BudgetAccountant;
use vpcp_queue::QueueManager;
use vpcp_types::{RetryPolicy, TaskEnvelope};

#[cfg(feature = "tracing")]
use tracing::{info, warn};

/// Sums `credits_remaining` across `config.gated_providers`: the resource
/// gate's view of "the day's remaining envelope" (spec.md §4.6). A
/// provider with no registered ledger contributes zero rather than
/// failing the whole gate.
pub fn remaining_budget(budget: &BudgetAccountant, config: &SchedulerConfig) -> u64 {
    config
        .gated_providers
        .iter()
        .filter_map(|id| budget.snapshot(id))
        .map(|snap| snap.credits_remaining)
        .sum()
}

/// Wraps a planned item into the `TaskEnvelope` that crosses the queue
/// boundary (spec.md §3), applying `not_before` and the given retry policy.
pub fn to_envelope(item: PlannedRequest, retry_policy: RetryPolicy) -> TaskEnvelope {
    TaskEnvelope {
        request: item.request,
        attempt_no: 1,
        enqueue_time: OffsetDateTime::now_utc(),
        not_before: Some(item.not_before),
        retry_policy,
    }
}

/// Batch windows must be supplied in ascending time-of-day order; finds
/// the next one strictly after `now`, wrapping to tomorrow's first window
/// if every window for today has already fired.
fn next_batch(config: &SchedulerConfig, now: OffsetDateTime) -> (usize, Date, OffsetDateTime) {
    let today = now.date();
    for (index, window) in config.batch_windows.iter().enumerate() {
        let candidate = today.with_time(window.time_utc).assume_utc();
        if candidate > now {
            return (index, today, candidate);
        }
    }
    let tomorrow = today.next_day().unwrap_or(today);
    let first = &config.batch_windows[0];
    (0, tomorrow, tomorrow.with_time(first.time_utc).assume_utc())
}

fn std_duration(d: time::Duration) -> StdDuration {
    d.try_into().unwrap_or(StdDuration::ZERO)
}

/// `run_daemon()` (spec.md §4.6 public contract). Runs forever: sleeps
/// until the next batch window, plans that one slice, and enqueues it.
/// A planning or enqueue failure is logged and does not stop the loop —
/// the next window still fires on schedule.
pub async fn run_daemon(
    config: Arc<SchedulerConfig>,
    topic_source: Arc<dyn TopicSource>,
    queue: Arc<QueueManager>,
    budget: Arc<BudgetAccountant>,
    retry_policy: RetryPolicy,
) -> ! {
    loop {
        let now = OffsetDateTime::now_utc();
        let (batch_index, date, fire_at) = next_batch(&config, now);
        let wait = fire_at - now;
        if wait > time::Duration::ZERO {
            tokio::time::sleep(std_duration(wait)).await;
        }

        let remaining = remaining_budget(&budget, &config);
        match plan_batch(&config, date, batch_index, remaining, topic_source.as_ref()).await {
            Ok(items) => {
                let count = items.len();
                for item in items {
                    let envelope = to_envelope(item, retry_policy.clone());
                    if let Err(_err) = queue.enqueue(envelope) {
                        #[cfg(feature = "tracing")]
                        warn!(error = %_err, batch_index, %date, "scheduler failed to enqueue a planned item");
                    }
                }
                #[cfg(feature = "tracing")]
                info!(batch_index, %date, count, "scheduler enqueued a batch window");
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                warn!(error = %_err, batch_index, %date, "scheduler failed to plan a batch window");
            }
        }
    }
}
