//! The durable record a `TaskQueue` stores per task: the `TaskEnvelope`
//! (spec.md §3) plus the scheduling bookkeeping the queue layer owns.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use vpcp_types::{RequestId, TaskEnvelope};

/// A task as it sits in the durable store, between `enqueue` and final
/// delivery (spec.md §4.2 "durable, ordered-enough delivery").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    pub envelope: TaskEnvelope,
    #[serde(with = "time::serde::rfc3339")]
    pub next_attempt_at: OffsetDateTime,
}

impl QueuedTask {
    pub fn new(envelope: TaskEnvelope) -> Self {
        let next_attempt_at = envelope.not_before.unwrap_or(envelope.enqueue_time);
        Self {
            envelope,
            next_attempt_at,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.envelope.request_id()
    }

    /// Whether this task is due for dispatch, honoring the ±5s scheduling
    /// tolerance spec.md §4.2 "Scheduling" allows.
    pub fn is_ready(&self, now: OffsetDateTime) -> bool {
        self.next_attempt_at - now <= time::Duration::seconds(5)
    }
}

/// Returned by `enqueue` as a reference to the accepted task (spec.md §4.2
/// "enqueue(...) -> task_handle").
#[derive(Debug, Clone, Copy)]
pub struct TaskHandle {
    pub request_id: RequestId,
}

/// Returned by `status()` (spec.md §4.2 "status() -> {approximate_depth,
/// running, dispatch_rate, max_concurrent}").
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStatus {
    pub approximate_depth: u64,
    pub running: u64,
    pub dispatch_rate: f64,
    pub max_concurrent: u64,
}
