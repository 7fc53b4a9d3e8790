//! The `TaskQueue` trait (spec.md §4.2 public contract) and a `sled`-backed
//! durable implementation. Per spec.md: "Explicitly not specified: the
//! underlying queue technology... any system providing durable task
//! storage... satisfies the contract" — so the trait is the real boundary
//! and `SledTaskQueue` is one implementation of it.

use crate::error::QueueError;
use crate::task::{QueuedTask, TaskHandle};
use time::OffsetDateTime;
use vpcp_types::{RequestId, TaskEnvelope};

/// Durable, at-least-once task storage (spec.md §4.2). Delivery survives
/// process restarts; duplicate delivery is possible and must be tolerated
/// by the Worker via the `request_id` idempotency key.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, envelope: TaskEnvelope) -> Result<TaskHandle, QueueError>;
    fn depth(&self) -> Result<u64, QueueError>;
    /// Tasks whose `not_before` has arrived (within the ±5s tolerance),
    /// still present in the store (not yet acked or failed permanently).
    fn ready_tasks(&self, now: OffsetDateTime) -> Result<Vec<QueuedTask>, QueueError>;
    /// Remove a task after a 2xx acknowledgment.
    fn ack(&self, request_id: RequestId) -> Result<(), QueueError>;
    /// Persist a task's incremented attempt count and recomputed
    /// `next_attempt_at` after a transient failure.
    fn reschedule(&self, task: QueuedTask) -> Result<(), QueueError>;
    /// Remove a task after a permanent (non-retryable) failure, or after
    /// retries are exhausted.
    fn fail_permanent(&self, request_id: RequestId) -> Result<(), QueueError>;
}

/// `sled`-backed `TaskQueue`: one tree, keyed by `request_id`, valued by the
/// JSON-serialized `QueuedTask`.
pub struct SledTaskQueue {
    tree: sled::Tree,
}

impl SledTaskQueue {
    pub fn open(db: &sled::Db, tree_name: &str) -> Result<Self, QueueError> {
        Ok(Self {
            tree: db.open_tree(tree_name)?,
        })
    }

    fn key(request_id: RequestId) -> Vec<u8> {
        request_id.to_string().into_bytes()
    }
}

impl TaskQueue for SledTaskQueue {
    fn enqueue(&self, envelope: TaskEnvelope) -> Result<TaskHandle, QueueError> {
        let request_id = envelope.request_id();
        let task = QueuedTask::new(envelope);
        let bytes = serde_json::to_vec(&task)?;
        self.tree.insert(Self::key(request_id), bytes)?;
        Ok(TaskHandle { request_id })
    }

    fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.tree.len() as u64)
    }

    fn ready_tasks(&self, now: OffsetDateTime) -> Result<Vec<QueuedTask>, QueueError> {
        let mut ready = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            let task: QueuedTask = serde_json::from_slice(&value)?;
            if task.is_ready(now) {
                ready.push(task);
            }
        }
        Ok(ready)
    }

    fn ack(&self, request_id: RequestId) -> Result<(), QueueError> {
        self.tree.remove(Self::key(request_id))?;
        Ok(())
    }

    fn reschedule(&self, task: QueuedTask) -> Result<(), QueueError> {
        let bytes = serde_json::to_vec(&task)?;
        self.tree.insert(Self::key(task.request_id()), bytes)?;
        Ok(())
    }

    fn fail_permanent(&self, request_id: RequestId) -> Result<(), QueueError> {
        self.tree.remove(Self::key(request_id))?;
        Ok(())
    }
}
