//! The `ProviderJobStore` trait (the Poller's half of spec.md §6 "Durable:
//! `ProviderJob` records... for the Poller to resume across restarts") and a
//! `sled`-backed implementation, mirroring `vpcp_queue::TaskQueue`'s
//! trait-as-boundary shape: the storage technology is not part of the
//! contract, only durability and the monotonic-state guarantee are.

use crate::error::PollerError;
use vpcp_types::{JobState, ProviderJob, ProviderJobId, RequestId};

/// Durable storage for `ProviderJob` records, keyed by `provider_job_id`.
///
/// Implementations must never let a write regress a terminal state; this is
/// normally enforced upstream by calling `ProviderJob::transition` before
/// `update`, but a store is free to double-check.
pub trait ProviderJobStore: Send + Sync {
    fn insert(&self, job: &ProviderJob) -> Result<(), PollerError>;
    fn get(&self, id: ProviderJobId) -> Result<Option<ProviderJob>, PollerError>;
    fn update(&self, job: &ProviderJob) -> Result<(), PollerError>;
    /// All jobs not yet in a terminal state (spec.md §4.5 "advance all
    /// non-terminal ProviderJobs").
    fn non_terminal(&self) -> Result<Vec<ProviderJob>, PollerError>;
    /// Every `ProviderJob` ever recorded for a `request_id`, terminal or
    /// not. Used for the Worker's idempotency check and for cancellation of
    /// superseded attempts.
    fn by_request_id(&self, request_id: RequestId) -> Result<Vec<ProviderJob>, PollerError>;

    /// Cancellation on supersession (spec.md §4.5 "Cancellation"): every
    /// non-terminal `ProviderJob` for `request_id` other than `keep` is set
    /// to CANCELED. Called by the Worker before a replacement attempt for
    /// the same `request_id` is allowed to enter a non-terminal state.
    fn cancel_superseded(
        &self,
        request_id: RequestId,
        keep: ProviderJobId,
    ) -> Result<(), PollerError> {
        for mut job in self.by_request_id(request_id)? {
            if job.provider_job_id == keep || job.state.is_terminal() {
                continue;
            }
            job.transition(JobState::Canceled)?;
            self.update(&job)?;
        }
        Ok(())
    }
}

/// `sled`-backed `ProviderJobStore`: one tree, keyed by `provider_job_id`,
/// valued by the JSON-serialized `ProviderJob`.
pub struct SledProviderJobStore {
    tree: sled::Tree,
}

impl SledProviderJobStore {
    pub fn open(db: &sled::Db, tree_name: &str) -> Result<Self, PollerError> {
        Ok(Self {
            tree: db.open_tree(tree_name)?,
        })
    }

    fn key(id: ProviderJobId) -> Vec<u8> {
        id.to_string().into_bytes()
    }
}

impl ProviderJobStore for SledProviderJobStore {
    fn insert(&self, job: &ProviderJob) -> Result<(), PollerError> {
        let bytes = serde_json::to_vec(job)?;
        self.tree.insert(Self::key(job.provider_job_id), bytes)?;
        Ok(())
    }

    fn get(&self, id: ProviderJobId) -> Result<Option<ProviderJob>, PollerError> {
        match self.tree.get(Self::key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn update(&self, job: &ProviderJob) -> Result<(), PollerError> {
        self.insert(job)
    }

    fn non_terminal(&self) -> Result<Vec<ProviderJob>, PollerError> {
        let mut out = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            let job: ProviderJob = serde_json::from_slice(&value)?;
            if !job.state.is_terminal() {
                out.push(job);
            }
        }
        Ok(out)
    }

    fn by_request_id(&self, request_id: RequestId) -> Result<Vec<ProviderJob>, PollerError> {
        let mut out = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            let job: ProviderJob = serde_json::from_slice(&value)?;
            if job.request_id == request_id {
                out.push(job);
            }
        }
        Ok(out)
    }
}
