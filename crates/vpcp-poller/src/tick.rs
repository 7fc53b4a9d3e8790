//! `Poller::tick()` (spec.md §4.5 public contract): one scheduling quantum
//! that advances every non-terminal `ProviderJob` toward a terminal state.
//!
//! Direction of dependency matches spec.md §9 ("Cycles between Poller <->
//! Router <-> Budget... break by direction"): the Poller calls
//! `Router::observe` (one-way) and `BudgetAccountant::commit`/`release`;
//! neither Router nor Budget ever calls back into the Poller.

use crate::cadence::{base_interval, jittered_interval};
use crate::error::PollerError;
use crate::store::ProviderJobStore;
use crate::upload::UploadCollaborator;
use rand::rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use vpcp_budget::BudgetAccountant;
use vpcp_provider::{ErrorClassification, PollState, ProviderAdapter, ProviderAdapterError};
use vpcp_ratelimiter::{Outcome, RateLimiterRegistry};
use vpcp_router::{Observation, Router};
use vpcp_types::{FailureKind, JobState, ProviderJob, ProviderJobId};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub growth_horizon: Duration,
    pub jitter_fraction: f64,
    /// `max_job_lifetime_per_provider` (spec.md §6 `poller.*`), applied
    /// uniformly here; per-provider overrides can be layered on top by the
    /// caller if providers need different caps.
    pub max_job_lifetime: Duration,
    /// Caps concurrent outbound polls per tick so a large backlog never
    /// thunders against one provider (spec.md §4.5 "must bound its
    /// per-tick work").
    pub max_concurrent_polls: usize,
    /// Deadline for the rate-limiter lease + provider poll call, cascading
    /// from the same clamp the Worker honors (spec.md §5).
    pub per_job_deadline: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(120),
            growth_horizon: Duration::from_secs(300),
            jitter_fraction: 0.10,
            max_job_lifetime: Duration::from_secs(24 * 3600),
            max_concurrent_polls: 32,
            per_job_deadline: Duration::from_secs(30),
        }
    }
}

/// The Async Poller (C5): advances non-terminal `ProviderJob`s, downloads
/// artifacts on success, and hands them to the upload collaborator.
pub struct Poller<U: UploadCollaborator> {
    store: Arc<dyn ProviderJobStore>,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    rate_limiter: Arc<RateLimiterRegistry>,
    router: Arc<Router>,
    budget: Arc<BudgetAccountant>,
    upload: Arc<U>,
    config: PollerConfig,
    /// Per-job transient-poll-error backoff multiplier (spec.md §4.5
    /// "exponential backoff on `poll_interval` for this job only").
    job_backoff: dashmap::DashMap<ProviderJobId, f64>,
}

impl<U: UploadCollaborator> Poller<U> {
    pub fn new(
        store: Arc<dyn ProviderJobStore>,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
        rate_limiter: Arc<RateLimiterRegistry>,
        router: Arc<Router>,
        budget: Arc<BudgetAccountant>,
        upload: Arc<U>,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            adapters,
            rate_limiter,
            router,
            budget,
            upload,
            config,
            job_backoff: dashmap::DashMap::new(),
        }
    }

    fn poll_interval(&self, job: &ProviderJob, now: OffsetDateTime) -> Duration {
        let age = std_duration(job.age(now));
        let base = base_interval(
            age,
            self.config.initial_interval,
            self.config.max_interval,
            self.config.growth_horizon,
        );
        let backoff = self
            .job_backoff
            .get(&job.provider_job_id)
            .map(|m| *m)
            .unwrap_or(1.0);
        jittered_interval(base, backoff, self.config.jitter_fraction, &mut rng())
    }

    /// One scheduling quantum (spec.md §4.5 `tick()`). Idempotent: callers
    /// may invoke it concurrently across processes because every job
    /// advancement goes through `ProviderJob::transition`'s monotonic rule.
    pub async fn tick(&self) -> Result<TickReport, PollerError> {
        let now = OffsetDateTime::now_utc();
        let jobs = self.store.non_terminal()?;

        let mut due: Vec<ProviderJob> = jobs
            .into_iter()
            .filter(|job| {
                let elapsed = std_duration(now - job.last_polled_at);
                elapsed >= self.poll_interval(job, now)
            })
            .collect();

        // Bound per-tick work: oldest-submitted jobs first, capped at
        // `max_concurrent_polls` (spec.md §4.5 "must bound its per-tick work").
        due.sort_by_key(|j| j.submitted_at);
        due.truncate(self.config.max_concurrent_polls);

        let mut report = TickReport::default();
        let futures = due.into_iter().map(|job| self.advance_one(job, now));
        for outcome in futures::future::join_all(futures).await {
            match outcome {
                Ok(AdvanceOutcome::Succeeded) => report.succeeded += 1,
                Ok(AdvanceOutcome::Failed) => report.failed += 1,
                Ok(AdvanceOutcome::Expired) => report.expired += 1,
                Ok(AdvanceOutcome::StillRunning) => report.still_running += 1,
                Ok(AdvanceOutcome::TransientPollError) => report.transient_poll_errors += 1,
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    warn!(error = %_err, "poller failed to advance a job");
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }

    async fn advance_one(&self, mut job: ProviderJob, now: OffsetDateTime) -> Result<AdvanceOutcome, PollerError> {
        let Some(adapter) = self.adapters.get(&job.provider_id).cloned() else {
            return Err(PollerError::NotFound(job.provider_job_id));
        };

        // Age-based expiry check happens before we spend a poll call
        // (spec.md §4.5 point 2 "still_running -> if age > max_job_lifetime
        // -> set EXPIRED").
        let lifetime = std_duration(job.age(now));
        if lifetime > self.config.max_job_lifetime {
            job.transition(JobState::Expired)?;
            self.store.update(&job)?;
            let _ = self.budget.release(job.reservation_id);
            self.router.observe(&job.provider_id, Observation::Failure);
            self.job_backoff.remove(&job.provider_job_id);
            return Ok(AdvanceOutcome::Expired);
        }

        let Ok(lease) = self
            .rate_limiter
            .acquire(&job.provider_id, self.config.per_job_deadline)
            .await
        else {
            // Rate limiter exhaustion is not a provider signal; leave
            // `last_polled_at` untouched so this job is retried promptly.
            return Ok(AdvanceOutcome::StillRunning);
        };

        let poll_started = std::time::Instant::now();
        let result = adapter.poll(&job.external_job_id).await;
        let elapsed = poll_started.elapsed();

        match result {
            Ok(response) => {
                self.rate_limiter.release(&job.provider_id, lease, Outcome::Latency(elapsed));
                job.last_polled_at = now;

                match response.state {
                    PollState::Succeeded => {
                        job.transition(JobState::Succeeded)?;
                        job.artifact_uri = response.artifact_uri.clone();
                        job.credits_charged = response.credits_charged;
                        self.store.update(&job)?;
                        self.job_backoff.remove(&job.provider_job_id);

                        let _ = self.budget.commit(job.reservation_id);
                        self.router.observe(&job.provider_id, Observation::Success);
                        self.budget.record_tier_completed(job.quality_tier);

                        if let Some(uri) = response.artifact_uri {
                            self.dispatch_upload(&job, adapter.as_ref(), &uri).await;
                        }
                        Ok(AdvanceOutcome::Succeeded)
                    }
                    PollState::Failed => {
                        job.transition(JobState::Failed)?;
                        job.failure_kind = response.failure_kind.or(Some(FailureKind::ProviderClientError));
                        self.store.update(&job)?;
                        self.job_backoff.remove(&job.provider_job_id);

                        let _ = self.budget.release(job.reservation_id);
                        self.router.observe(&job.provider_id, Observation::Failure);
                        self.budget.record_tier_failed(job.quality_tier);
                        Ok(AdvanceOutcome::Failed)
                    }
                    PollState::Running | PollState::Pending => {
                        if matches!(job.state, JobState::Submitting | JobState::Pending) {
                            let _ = job.transition(JobState::Running);
                        }
                        self.store.update(&job)?;
                        self.job_backoff.remove(&job.provider_job_id);
                        Ok(AdvanceOutcome::StillRunning)
                    }
                }
            }
            Err(ProviderAdapterError::Transport { classification, .. }) => {
                self.rate_limiter.release(&job.provider_id, lease, Outcome::ServerError);
                job.last_polled_at = now;
                self.store.update(&job)?;

                if classification == ErrorClassification::Outage {
                    self.router.observe(&job.provider_id, Observation::Outage);
                }

                self.job_backoff
                    .entry(job.provider_job_id)
                    .and_modify(|m| *m = (*m * 2.0).min(8.0))
                    .or_insert(2.0);

                #[cfg(feature = "tracing")]
                debug!(provider_id = %job.provider_id, job = %job.provider_job_id, "transient poll error; backing off");

                Ok(AdvanceOutcome::TransientPollError)
            }
            Err(ProviderAdapterError::MalformedResponse) => {
                self.rate_limiter.release(&job.provider_id, lease, Outcome::ServerError);
                job.last_polled_at = now;
                self.store.update(&job)?;
                self.job_backoff
                    .entry(job.provider_job_id)
                    .and_modify(|m| *m = (*m * 2.0).min(8.0))
                    .or_insert(2.0);
                Ok(AdvanceOutcome::TransientPollError)
            }
        }
    }

    async fn dispatch_upload(&self, job: &ProviderJob, adapter: &dyn ProviderAdapter, uri: &str) {
        let bytes = match adapter.fetch_artifact(uri).await {
            Ok(bytes) => bytes,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                warn!(provider_id = %job.provider_id, "artifact fetch failed; upload left for retry");
                return;
            }
        };

        // Upload failures are retried independently; the ProviderJob
        // itself stays SUCCEEDED regardless (spec.md §4.5 point 3).
        if let Err(_err) = self.upload.upload(&job.request_id, &bytes, uri).await {
            #[cfg(feature = "tracing")]
            warn!(request_id = %job.request_id, "upload collaborator failed; will be retried independently");
        }
    }

    /// Cancellation on supersession (spec.md §4.5 "Cancellation"): called
    /// by the Worker before a replacement `ProviderJob` for the same
    /// request is allowed to leave SUBMITTING.
    pub fn cancel_superseded(
        &self,
        request_id: vpcp_types::RequestId,
        keep: ProviderJobId,
    ) -> Result<(), PollerError> {
        self.store.cancel_superseded(request_id, keep)
    }

    pub fn store(&self) -> &Arc<dyn ProviderJobStore> {
        &self.store
    }
}

fn std_duration(d: time::Duration) -> Duration {
    d.try_into().unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone, Copy)]
enum AdvanceOutcome {
    Succeeded,
    Failed,
    Expired,
    StillRunning,
    TransientPollError,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    pub succeeded: u32,
    pub failed: u32,
    pub expired: u32,
    pub still_running: u32,
    pub transient_poll_errors: u32,
    pub errors: u32,
}
