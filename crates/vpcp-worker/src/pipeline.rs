//! The per-task pipeline (spec.md §4.3 "Per-task flow"): idempotency check,
//! budget admission, routing, rate-limited submission, and outcome
//! classification. This is the part of the Worker that has nothing to do
//! with HTTP — `http.rs` only translates `ProcessOutcome`/`WorkerError` into
//! a status code.

use crate::error::WorkerError;
use crate::state::WorkerState;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use vpcp_budget::BudgetAccountant;
use vpcp_poller::ProviderJobStore;
use vpcp_provider::{ProviderAdapterError, SubmitState};
use vpcp_ratelimiter::Outcome as RateOutcome;
use vpcp_router::Observation;
use vpcp_types::{FailureKind, ProviderId, ProviderJob, ReservationId, TaskEnvelope};

#[cfg(feature = "tracing")]
use tracing::{info, warn};

/// What the pipeline decided, independent of how `http.rs` renders it
/// (spec.md §4.3: SUCCEEDED, FAILED-do-not-retry, and RUNNING/PENDING
/// handed to the Poller are all a 200).
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// `request_id` already had a non-terminal `ProviderJob`; nothing new
    /// was started (spec.md §4.3 step 1).
    Duplicate,
    /// The provider returned synchronous success; the upload collaborator
    /// was invoked.
    Succeeded,
    /// Accepted asynchronously; the Poller will drive it to a terminal
    /// state.
    HandedToPoller,
    /// Every candidate provider was exhausted, or the Budget Accountant
    /// refused admission outright; the job (if one was ever persisted) is
    /// FAILED and its reservation released.
    Failed { reason: FailureKind },
}

/// Holds a single budget reservation and releases it on drop unless
/// `disarm`ed first. Without this, a reservation taken at admission (spec.md
/// §4.3 step 2) leaks if the pipeline's future is cancelled mid-`await` —
/// e.g. by the Worker's per-request deadline firing during `adapter.submit`
/// — since no match-arm runs to release it explicitly (spec.md §5 "No
/// orphaned reservations... even on deadline expiry").
struct ReservationGuard {
    budget: Arc<BudgetAccountant>,
    reservation_id: Option<ReservationId>,
}

impl ReservationGuard {
    fn new(budget: Arc<BudgetAccountant>, reservation_id: ReservationId) -> Self {
        Self {
            budget,
            reservation_id: Some(reservation_id),
        }
    }

    /// Hands the reservation off to whoever owns its terminal disposition
    /// from here (a `commit`/`release` call already made, or a persisted
    /// `ProviderJob` the Poller will later commit/release) — the guard no
    /// longer releases it on drop.
    fn disarm(mut self) {
        self.reservation_id = None;
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if let Some(id) = self.reservation_id.take() {
            let _ = self.budget.release(id);
        }
    }
}

/// Drives one `TaskEnvelope` through §4.3's per-task flow, never exceeding
/// `deadline`.
pub async fn process(state: &WorkerState, envelope: &TaskEnvelope, deadline: Instant) -> Result<ProcessOutcome, WorkerError> {
    let request = &envelope.request;
    let request_id = request.request_id;

    let existing = state.store.by_request_id(request_id)?;
    if existing.iter().any(|job| !job.state.is_terminal()) {
        return Ok(ProcessOutcome::Duplicate);
    }

    let mut excluded: HashSet<ProviderId> = HashSet::new();
    let mut tried: Vec<ProviderId> = Vec::new();
    let max_attempts = state.router.max_attempts_per_request().min(state.config.max_failover_providers);
    // Tracks whether every exclusion made so far was forced by insufficient
    // budget, so the fallthrough below (all attempts exhausted) can record
    // `BudgetExhausted` instead of the generic `NoViableProvider` when that
    // is in fact why nothing succeeded (spec.md §4.3 step 2, §7).
    let mut only_budget_exclusions = true;

    for attempt in 0..max_attempts {
        if Instant::now() >= deadline {
            return Err(WorkerError::DeadlineExceeded);
        }

        let (provider_id, model_id) = match state.select_provider(request, &excluded) {
            Ok(pair) => pair,
            Err(_) => {
                let reason = if state.router.budget_is_sole_blocker(request, &excluded) {
                    FailureKind::BudgetExhausted
                } else {
                    FailureKind::NoViableProvider
                };
                return Ok(fail(state, request, attempt + 1, &tried, reason));
            }
        };
        tried.push(provider_id.clone());

        let Some(credit_cost) = state.credit_cost(&provider_id, &model_id) else {
            only_budget_exclusions = false;
            excluded.insert(provider_id);
            continue;
        };

        let reservation_id = match state.budget.reserve(&provider_id, credit_cost) {
            Ok(id) => id,
            Err(_) => {
                excluded.insert(provider_id);
                continue;
            }
        };
        let reservation = ReservationGuard::new(Arc::clone(&state.budget), reservation_id);

        let Some(adapter) = state.adapters.get(&provider_id).cloned() else {
            only_budget_exclusions = false;
            excluded.insert(provider_id);
            continue;
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let lease = match state.rate_limiter.acquire(&provider_id, remaining).await {
            Ok(lease) => lease,
            Err(_) => {
                only_budget_exclusions = false;
                excluded.insert(provider_id);
                continue;
            }
        };

        let started = Instant::now();
        let result = adapter
            .submit(
                &model_id,
                &request.prompt,
                request.duration_seconds,
                &request.aspect_ratio,
                request.platform_hint.as_deref(),
            )
            .await;
        let elapsed = started.elapsed();

        match result {
            Ok(response) => {
                state.rate_limiter.release(&provider_id, lease, RateOutcome::Latency(elapsed));

                let now = vpcp_provider::now();
                let mut job = ProviderJob::new(
                    request_id,
                    request.quality_tier,
                    provider_id.clone(),
                    model_id.clone(),
                    response.job_id.clone(),
                    reservation_id,
                    now,
                );

                match response.state {
                    SubmitState::Succeeded => {
                        job.transition(vpcp_types::JobState::Succeeded)
                            .map_err(|e| WorkerError::Store(e.to_string()))?;
                        job.artifact_uri = response.artifact_uri.clone();
                        job.credits_charged = response.credits_charged;
                        state.store.insert(&job)?;
                        reservation.disarm();
                        let _ = state.budget.commit(reservation_id);
                        state.router.observe(&provider_id, Observation::Success);
                        state.budget.record_tier_completed(request.quality_tier);

                        if let Some(uri) = response.artifact_uri.as_deref() {
                            dispatch_upload(state, &adapter, &request_id, uri).await;
                        }

                        #[cfg(feature = "tracing")]
                        info!(%request_id, provider = %provider_id, "request completed synchronously");
                        return Ok(ProcessOutcome::Succeeded);
                    }
                    SubmitState::Submitted | SubmitState::Running => {
                        let target_state = if response.state == SubmitState::Running {
                            vpcp_types::JobState::Running
                        } else {
                            vpcp_types::JobState::Pending
                        };
                        job.transition(target_state).map_err(|e| WorkerError::Store(e.to_string()))?;
                        state.store.insert(&job)?;
                        // Ownership of the reservation now lives on the
                        // persisted `ProviderJob`; the Poller commits or
                        // releases it when the job reaches a terminal state.
                        reservation.disarm();
                        state.router.observe(&provider_id, Observation::Success);
                        return Ok(ProcessOutcome::HandedToPoller);
                    }
                }
            }
            Err(ProviderAdapterError::Transport { classification, .. }) => {
                state.rate_limiter.release(&provider_id, lease, RateOutcome::ServerError);
                drop(reservation);

                let observation = if classification == vpcp_provider::ErrorClassification::Outage {
                    Observation::Outage
                } else {
                    Observation::Failure
                };
                state.router.observe(&provider_id, observation);

                if classification == vpcp_provider::ErrorClassification::Permanent {
                    state.budget.record_tier_failed(request.quality_tier);
                    return Ok(fail(state, request, attempt + 1, &tried, FailureKind::ProviderClientError));
                }

                #[cfg(feature = "tracing")]
                warn!(provider = %provider_id, "transient submit failure, trying next candidate");
                only_budget_exclusions = false;
                excluded.insert(provider_id);
                continue;
            }
            Err(ProviderAdapterError::MalformedResponse) => {
                state.rate_limiter.release(&provider_id, lease, RateOutcome::ClientError);
                drop(reservation);
                state.router.observe(&provider_id, Observation::Failure);
                only_budget_exclusions = false;
                excluded.insert(provider_id);
                continue;
            }
        }
    }

    state.budget.record_tier_failed(request.quality_tier);
    let reason = if only_budget_exclusions && !tried.is_empty() {
        FailureKind::BudgetExhausted
    } else {
        FailureKind::NoViableProvider
    };
    Ok(fail(state, request, max_attempts, &tried, reason))
}

/// Records the terminal failure in the Worker's bounded `FailureLog`
/// (surfaced by `vpcp status`, spec.md §7) and returns the outcome the
/// caller reports to the queue. `attempts` must already be the number of
/// attempts actually made (callers convert their 0-based loop index, or
/// pass `max_attempts` unmodified for the all-candidates-exhausted
/// fallthrough) — this function does not adjust it further.
fn fail(state: &WorkerState, request: &vpcp_types::GenerationRequest, attempts: u32, tried: &[ProviderId], reason: FailureKind) -> ProcessOutcome {
    state.failures.record(vpcp_types::TerminalFailureRecord {
        request_id: request.request_id,
        tier: request.quality_tier,
        attempts,
        final_error_kind: reason,
        providers_tried: tried.to_vec(),
    });
    ProcessOutcome::Failed { reason }
}

async fn dispatch_upload(state: &WorkerState, adapter: &std::sync::Arc<dyn vpcp_provider::ProviderAdapter>, request_id: &vpcp_types::RequestId, uri: &str) {
    match adapter.fetch_artifact(uri).await {
        Ok(bytes) => {
            if let Err(_err) = state.upload.upload(request_id, &bytes, uri).await {
                #[cfg(feature = "tracing")]
                warn!(%request_id, error = %_err, "upload collaborator rejected synchronous artifact");
            }
        }
        Err(_err) => {
            #[cfg(feature = "tracing")]
            warn!(%request_id, error = %_err, "failed to fetch artifact for synchronous success");
        }
    }
}
