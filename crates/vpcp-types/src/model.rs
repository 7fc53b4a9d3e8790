//! The data model of the control plane: `GenerationRequest`, `ProviderJob`,
//! `ProviderDescriptor`, `Budget`, and the `TaskEnvelope` that crosses the
//! queue boundary.

use crate::ids::{ProviderJobId, RequestId, ReservationId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use time::{Duration, OffsetDateTime};

/// Quality/cost class of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityTier {
    Premium,
    Standard,
    Volume,
}

impl QualityTier {
    /// The next tier up in the uplift path VOLUME -> STANDARD -> PREMIUM.
    pub fn uplift(self) -> Option<QualityTier> {
        match self {
            QualityTier::Volume => Some(QualityTier::Standard),
            QualityTier::Standard => Some(QualityTier::Premium),
            QualityTier::Premium => None,
        }
    }
}

/// A provider-specific identity, distinct from our own `ProviderJobId`
/// newtype, because a provider's job id is an opaque string it assigns.
pub type ProviderId = String;
pub type ModelId = String;

/// A unit of work, as defined in spec.md §3 "GenerationRequest".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: RequestId,
    pub quality_tier: QualityTier,
    pub prompt: String,
    pub duration_seconds: u32,
    pub aspect_ratio: String,
    pub platform_hint: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
}

/// `SUBMITTING -> PENDING -> RUNNING -> {SUCCEEDED, FAILED, EXPIRED}`, with
/// `CANCELED` reachable from any non-terminal state on supersession.
///
/// State is monotonic: once terminal, it never changes (spec.md §3, §8.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Submitting,
    Pending,
    Running,
    Succeeded,
    Failed,
    Expired,
    Canceled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Expired | JobState::Canceled
        )
    }

    /// The partial order used by the monotonic-state property test (spec.md
    /// §8.1): `rank` is non-decreasing along any valid transition sequence
    /// for the non-terminal chain, and all terminal states share the
    /// maximal rank (they are sinks, not totally ordered among themselves).
    fn rank(self) -> u8 {
        match self {
            JobState::Submitting => 0,
            JobState::Pending => 1,
            JobState::Running => 2,
            JobState::Succeeded | JobState::Failed | JobState::Expired | JobState::Canceled => 3,
        }
    }

    /// Whether transitioning from `self` to `next` is permitted under the
    /// monotonic rule: terminal states are sinks, and non-terminal states
    /// may only move forward or straight to a terminal state.
    pub fn can_transition_to(self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

/// Why a `ProviderJob` ended in `FAILED`, matching the §7 error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    TransientNetwork,
    ProviderOutage,
    RateLimited,
    ProviderClientError,
    BudgetExhausted,
    NoViableProvider,
    DeadlineExceeded,
    Internal,
}

impl FailureKind {
    /// Whether the Worker may locally retry (via Router failover) rather
    /// than surface this as a terminal failure to the queue (spec.md §7
    /// "Propagation policy").
    pub fn is_locally_recoverable(self) -> bool {
        matches!(
            self,
            FailureKind::TransientNetwork | FailureKind::ProviderOutage | FailureKind::RateLimited
        )
    }
}

/// An attempt against a specific provider/model (spec.md §3 "ProviderJob").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderJob {
    pub provider_job_id: ProviderJobId,
    pub request_id: RequestId,
    /// Carried from the parent `GenerationRequest` so the Poller can
    /// attribute tier completion/failure counts without holding the
    /// request itself (spec.md §4.7 "per-tier `target_count`,
    /// `completed_count`, `failed_count`").
    pub quality_tier: QualityTier,
    pub provider_id: ProviderId,
    pub model_id: ModelId,
    /// The id the provider itself assigned at submission time, passed back
    /// to the adapter's `poll`/`fetch_artifact` (spec.md §6). Opaque to us.
    pub external_job_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_polled_at: OffsetDateTime,
    pub state: JobState,
    pub attempts: u32,
    pub credits_charged: Option<u64>,
    pub artifact_uri: Option<String>,
    pub failure_kind: Option<FailureKind>,
    /// The Budget Accountant reservation this job holds. Committed on
    /// SUCCEEDED, released on any other terminal state (spec.md §4.7).
    pub reservation_id: ReservationId,
}

impl ProviderJob {
    pub fn new(
        request_id: RequestId,
        quality_tier: QualityTier,
        provider_id: impl Into<ProviderId>,
        model_id: impl Into<ModelId>,
        external_job_id: impl Into<String>,
        reservation_id: ReservationId,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            provider_job_id: ProviderJobId::new(),
            request_id,
            quality_tier,
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            external_job_id: external_job_id.into(),
            submitted_at: now,
            last_polled_at: now,
            state: JobState::Submitting,
            attempts: 1,
            credits_charged: None,
            artifact_uri: None,
            failure_kind: None,
            reservation_id,
        }
    }

    /// Applies a state transition, enforcing the monotonic rule. Returns
    /// `Err` (and leaves state unchanged) if the transition would regress
    /// a terminal state.
    pub fn transition(&mut self, next: JobState) -> Result<(), MonotonicityViolation> {
        if !self.state.can_transition_to(next) {
            return Err(MonotonicityViolation {
                from: self.state,
                attempted: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.submitted_at
    }
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("cannot transition ProviderJob from {from:?} to {attempted:?}: state is terminal or would regress")]
pub struct MonotonicityViolation {
    pub from: JobState,
    pub attempted: JobState,
}

/// Where artifacts live once a provider job succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactRetrievalMode {
    InlineUrl,
    PullById,
}

/// A known outage response signature, e.g. Cloudflare 522/523 bodies
/// (spec.md §6 "known_outage_signatures[]").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutageSignature {
    pub status: u16,
    pub body_contains: String,
}

/// Static capability description of a provider (spec.md §3
/// "ProviderDescriptor", static half).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderModel {
    pub model_id: ModelId,
    pub credit_cost: u64,
    pub supports_tiers: HashSet<QualityTier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub requests_per_second: f64,
    pub burst: u32,
    pub concurrency: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub provider_id: ProviderId,
    pub models: Vec<ProviderModel>,
    pub rate_limit: RateLimitSpec,
    pub artifact_retrieval_mode: ArtifactRetrievalMode,
    pub typical_latency_seconds: f64,
    pub daily_credit_cap: u64,
    pub known_outage_signatures: Vec<OutageSignature>,
}

impl ProviderDescriptor {
    pub fn supports_tiers(&self) -> HashSet<QualityTier> {
        self.models
            .iter()
            .flat_map(|m| m.supports_tiers.iter().copied())
            .collect()
    }

    pub fn model_for_tier(&self, tier: QualityTier) -> Option<&ProviderModel> {
        self.models
            .iter()
            .filter(|m| m.supports_tiers.contains(&tier))
            .min_by_key(|m| m.credit_cost)
    }
}

/// The serialized unit that crosses the queue boundary (spec.md §3
/// "TaskEnvelope").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_backoff_seconds: u64,
    pub max_backoff_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_backoff_seconds: 10,
            max_backoff_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub request: GenerationRequest,
    pub attempt_no: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub enqueue_time: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub not_before: Option<OffsetDateTime>,
    pub retry_policy: RetryPolicy,
}

impl TaskEnvelope {
    pub fn request_id(&self) -> RequestId {
        self.request.request_id
    }
}
