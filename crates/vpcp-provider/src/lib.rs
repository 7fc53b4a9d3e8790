//! The provider adapter capability set (spec.md §6 "Outbound to providers").
//!
//! A provider is a polymorphic capability set, not a runtime string-keyed
//! dispatch table (spec.md §9 "Dynamic dispatch over provider adapters"):
//! each configured provider is a boxed `dyn ProviderAdapter`, and the
//! Router operates only on `ProviderDescriptor`s plus this trait.

mod classify;
pub mod mock;

pub use classify::{classify_http, ErrorClassification};
pub use mock::MockProviderAdapter;

use async_trait::async_trait;
use time::OffsetDateTime;
use vpcp_types::{ArtifactRetrievalMode, ModelId};

/// The state a provider reports for a submitted job. Providers occasionally
/// return synchronous success (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Submitted,
    Running,
    Succeeded,
}

#[derive(Debug, Clone)]
pub struct SubmitResponse {
    pub job_id: String,
    pub state: SubmitState,
    /// Set only when `state == Succeeded`.
    pub artifact_uri: Option<String>,
    pub credits_charged: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PollResponse {
    pub state: PollState,
    pub artifact_uri: Option<String>,
    pub failure_kind: Option<vpcp_types::FailureKind>,
    pub credits_charged: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderAdapterError {
    /// The adapter already holds the raw HTTP status/body at the point of
    /// failure, so it classifies eagerly via its own `classify_error`
    /// rather than making the Worker re-derive it from a formatted string.
    #[error("transport error: {detail}")]
    Transport {
        detail: String,
        classification: ErrorClassification,
    },
    #[error("provider returned an unrecognized response shape")]
    MalformedResponse,
}

/// The capability set every provider adapter implements (spec.md §6).
///
/// Implementations are expected to be cheap to clone (an `Arc`-backed HTTP
/// client plus credentials) since the Router and Worker hold one instance
/// per configured provider for the life of the process.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn submit(
        &self,
        model: &ModelId,
        prompt: &str,
        duration_seconds: u32,
        aspect_ratio: &str,
        reference_asset: Option<&str>,
    ) -> Result<SubmitResponse, ProviderAdapterError>;

    async fn poll(&self, job_id: &str) -> Result<PollResponse, ProviderAdapterError>;

    async fn fetch_artifact(&self, uri: &str) -> Result<Vec<u8>, ProviderAdapterError>;

    fn artifact_retrieval_mode(&self) -> ArtifactRetrievalMode;

    /// Called by the Worker/Poller to classify a raw transport-level
    /// failure using this adapter's outage-signature table (spec.md §6
    /// `classify_error`).
    fn classify_error(&self, http_status: u16, body: &str) -> ErrorClassification;
}

/// Helper: the `now` a provider adapter should stamp a freshly-submitted
/// job with. Kept here (rather than calling `OffsetDateTime::now_utc()`
/// ad hoc in every adapter) so tests can substitute a fixed clock via a
/// wrapping adapter if needed.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
