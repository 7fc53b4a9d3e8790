//! Shared data model and error taxonomy for the video production control
//! plane.
//!
//! This crate has no I/O and no async runtime dependency: it is the
//! vocabulary every other `vpcp-*` crate speaks, the way
//! `tower-resilience-core` is the shared vocabulary of the resilience
//! middleware crates.

mod error;
mod ids;
mod model;

pub use error::{TerminalFailureRecord, VpcpError};
pub use ids::{ProviderJobId, ReservationId, RequestId, ScheduledRequestKey};
pub use model::{
    ArtifactRetrievalMode, FailureKind, GenerationRequest, JobState, ModelId,
    MonotonicityViolation, OutageSignature, ProviderDescriptor, ProviderId, ProviderJob,
    ProviderModel, QualityTier, RateLimitSpec, RetryPolicy, TaskEnvelope,
};
