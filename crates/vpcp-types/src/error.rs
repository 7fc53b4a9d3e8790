//! The error taxonomy shared by the Worker, Router, Queue, and Poller
//! (spec.md §7). Modeled on `tower_resilience_core::ResilienceError`: one
//! enum that every component converts into, so call sites never write
//! per-layer `From` boilerplate.

use crate::model::FailureKind;
use std::time::Duration;

/// The unified error surface for the control plane.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VpcpError {
    /// Connection timeout, 5xx (non-outage), DNS failure.
    #[error("transient network error talking to provider {provider_id}: {detail}")]
    TransientNetwork { provider_id: String, detail: String },

    /// Recognized outage signature (522/523-style) or adapter-declared outage.
    #[error("provider {provider_id} reported an outage")]
    ProviderOutage { provider_id: String },

    /// 429 or adapter-declared throttle.
    #[error("provider {provider_id} rate limited us, retry after {retry_after:?}")]
    RateLimited {
        provider_id: String,
        retry_after: Option<Duration>,
    },

    /// 4xx with valid structure: bad prompt, invalid asset, unsupported aspect ratio.
    #[error("provider {provider_id} rejected the request: {detail}")]
    ProviderClientError { provider_id: String, detail: String },

    /// No provider could be paid for at the requested tier.
    #[error("budget exhausted for tier {tier:?}")]
    BudgetExhausted { tier: crate::model::QualityTier },

    /// The Router's candidate filter reduced to empty.
    #[error("no viable provider for this request")]
    NoViableProvider,

    /// The handler-level deadline expired before the operation completed.
    #[error("deadline exceeded in {stage}")]
    DeadlineExceeded { stage: &'static str },

    /// A rate limiter wait timed out before a lease was granted.
    #[error("rate limiter lease unavailable for provider {provider_id}: deadline exceeded")]
    RateLimitUnavailable { provider_id: String },

    /// A logic bug or failed invariant. Never retried (spec.md §7: "prevents
    /// retry-storms on broken code").
    #[error("internal error: {0}")]
    Internal(String),
}

impl VpcpError {
    /// Maps this error onto the §3/§7 `FailureKind` recorded on a terminal
    /// `ProviderJob`.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            VpcpError::TransientNetwork { .. } => FailureKind::TransientNetwork,
            VpcpError::ProviderOutage { .. } => FailureKind::ProviderOutage,
            VpcpError::RateLimited { .. } | VpcpError::RateLimitUnavailable { .. } => {
                FailureKind::RateLimited
            }
            VpcpError::ProviderClientError { .. } => FailureKind::ProviderClientError,
            VpcpError::BudgetExhausted { .. } => FailureKind::BudgetExhausted,
            VpcpError::NoViableProvider => FailureKind::NoViableProvider,
            VpcpError::DeadlineExceeded { .. } => FailureKind::DeadlineExceeded,
            VpcpError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Whether the Worker may retry this locally via Router failover
    /// (spec.md §7 "Propagation policy").
    pub fn is_locally_recoverable(&self) -> bool {
        self.failure_kind().is_locally_recoverable()
    }

    pub fn is_budget_exhausted(&self) -> bool {
        matches!(self, VpcpError::BudgetExhausted { .. })
    }

    pub fn is_no_viable_provider(&self) -> bool {
        matches!(self, VpcpError::NoViableProvider)
    }
}

/// The structured record emitted for a terminal `FAILED` request (spec.md
/// §7 "User-visible failure behavior").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TerminalFailureRecord {
    pub request_id: crate::ids::RequestId,
    pub tier: crate::model::QualityTier,
    pub attempts: u32,
    pub final_error_kind: FailureKind,
    pub providers_tried: Vec<String>,
}
