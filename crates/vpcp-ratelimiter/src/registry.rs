//! The public contract of C1: `acquire`/`release`/`stats` keyed by
//! `provider_id`, fanning out to one `ProviderRateLimiter` per provider.
//! No cross-provider coupling (spec.md §4.1 "Ordering").

use crate::config::RateLimiterConfig;
use crate::limiter::{Lease, Outcome, ProviderRateLimiter, RateLimiterStats};
use dashmap::DashMap;
use std::time::Duration;
use vpcp_types::ProviderId;

pub use crate::limiter::RateLimitUnavailable;

/// Shared across every handler in a Worker process (spec.md §5 "Shared
/// Rate Limiter state and Router health state are shared within a worker
/// process").
#[derive(Default)]
pub struct RateLimiterRegistry {
    limiters: DashMap<ProviderId, ProviderRateLimiter>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider_id: impl Into<ProviderId>, config: RateLimiterConfig) {
        self.limiters
            .insert(provider_id.into(), ProviderRateLimiter::new(config));
    }

    /// `acquire(provider_id) -> lease` (spec.md §4.1).
    ///
    /// Fails only if `deadline` elapses before a token and concurrency slot
    /// are both available.
    pub async fn acquire(
        &self,
        provider_id: &str,
        deadline: Duration,
    ) -> Result<Lease, RateLimitUnavailable> {
        let limiter = self
            .limiters
            .get(provider_id)
            .unwrap_or_else(|| panic!("no rate limiter registered for provider {provider_id}"));
        limiter.acquire(deadline).await
    }

    /// `release(lease, outcome)`, must be called exactly once per `acquire`.
    pub fn release(&self, provider_id: &str, lease: Lease, outcome: Outcome) {
        if let Some(limiter) = self.limiters.get(provider_id) {
            limiter.release(lease, outcome);
        }
    }

    pub fn stats(&self, provider_id: &str) -> Option<RateLimiterStats> {
        self.limiters.get(provider_id).map(|l| l.stats())
    }

    pub fn observed_p50_latency(&self, provider_id: &str) -> Option<Duration> {
        self.limiters.get(provider_id).map(|l| l.observed_p50_latency())
    }
}
