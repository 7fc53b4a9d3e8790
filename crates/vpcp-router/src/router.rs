//! The stateful `Router` (spec.md §4.4 public contract): wires the pure
//! `select_pure` algorithm to live health state and a shared
//! `BudgetAccountant`. The dependency is one-directional — Router reads
//! from Budget, Budget never calls back into Router (spec.md §9 "Cycles
//! between Poller <-> Router <-> Budget").

use crate::health::{HealthSnapshot, Observation, ProviderHealth};
use crate::select::{select_pure, NoViableProvider, RouterPolicy};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vpcp_budget::BudgetAccountant;
use vpcp_types::{GenerationRequest, ModelId, ProviderDescriptor, ProviderId, QualityTier};

#[cfg(feature = "metrics")]
use metrics::counter;

pub use crate::select::{NoViableProvider as RouterError, TierUpliftPolicy};

#[derive(Debug, Clone, Copy)]
pub struct TierCapacityReport {
    pub target: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderCapacityReport {
    pub credits_remaining: u64,
    pub credits_reserved: u64,
    pub credits_committed: u64,
}

/// The Tiered Router (C4): quality-tier -> provider/model selection with
/// live health tracking and adaptive failover (spec.md §4.4).
pub struct Router {
    descriptors: Vec<ProviderDescriptor>,
    health: DashMap<ProviderId, parking_lot::Mutex<ProviderHealth>>,
    budget: Arc<BudgetAccountant>,
    policy: RouterPolicy,
}

impl Router {
    pub fn new(descriptors: Vec<ProviderDescriptor>, budget: Arc<BudgetAccountant>, policy: RouterPolicy) -> Self {
        let health = DashMap::new();
        for descriptor in &descriptors {
            health.insert(descriptor.provider_id.clone(), parking_lot::Mutex::new(ProviderHealth::default()));
        }
        Self {
            descriptors,
            health,
            budget,
            policy,
        }
    }

    fn health_snapshot_map(&self) -> HashMap<ProviderId, HealthSnapshot> {
        self.health
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().lock().snapshot()))
            .collect()
    }

    fn budget_snapshot_map(&self) -> HashMap<ProviderId, vpcp_budget::ProviderBudgetSnapshot> {
        self.descriptors
            .iter()
            .filter_map(|d| self.budget.snapshot(&d.provider_id).map(|s| (d.provider_id.clone(), s)))
            .collect()
    }

    /// `select(request, excluded_providers) -> (provider_id, model_id) |
    /// NoViableProvider` (spec.md §4.4).
    ///
    /// `observed_latencies` is supplied by the caller (the Worker, reading
    /// `vpcp_ratelimiter`'s per-provider `observed_p50_latency`) so this
    /// method stays free of any direct dependency on the Rate Limiter.
    pub fn select(
        &self,
        request: &GenerationRequest,
        excluded: &HashSet<ProviderId>,
        observed_latencies: &HashMap<ProviderId, Duration>,
    ) -> Result<(ProviderId, ModelId), NoViableProvider> {
        let result = select_pure(
            request,
            excluded,
            &self.descriptors,
            &self.health_snapshot_map(),
            &self.budget_snapshot_map(),
            observed_latencies,
            &self.policy,
        );

        #[cfg(feature = "metrics")]
        match &result {
            Ok((provider_id, _)) => {
                counter!("vpcp_router_selections_total", "provider" => provider_id.clone()).increment(1);
            }
            Err(_) => {
                counter!("vpcp_router_no_viable_provider_total").increment(1);
            }
        }

        result
    }

    /// Whether a prior `select` failure for `request` was caused solely by
    /// insufficient budget on every otherwise-eligible candidate, as
    /// opposed to there being no eligible candidate at all. Lets the Worker
    /// distinguish `FailureKind::BudgetExhausted` from
    /// `FailureKind::NoViableProvider` (spec.md §7) while keeping `select`
    /// itself returning only `NoViableProvider`.
    pub fn budget_is_sole_blocker(&self, request: &GenerationRequest, excluded: &HashSet<ProviderId>) -> bool {
        crate::select::blocked_solely_by_budget(
            request,
            excluded,
            &self.descriptors,
            &self.health_snapshot_map(),
            &self.budget_snapshot_map(),
            &self.policy,
        )
    }

    /// `observe(provider_id, outcome)` (spec.md §4.4).
    pub fn observe(&self, provider_id: &str, observation: Observation) {
        if let Some(health) = self.health.get(provider_id) {
            health.lock().observe(observation, Instant::now());

            #[cfg(feature = "tracing")]
            if matches!(observation, Observation::Outage) {
                tracing::warn!(provider_id, "provider reported an outage; marked UNHEALTHY");
            }
        }
    }

    /// Whether `provider_id` is due a recovery probe right now (spec.md
    /// §4.4 "a deliberately issued minimal request, rate-limited to at
    /// most one every 60s"). The caller (a healthcheck loop) issues the
    /// probe and reports the result back via `observe`.
    pub fn may_attempt_recovery_probe(&self, provider_id: &str) -> bool {
        self.health
            .get(provider_id)
            .map(|h| h.lock().may_attempt_recovery_probe(Instant::now()))
            .unwrap_or(false)
    }

    pub fn health_snapshot(&self) -> HashMap<ProviderId, HealthSnapshot> {
        self.health_snapshot_map()
    }

    pub fn capacity_report(&self) -> (HashMap<ProviderId, ProviderCapacityReport>, HashMap<QualityTier, TierCapacityReport>) {
        let providers = self
            .budget_snapshot_map()
            .into_iter()
            .map(|(id, snap)| {
                (
                    id,
                    ProviderCapacityReport {
                        credits_remaining: snap.credits_remaining,
                        credits_reserved: snap.credits_reserved,
                        credits_committed: snap.credits_committed,
                    },
                )
            })
            .collect();

        let tiers = [QualityTier::Premium, QualityTier::Standard, QualityTier::Volume]
            .into_iter()
            .map(|tier| {
                let counts = self.budget.tier_counts(tier);
                (
                    tier,
                    TierCapacityReport {
                        target: counts.target,
                        completed: counts.completed,
                        failed: counts.failed,
                    },
                )
            })
            .collect();

        (providers, tiers)
    }

    pub fn descriptors(&self) -> &[ProviderDescriptor] {
        &self.descriptors
    }

    pub fn max_attempts_per_request(&self) -> u32 {
        self.policy.max_attempts_per_request
    }
}
