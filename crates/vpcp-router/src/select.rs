//! The selection algorithm of spec.md §4.4, expressed as a pure function
//! over explicit snapshots so it satisfies Invariant 4 ("Router purity":
//! identical inputs produce identical output, with no hidden state).
//! `Router::select` (in `router.rs`) is the only caller that gathers those
//! snapshots from live state.

use crate::health::{HealthSnapshot, HealthState};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use vpcp_budget::ProviderBudgetSnapshot;
use vpcp_types::{GenerationRequest, ModelId, ProviderDescriptor, ProviderId, QualityTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierUpliftPolicy {
    Never,
    OnExhaustion,
    AlwaysIfCheaper,
}

#[derive(Debug, Clone, Copy)]
pub struct RouterPolicy {
    pub max_attempts_per_request: u32,
    pub tier_uplift_policy: TierUpliftPolicy,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_request: 3,
            tier_uplift_policy: TierUpliftPolicy::OnExhaustion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no viable provider for this request")]
pub struct NoViableProvider;

struct Candidate<'a> {
    provider_id: &'a ProviderId,
    model_id: &'a ModelId,
    credit_cost: u64,
    ranked_latency: Duration,
    consecutive_successes: u32,
}

fn stable_hash(request_id: &str, provider_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    request_id.hash(&mut hasher);
    provider_id.hash(&mut hasher);
    hasher.finish()
}

/// Filters and ranks candidates for one tier. Returns the winner, if any.
///
/// Step 2 (filter): `tier ∈ supports_tiers`, `is_healthy` (Healthy or
/// Degraded), `credits_remaining ≥ credit_cost`, `provider_id ∉
/// excluded_providers`.
///
/// Step 3 (rank): lexicographic `(credit_cost ASC, observed_p50_latency
/// ASC, -consecutive_successes)`, Degraded candidates ranked as if their
/// latency were doubled, ties broken by a stable hash of
/// `(request_id, provider_id)`.
fn select_at_tier<'a>(
    request_id: &str,
    tier: QualityTier,
    excluded: &HashSet<ProviderId>,
    descriptors: &'a [ProviderDescriptor],
    health: &HashMap<ProviderId, HealthSnapshot>,
    budget: &HashMap<ProviderId, ProviderBudgetSnapshot>,
    observed_latencies: &HashMap<ProviderId, Duration>,
) -> Option<(&'a ProviderId, &'a ModelId)> {
    let mut candidates = Vec::new();

    for descriptor in descriptors {
        if excluded.contains(&descriptor.provider_id) {
            continue;
        }
        let Some(model) = descriptor.model_for_tier(tier) else {
            continue;
        };
        let Some(health_snapshot) = health.get(&descriptor.provider_id) else {
            continue;
        };
        if !health_snapshot.state.is_eligible() {
            continue;
        }
        let Some(budget_snapshot) = budget.get(&descriptor.provider_id) else {
            continue;
        };
        if budget_snapshot.credits_remaining < model.credit_cost {
            continue;
        }

        let base_latency = observed_latencies
            .get(&descriptor.provider_id)
            .copied()
            .unwrap_or(Duration::from_secs_f64(descriptor.typical_latency_seconds));
        let ranked_latency = if health_snapshot.state == HealthState::Degraded {
            base_latency * 2
        } else {
            base_latency
        };

        candidates.push(Candidate {
            provider_id: &descriptor.provider_id,
            model_id: &model.model_id,
            credit_cost: model.credit_cost,
            ranked_latency,
            consecutive_successes: health_snapshot.consecutive_successes,
        });
    }

    candidates.sort_by(|a, b| {
        a.credit_cost
            .cmp(&b.credit_cost)
            .then(a.ranked_latency.cmp(&b.ranked_latency))
            .then(b.consecutive_successes.cmp(&a.consecutive_successes))
            .then_with(|| {
                stable_hash(request_id, a.provider_id).cmp(&stable_hash(request_id, b.provider_id))
            })
    });

    candidates
        .into_iter()
        .next()
        .map(|c| (c.provider_id, c.model_id))
}

/// The tier this request should be attempted at if `tier` has no viable
/// candidate and `policy` permits a retry at an adjacent tier (spec.md
/// §4.4 step 4, generalized per DESIGN.md's uplift/downgrade decision).
fn fallback_tier(tier: QualityTier, policy: TierUpliftPolicy) -> Option<QualityTier> {
    if policy == TierUpliftPolicy::Never {
        return None;
    }
    match tier.uplift() {
        Some(uplifted) => Some(uplifted),
        // PREMIUM has no uplift target; ALWAYS_IF_CHEAPER additionally
        // permits a downgrade to STANDARD as the documented "cost
        // override" path (spec.md §9 Open Questions; S4).
        None if tier == QualityTier::Premium && policy == TierUpliftPolicy::AlwaysIfCheaper => {
            Some(QualityTier::Standard)
        }
        None => None,
    }
}

/// Whether every tier/health-eligible candidate for `request` (at its own
/// tier and at any uplift tier `policy` permits) is excluded solely by
/// insufficient budget, as opposed to there being no tier/health-eligible
/// candidate at all.
///
/// Used by callers of `select_pure` (the Worker) to tell `BUDGET_EXHAUSTED`
/// apart from `NO_VIABLE_PROVIDER` (spec.md §7) without folding that
/// distinction into `select_pure`'s own return type — the Router's public
/// contract surfaces only `NoViableProvider` (spec.md §7 "Router surfaces
/// only NO_VIABLE_PROVIDER"); the Worker is the one that must record
/// `BUDGET_EXHAUSTED` (spec.md §4.3 step 2).
pub fn blocked_solely_by_budget(
    request: &GenerationRequest,
    excluded: &HashSet<ProviderId>,
    descriptors: &[ProviderDescriptor],
    health: &HashMap<ProviderId, HealthSnapshot>,
    budget: &HashMap<ProviderId, ProviderBudgetSnapshot>,
    policy: &RouterPolicy,
) -> bool {
    let mut tiers = vec![request.quality_tier];
    if let Some(next) = fallback_tier(request.quality_tier, policy.tier_uplift_policy) {
        tiers.push(next);
    }

    let mut saw_eligible_candidate = false;
    for tier in tiers {
        for descriptor in descriptors {
            if excluded.contains(&descriptor.provider_id) {
                continue;
            }
            let Some(model) = descriptor.model_for_tier(tier) else {
                continue;
            };
            let Some(health_snapshot) = health.get(&descriptor.provider_id) else {
                continue;
            };
            if !health_snapshot.state.is_eligible() {
                continue;
            }
            saw_eligible_candidate = true;
            let Some(budget_snapshot) = budget.get(&descriptor.provider_id) else {
                return false;
            };
            if budget_snapshot.credits_remaining >= model.credit_cost {
                return false;
            }
        }
    }
    saw_eligible_candidate
}

/// `select(request, excluded_providers) -> (provider_id, model_id) |
/// NoViableProvider` (spec.md §4.4), as a pure function over explicit
/// snapshots.
pub fn select_pure(
    request: &GenerationRequest,
    excluded: &HashSet<ProviderId>,
    descriptors: &[ProviderDescriptor],
    health: &HashMap<ProviderId, HealthSnapshot>,
    budget: &HashMap<ProviderId, ProviderBudgetSnapshot>,
    observed_latencies: &HashMap<ProviderId, Duration>,
    policy: &RouterPolicy,
) -> Result<(ProviderId, ModelId), NoViableProvider> {
    let request_id = request.request_id.to_string();

    if let Some((provider_id, model_id)) = select_at_tier(
        &request_id,
        request.quality_tier,
        excluded,
        descriptors,
        health,
        budget,
        observed_latencies,
    ) {
        return Ok((provider_id.clone(), model_id.clone()));
    }

    if let Some(next_tier) = fallback_tier(request.quality_tier, policy.tier_uplift_policy) {
        if let Some((provider_id, model_id)) = select_at_tier(
            &request_id,
            next_tier,
            excluded,
            descriptors,
            health,
            budget,
            observed_latencies,
        ) {
            return Ok((provider_id.clone(), model_id.clone()));
        }
    }

    Err(NoViableProvider)
}
