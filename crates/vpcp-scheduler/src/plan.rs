//! `plan(date) -> [GenerationRequest, ...]` (spec.md §4.6): deterministic
//! expansion of the daily target into timed batches, with the resource
//! gate that down-scales the lowest tier first when the envelope can't
//! accommodate the full plan.

use crate::config::SchedulerConfig;
use crate::topic::{TopicSource, TopicSourceError};
use std::collections::HashMap;
use time::{Date, OffsetDateTime};
use vpcp_types::{GenerationRequest, QualityTier, RequestId, ScheduledRequestKey};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    TopicSource(#[from] TopicSourceError),
}

/// A single planned item: the `GenerationRequest` itself plus the
/// `not_before` stamp and batch index it was planned into (spec.md §4.6
/// "Each `GenerationRequest` is stamped with `not_before = batch_time`").
/// `not_before` is not part of `GenerationRequest` itself — it is carried
/// here and applied when the item is wrapped in a `TaskEnvelope` for
/// enqueueing, the same way `vpcp_queue::TaskEnvelope` separates it out.
#[derive(Debug, Clone)]
pub struct PlannedRequest {
    pub request: GenerationRequest,
    pub not_before: OffsetDateTime,
    pub batch_index: usize,
}

const TIER_ORDER: [QualityTier; 3] = [QualityTier::Premium, QualityTier::Standard, QualityTier::Volume];

/// Largest-remainder allocation of `total` across `weights`, deterministic
/// and exact (the returned counts always sum to `total`). Ties in
/// fractional remainder are broken by ascending index so replanning the
/// same inputs reproduces the same counts (spec.md §4.6 "Idempotency").
fn allocate(total: u64, weights: &[f64]) -> Vec<u64> {
    let sum: f64 = weights.iter().sum();
    if total == 0 || sum <= 0.0 {
        return vec![0; weights.len()];
    }
    let raw: Vec<f64> = weights.iter().map(|w| total as f64 * w / sum).collect();
    let mut counts: Vec<u64> = raw.iter().map(|r| r.floor() as u64).collect();
    let allocated: u64 = counts.iter().sum();
    let mut remainder = total - allocated;

    let mut by_fraction: Vec<(usize, f64)> = raw
        .iter()
        .enumerate()
        .map(|(i, r)| (i, r - r.floor()))
        .collect();
    by_fraction.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));

    let mut cursor = 0;
    while remainder > 0 && !by_fraction.is_empty() {
        counts[by_fraction[cursor % by_fraction.len()].0] += 1;
        remainder -= 1;
        cursor += 1;
    }
    counts
}

fn tier_targets(config: &SchedulerConfig) -> HashMap<QualityTier, u64> {
    let weights: Vec<f64> = TIER_ORDER.iter().map(|t| config.tier_share(*t)).collect();
    let counts = allocate(config.daily_target, &weights);
    TIER_ORDER.into_iter().zip(counts).collect()
}

fn total_estimated_cost(config: &SchedulerConfig, targets: &HashMap<QualityTier, u64>) -> u64 {
    targets.iter().map(|(tier, count)| count * config.estimated_cost(*tier)).sum()
}

/// Down-scales the lowest tier first until the plan's estimated cost fits
/// the remaining envelope, or nothing is left to cut (spec.md §4.6
/// "Resource gate... down-scales the *lowest-tier* items first").
///
/// `VOLUME` is the lowest quality tier and is cut first, then `STANDARD`,
/// then `PREMIUM` as a last resort. One unit at a time is cheap at the
/// daily_target scales this plans for (tens to low thousands); this is a
/// once-per-batch-window operation, not the per-request hot path of §5.
fn apply_resource_gate(config: &SchedulerConfig, targets: &mut HashMap<QualityTier, u64>, remaining_credits: u64) {
    const DOWNSCALE_ORDER: [QualityTier; 3] = [QualityTier::Volume, QualityTier::Standard, QualityTier::Premium];

    while total_estimated_cost(config, targets) > remaining_credits {
        let cut = DOWNSCALE_ORDER
            .iter()
            .find(|tier| targets.get(tier).copied().unwrap_or(0) > 0 && config.estimated_cost(**tier) > 0);
        match cut {
            Some(tier) => {
                *targets.get_mut(tier).unwrap() -= 1;
            }
            None => break,
        }
    }
}

/// Per-window, per-tier counts for the whole day, after the resource gate
/// has been applied. Computing this once keeps `plan()` and `plan_batch()`
/// consistent: both derive a given batch's item counts from the same
/// tier-wide allocation.
fn window_counts(config: &SchedulerConfig, targets: &HashMap<QualityTier, u64>) -> Vec<HashMap<QualityTier, u64>> {
    let mut per_window: Vec<HashMap<QualityTier, u64>> = config.batch_windows.iter().map(|_| HashMap::new()).collect();
    for tier in TIER_ORDER {
        let target = targets.get(&tier).copied().unwrap_or(0);
        let weights: Vec<f64> = config.batch_windows.iter().map(|w| config.window_weight(w, tier)).collect();
        let counts = allocate(target, &weights);
        for (window, count) in per_window.iter_mut().zip(counts) {
            window.insert(tier, count);
        }
    }
    per_window
}

async fn materialize_batch(
    config: &SchedulerConfig,
    date: Date,
    batch_index: usize,
    counts: &HashMap<QualityTier, u64>,
    topic_source: &dyn TopicSource,
) -> Result<Vec<PlannedRequest>, SchedulerError> {
    let window = &config.batch_windows[batch_index];
    let not_before = date.with_time(window.time_utc).assume_utc();

    let mut within_batch_index = 0usize;
    let mut items = Vec::new();
    for tier in TIER_ORDER {
        let count = counts.get(&tier).copied().unwrap_or(0);
        for _ in 0..count {
            let platform = &config.platforms[within_batch_index % config.platforms.len()];
            let spec = topic_source.next(platform, tier).await?;
            let key = ScheduledRequestKey::new(date, batch_index, within_batch_index);

            items.push(PlannedRequest {
                request: GenerationRequest {
                    request_id: RequestId::from_scheduled_key(&key),
                    quality_tier: tier,
                    prompt: spec.prompt,
                    duration_seconds: spec.duration_seconds,
                    aspect_ratio: spec.aspect_ratio,
                    platform_hint: Some(platform.clone()),
                    created_at: OffsetDateTime::now_utc(),
                    deadline: None,
                },
                not_before,
                batch_index,
            });
            within_batch_index += 1;
        }
    }
    Ok(items)
}

/// `plan(date) -> [GenerationRequest, ...]` (spec.md §4.6), expanded across
/// every batch window. `remaining_credits` is the resource-gate input
/// (spec.md §4.6 "consults the Budget Accountant"); callers typically sum
/// `BudgetAccountant::snapshot(provider).credits_remaining` across
/// `config.gated_providers` before calling this.
pub async fn plan(
    config: &SchedulerConfig,
    date: Date,
    remaining_credits: u64,
    topic_source: &dyn TopicSource,
) -> Result<Vec<PlannedRequest>, SchedulerError> {
    config.validate()?;
    let mut targets = tier_targets(config);
    apply_resource_gate(config, &mut targets, remaining_credits);
    let per_window = window_counts(config, &targets);

    let mut requests = Vec::new();
    for batch_index in 0..config.batch_windows.len() {
        requests.extend(materialize_batch(config, date, batch_index, &per_window[batch_index], topic_source).await?);
    }
    Ok(requests)
}

/// Plans only a single batch window's slice (spec.md §4.6 `run_daemon`:
/// "at each batch, plans that slice and enqueues"). Derives the same
/// per-window counts `plan()` would, so a given `(date, batch_index)`
/// produces an identical slice whether planned standalone or as part of
/// the full day (spec.md §4.6 "Idempotency").
pub async fn plan_batch(
    config: &SchedulerConfig,
    date: Date,
    batch_index: usize,
    remaining_credits: u64,
    topic_source: &dyn TopicSource,
) -> Result<Vec<PlannedRequest>, SchedulerError> {
    config.validate()?;
    let mut targets = tier_targets(config);
    apply_resource_gate(config, &mut targets, remaining_credits);
    let per_window = window_counts(config, &targets);
    materialize_batch(config, date, batch_index, &per_window[batch_index], topic_source).await
}
