//! `SchedulerConfig` (spec.md §6 `scheduler.{batch_windows_utc[],
//! tier_shares, daily_target, topic_source_ref}`), following the
//! `*Config::validate()` shape used throughout this workspace.

use std::collections::HashMap;
use time::Time;
use vpcp_types::{ProviderId, QualityTier};

/// One of the K batch windows the day is partitioned into (spec.md §4.6
/// "The day is partitioned into K batch windows... Each window receives a
/// share of the daily target"). `tier_weights` gives, per tier, this
/// window's share of that tier's daily target; weights for a given tier
/// must sum to 1.0 across all windows in `SchedulerConfig::batch_windows`.
#[derive(Debug, Clone)]
pub struct BatchWindow {
    pub time_utc: Time,
    pub tier_weights: HashMap<QualityTier, f64>,
}

impl BatchWindow {
    pub fn new(time_utc: Time, tier_weights: HashMap<QualityTier, f64>) -> Self {
        Self { time_utc, tier_weights }
    }

    fn weight_for(&self, tier: QualityTier) -> f64 {
        self.tier_weights.get(&tier).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Total items/day target ("produce N items", spec.md §4.6).
    pub daily_target: u64,
    /// `s1/s2/s3` split of `daily_target` across PREMIUM/STANDARD/VOLUME.
    /// Must sum to (approximately) 1.0.
    pub tier_shares: HashMap<QualityTier, f64>,
    /// Platforms `P1..Pk` items are distributed across (spec.md §4.6).
    pub platforms: Vec<String>,
    /// The K batch windows, in ascending time-of-day order.
    pub batch_windows: Vec<BatchWindow>,
    /// A rough, provider-agnostic per-tier credit estimate used only by
    /// the resource gate to decide whether the day's plan fits the
    /// remaining envelope (spec.md §4.6 "Resource gate"); the real,
    /// provider-specific cost is only known once the Router routes each
    /// request.
    pub tier_estimated_credit_cost: HashMap<QualityTier, u64>,
    /// Providers the resource gate sums remaining credits across.
    pub gated_providers: Vec<ProviderId>,
}

impl SchedulerConfig {
    pub fn tier_share(&self, tier: QualityTier) -> f64 {
        self.tier_shares.get(&tier).copied().unwrap_or(0.0)
    }

    pub fn estimated_cost(&self, tier: QualityTier) -> u64 {
        self.tier_estimated_credit_cost.get(&tier).copied().unwrap_or(0)
    }

    pub fn window_weight(&self, window: &BatchWindow, tier: QualityTier) -> f64 {
        window.weight_for(tier)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_windows.is_empty() {
            return Err(ConfigError::InvalidField("batch_windows must be non-empty"));
        }
        if self.platforms.is_empty() {
            return Err(ConfigError::InvalidField("platforms must be non-empty"));
        }
        let share_total: f64 = self.tier_shares.values().sum();
        if (share_total - 1.0).abs() > 0.01 {
            return Err(ConfigError::InvalidField("tier_shares must sum to ~1.0"));
        }
        for tier in [QualityTier::Premium, QualityTier::Standard, QualityTier::Volume] {
            let window_total: f64 = self.batch_windows.iter().map(|w| w.weight_for(tier)).sum();
            if window_total > 0.0 && (window_total - 1.0).abs() > 0.01 {
                return Err(ConfigError::InvalidField(
                    "a tier's batch-window weights must sum to ~1.0 when any window serves it",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid scheduler configuration: {0}")]
    InvalidField(&'static str),
}
