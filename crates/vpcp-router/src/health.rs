//! Per-provider health state machine (spec.md §4.4): `HEALTHY -> DEGRADED
//! -> UNHEALTHY`, driven entirely by `observe`. Modeled on
//! `tower_resilience_circuitbreaker::Circuit`'s count-based sliding
//! window, but with the thresholds spec.md names rather than a single
//! configurable failure rate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// The window width used for the rolling error rate (spec.md §4.4 uses
/// "rolling error rate" without naming a window; count-based, matching
/// the window the Rate Limiter already uses for its own adaptive layer,
/// keeps the two concerns consistent).
const WINDOW_SIZE: usize = 20;
const RECOVERY_PROBE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthState {
    /// Only `Healthy` and `Degraded` are eligible candidates in the
    /// Router's filter step (spec.md §4.4 "Only HEALTHY and DEGRADED are
    /// eligible in step 2").
    pub fn is_eligible(self) -> bool {
        !matches!(self, HealthState::Unhealthy)
    }
}

/// What `observe` reports about one completed (or probed) attempt against
/// a provider (spec.md §4.4 "observe(provider_id, outcome)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Success,
    Failure,
    /// An adapter-declared or recognized outage signature: any state moves
    /// to `UNHEALTHY` immediately (spec.md §4.4).
    Outage,
    /// A deliberately issued minimal recovery probe succeeded.
    RecoveryProbeSuccess,
    RecoveryProbeFailure,
}

#[derive(Debug, Clone, Copy)]
pub struct HealthSnapshot {
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_probe_at: Option<Instant>,
}

pub(crate) struct ProviderHealth {
    state: HealthState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    window: VecDeque<bool>,
    last_probe_at: Option<Instant>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            state: HealthState::Healthy,
            consecutive_failures: 0,
            consecutive_successes: 0,
            window: VecDeque::with_capacity(WINDOW_SIZE),
            last_probe_at: None,
        }
    }
}

impl ProviderHealth {
    pub(crate) fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            last_probe_at: self.last_probe_at,
        }
    }

    fn push_window(&mut self, is_failure: bool) {
        if self.window.len() >= WINDOW_SIZE {
            self.window.pop_front();
        }
        self.window.push_back(is_failure);
    }

    fn error_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|f| **f).count();
        failures as f64 / self.window.len() as f64
    }

    /// Whether a recovery probe may be attempted now: only while
    /// `UNHEALTHY`, rate-limited to at most one every 60s (spec.md §4.4).
    pub(crate) fn may_attempt_recovery_probe(&self, now: Instant) -> bool {
        self.state == HealthState::Unhealthy
            && match self.last_probe_at {
                None => true,
                Some(last) => now.duration_since(last) >= RECOVERY_PROBE_INTERVAL,
            }
    }

    pub(crate) fn observe(&mut self, observation: Observation, now: Instant) {
        match observation {
            Observation::Success => {
                self.push_window(false);
                self.consecutive_successes += 1;
                self.consecutive_failures = 0;
                if self.state == HealthState::Degraded && self.consecutive_successes >= 3 {
                    self.state = HealthState::Healthy;
                }
            }
            Observation::Failure => {
                self.push_window(true);
                self.consecutive_failures += 1;
                self.consecutive_successes = 0;
                let rate = self.error_rate();
                match self.state {
                    HealthState::Healthy if self.consecutive_failures >= 2 || rate > 0.25 => {
                        self.state = HealthState::Degraded;
                    }
                    HealthState::Degraded if self.consecutive_failures >= 5 || rate > 0.50 => {
                        self.state = HealthState::Unhealthy;
                    }
                    _ => {}
                }
            }
            Observation::Outage => {
                self.state = HealthState::Unhealthy;
                self.consecutive_failures += 1;
                self.consecutive_successes = 0;
                self.push_window(true);
            }
            Observation::RecoveryProbeSuccess => {
                self.last_probe_at = Some(now);
                if self.state == HealthState::Unhealthy {
                    self.state = HealthState::Degraded;
                    self.consecutive_failures = 0;
                }
            }
            Observation::RecoveryProbeFailure => {
                self.last_probe_at = Some(now);
            }
        }
    }
}
