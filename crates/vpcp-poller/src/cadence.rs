//! Polling cadence: interval grows from `initial` to `max` over a growth
//! horizon, jittered, plus a per-job exponential backoff for transient poll
//! errors that is kept separate from (and multiplies) the base cadence
//! (spec.md §4.5 "Polling cadence").

use rand::Rng;
use std::time::Duration;

/// The age-based growth curve, before jitter or per-job backoff. Linear
/// interpolation from `initial` at `age = 0` to `max` at `age =
/// growth_horizon`, capped at `max` beyond the horizon (spec.md §4.5 "grows
/// from 10s (fresh) to 120s (> 5 min old), capped").
pub fn base_interval(age: Duration, initial: Duration, max: Duration, growth_horizon: Duration) -> Duration {
    if age >= growth_horizon || growth_horizon.is_zero() {
        return max;
    }
    let t = age.as_secs_f64() / growth_horizon.as_secs_f64();
    let secs = initial.as_secs_f64() + t * (max.as_secs_f64() - initial.as_secs_f64());
    Duration::from_secs_f64(secs.max(0.0))
}

/// Applies `±jitter_fraction` jitter and the per-job transient-error
/// backoff multiplier on top of the age-based base interval.
pub fn jittered_interval(
    base: Duration,
    backoff_multiplier: f64,
    jitter_fraction: f64,
    rng: &mut impl Rng,
) -> Duration {
    let backed_off = base.as_secs_f64() * backoff_multiplier.max(1.0);
    let spread = backed_off * jitter_fraction;
    let delta = if spread > 0.0 {
        rng.random_range(-spread..=spread)
    } else {
        0.0
    };
    Duration::from_secs_f64((backed_off + delta).max(0.0))
}
