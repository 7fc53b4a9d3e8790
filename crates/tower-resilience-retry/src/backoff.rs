//! Backoff strategies for retry intervals.
//!
//! An [`IntervalFunction`] maps a zero-indexed attempt number to the delay
//! before the next attempt. Implementations are shared across clones of a
//! service via `Arc<dyn IntervalFunction>`.

use std::time::Duration;

/// A pluggable backoff strategy.
pub trait IntervalFunction: Send + Sync {
    /// Returns the delay to wait before retrying, given the zero-indexed
    /// attempt number that just failed (0 = the first attempt failed).
    fn interval(&self, attempt: usize) -> Duration;
}

/// A constant delay between every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl IntervalFunction for FixedInterval {
    fn interval(&self, _attempt: usize) -> Duration {
        self.interval
    }
}

/// Exponential backoff: `initial * multiplier^attempt`, capped at `max_interval`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: Duration::from_secs(60),
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let scaled = self.initial_interval.mul_f64(factor);
        scaled.min(self.max_interval)
    }
}

/// Exponential backoff with `+/- randomization_factor` jitter applied to each
/// interval, to avoid synchronized retry storms across clients.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialRandomBackoff {
    base: ExponentialBackoff,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            base: ExponentialBackoff::new(initial_interval),
            randomization_factor: 0.5,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.base = self.base.with_multiplier(multiplier);
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.base = self.base.with_max_interval(max_interval);
        self
    }

    pub fn with_randomization_factor(mut self, randomization_factor: f64) -> Self {
        self.randomization_factor = randomization_factor;
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let base = self.base.interval(attempt);
        let jitter = base.mul_f64(self.randomization_factor);
        let offset = jitter.mul_f64(rand::random::<f64>());
        base - jitter / 2 + offset
    }
}

/// A backoff strategy defined by an arbitrary closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
