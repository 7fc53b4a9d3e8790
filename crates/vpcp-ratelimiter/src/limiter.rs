//! Token bucket + concurrency semaphore + adaptive backoff, per provider
//! (spec.md §4.1).

use crate::config::RateLimiterConfig;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

use std::sync::Arc;

/// The outcome of a completed provider call, fed back via `release`
/// (spec.md §4.1 "outcome").
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Ok,
    ServerError,
    ClientError,
    Timeout,
    Latency(Duration),
}

/// A held permit. Must be passed to `release` exactly once.
pub struct Lease {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterStats {
    pub tokens_available: f64,
    pub in_flight: u32,
    pub effective_qps: f64,
    pub backoff_multiplier: f64,
    pub rolling_error_rate: f64,
}

#[derive(Debug, Clone, Copy)]
struct OutcomeRecord {
    at: Instant,
    is_error: bool,
}

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, effective_rate: f64, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * effective_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Returns `Ok(())` if a token was taken, `Err(wait)` with how long to
    /// wait for one otherwise.
    fn try_take(&mut self, effective_rate: f64, now: Instant) -> Result<(), Duration> {
        self.refill(effective_rate, now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else if effective_rate > 0.0 {
            let deficit = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(deficit / effective_rate))
        } else {
            Err(Duration::from_secs(u64::MAX / 2))
        }
    }
}

/// The sliding 60s outcome window plus the doubling/halving backoff
/// multiplier (spec.md §4.1 "Adaptive layer").
struct AdaptiveState {
    window: Duration,
    records: VecDeque<OutcomeRecord>,
    backoff_multiplier: f64,
    max_backoff_multiplier: f64,
    consecutive_bad: u32,
    consecutive_ok: u32,
    trigger_threshold: u32,
    observed_p50_latency: Duration,
    latencies: VecDeque<Duration>,
}

impl AdaptiveState {
    fn new(window: Duration, max_backoff_multiplier: f64, trigger_threshold: u32) -> Self {
        Self {
            window,
            records: VecDeque::new(),
            backoff_multiplier: 1.0,
            max_backoff_multiplier,
            consecutive_bad: 0,
            consecutive_ok: 0,
            trigger_threshold,
            observed_p50_latency: Duration::ZERO,
            latencies: VecDeque::with_capacity(64),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.records.front() {
            if now.duration_since(front.at) > self.window {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, outcome: Outcome, now: Instant) {
        match outcome {
            Outcome::Ok => {
                self.records.push_back(OutcomeRecord { at: now, is_error: false });
                self.consecutive_ok += 1;
                self.consecutive_bad = 0;
                // Decay: halve the multiplier after a run of OK outcomes
                // equal to the trigger threshold, down to a floor of 1.0.
                if self.consecutive_ok >= self.trigger_threshold.max(1) {
                    self.backoff_multiplier = (self.backoff_multiplier / 2.0).max(1.0);
                    self.consecutive_ok = 0;
                }
            }
            Outcome::ServerError | Outcome::Timeout => {
                self.records.push_back(OutcomeRecord { at: now, is_error: true });
                self.consecutive_bad += 1;
                self.consecutive_ok = 0;
                if self.consecutive_bad >= self.trigger_threshold {
                    self.backoff_multiplier =
                        (self.backoff_multiplier * 2.0).min(self.max_backoff_multiplier);
                }
            }
            Outcome::ClientError => {
                // Client errors are the caller's fault, not the provider's
                // distress; they neither inflate nor relieve backoff.
                self.records.push_back(OutcomeRecord { at: now, is_error: false });
            }
            Outcome::Latency(d) => {
                if self.latencies.len() >= 64 {
                    self.latencies.pop_front();
                }
                self.latencies.push_back(d);
                let mut sorted: Vec<Duration> = self.latencies.iter().copied().collect();
                sorted.sort();
                self.observed_p50_latency = sorted[sorted.len() / 2];
            }
        }
        self.prune(now);
    }

    fn error_rate(&self, now: Instant) -> f64 {
        let mut errors = 0usize;
        let mut total = 0usize;
        for rec in &self.records {
            if now.duration_since(rec.at) <= self.window {
                total += 1;
                if rec.is_error {
                    errors += 1;
                }
            }
        }
        if total == 0 {
            0.0
        } else {
            errors as f64 / total as f64
        }
    }
}

/// Per-provider rate limiter: token bucket, concurrency semaphore, and the
/// adaptive backoff layer, combined (spec.md §4.1).
pub struct ProviderRateLimiter {
    config: RateLimiterConfig,
    bucket: parking_lot::Mutex<TokenBucket>,
    adaptive: parking_lot::Mutex<AdaptiveState>,
    semaphore: Arc<Semaphore>,
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("rate limiter lease unavailable: deadline exceeded")]
pub struct RateLimitUnavailable;

impl ProviderRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let bucket = TokenBucket::new(config.burst as f64, config.refill_rate);
        let adaptive = AdaptiveState::new(
            config.error_window,
            config.max_backoff_multiplier,
            config.backoff_trigger_threshold,
        );
        Self {
            semaphore: Arc::new(Semaphore::new(config.concurrency as usize)),
            bucket: parking_lot::Mutex::new(bucket),
            adaptive: parking_lot::Mutex::new(adaptive),
            config,
        }
    }

    fn effective_refill_rate(&self) -> f64 {
        let multiplier = self.adaptive.lock().backoff_multiplier;
        self.config.refill_rate / multiplier
    }

    /// Blocks (cooperatively, FIFO via the semaphore's own queueing) until
    /// a token and a concurrency slot are available, or `deadline` elapses.
    pub async fn acquire(&self, deadline: Duration) -> Result<Lease, RateLimitUnavailable> {
        let started = Instant::now();

        let remaining = deadline.saturating_sub(started.elapsed());
        let permit = tokio::time::timeout(remaining, self.semaphore.clone().acquire_owned())
            .await
            .map_err(|_| RateLimitUnavailable)?
            .expect("semaphore never closed");

        loop {
            let now = Instant::now();
            if now.duration_since(started) >= deadline {
                drop(permit);
                return Err(RateLimitUnavailable);
            }

            let wait = {
                let mut bucket = self.bucket.lock();
                bucket.try_take(self.effective_refill_rate(), now)
            };

            match wait {
                Ok(()) => return Ok(Lease { _permit: permit }),
                Err(wait_for) => {
                    let time_left = deadline.saturating_sub(now.duration_since(started));
                    if wait_for > time_left {
                        drop(permit);
                        return Err(RateLimitUnavailable);
                    }
                    sleep(wait_for.min(time_left)).await;
                }
            }
        }
    }

    /// Must be called exactly once per `acquire`.
    pub fn release(&self, lease: Lease, outcome: Outcome) {
        drop(lease);
        self.adaptive.lock().record(outcome, Instant::now());
    }

    pub fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        let tokens_available = {
            let mut bucket = self.bucket.lock();
            bucket.refill(self.effective_refill_rate(), now);
            bucket.tokens
        };
        let adaptive = self.adaptive.lock();
        RateLimiterStats {
            tokens_available,
            in_flight: self.config.concurrency - self.semaphore.available_permits() as u32,
            effective_qps: self.config.refill_rate / adaptive.backoff_multiplier,
            backoff_multiplier: adaptive.backoff_multiplier,
            rolling_error_rate: adaptive.error_rate(now),
        }
    }

    pub fn observed_p50_latency(&self) -> Duration {
        self.adaptive.lock().observed_p50_latency
    }
}
