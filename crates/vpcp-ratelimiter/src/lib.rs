//! The Rate Limiter (C1 of the video production control plane): per-provider
//! token bucket, concurrency cap, and adaptive backoff driven by observed
//! outcomes (spec.md §4.1).

mod config;
mod limiter;
mod registry;

pub use config::{ConfigError, RateLimiterConfig};
pub use limiter::{Lease, Outcome, ProviderRateLimiter, RateLimiterStats, RateLimitUnavailable};
pub use registry::RateLimiterRegistry;
