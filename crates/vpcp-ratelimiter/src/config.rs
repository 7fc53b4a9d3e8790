use std::time::Duration;

/// Static rate-limit shape for one provider, taken from its
/// `ProviderDescriptor.rate_limit` (spec.md §3).
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Token refill rate, in requests/second.
    pub refill_rate: f64,
    /// Bucket capacity (maximum burst).
    pub burst: u32,
    /// Concurrent in-flight cap, enforced independently of the token bucket.
    pub concurrency: u32,
    /// Width of the rolling error-rate window used by the adaptive layer.
    pub error_window: Duration,
    /// Consecutive `SERVER_ERROR`/`TIMEOUT` outcomes before the backoff
    /// multiplier starts doubling.
    pub backoff_trigger_threshold: u32,
    /// Ceiling on `backoff_multiplier`.
    pub max_backoff_multiplier: f64,
}

impl RateLimiterConfig {
    pub fn new(refill_rate: f64, burst: u32, concurrency: u32) -> Self {
        Self {
            refill_rate,
            burst,
            concurrency,
            error_window: Duration::from_secs(60),
            backoff_trigger_threshold: 1,
            max_backoff_multiplier: 8.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refill_rate <= 0.0 {
            return Err(ConfigError::InvalidField("refill_rate must be positive"));
        }
        if self.burst == 0 {
            return Err(ConfigError::InvalidField("burst must be non-zero"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidField("concurrency must be non-zero"));
        }
        if self.max_backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidField(
                "max_backoff_multiplier must be >= 1.0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid rate limiter config: {0}")]
    InvalidField(&'static str),
}
