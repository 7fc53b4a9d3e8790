use std::time::Duration;

/// Mirrors `tower_resilience_bulkhead::BulkheadConfig`'s
/// builder-with-sane-defaults shape (spec.md §6 `queue.*`).
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub worker_url: String,
    pub dispatches_per_second: f64,
    pub max_concurrent_dispatches: usize,
    pub tick_interval: Duration,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("worker_url must not be empty")]
    EmptyWorkerUrl,
    #[error("dispatches_per_second must be positive, got {0}")]
    NonPositiveDispatchRate(f64),
    #[error("max_concurrent_dispatches must be at least 1, got {0}")]
    ZeroConcurrency(usize),
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_url.is_empty() {
            return Err(ConfigError::EmptyWorkerUrl);
        }
        if self.dispatches_per_second <= 0.0 {
            return Err(ConfigError::NonPositiveDispatchRate(self.dispatches_per_second));
        }
        if self.max_concurrent_dispatches == 0 {
            return Err(ConfigError::ZeroConcurrency(self.max_concurrent_dispatches));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    /// Defaults matching spec.md §4.2's retry policy (10s initial / 300s
    /// cap / 5 attempts); `dispatches_per_second`/`max_concurrent_dispatches`
    /// have no spec.md default and are sized for a small single worker.
    fn default() -> Self {
        Self {
            worker_url: String::new(),
            dispatches_per_second: 10.0,
            max_concurrent_dispatches: 20,
            tick_interval: Duration::from_secs(1),
            min_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(300),
            max_attempts: 5,
        }
    }
}
