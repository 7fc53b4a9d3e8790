//! `WorkerConfig` (spec.md §6 `worker.{handler_pool_size,
//! per_request_deadline_seconds, worker_url_seen_by_queue}`), following the
//! `*Config::validate()` shape used throughout this workspace
//! (`vpcp_ratelimiter::RateLimiterConfig`, `vpcp_poller::PollerConfig`).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bound on concurrently in-flight `/process_video_job` handlers
    /// (spec.md §5 "a bounded pool of in-flight task handlers").
    pub handler_pool_size: usize,
    /// The deadline passed down the whole call chain for one delivery
    /// (spec.md §4.3 "Suspension points... must honor a Worker-level
    /// deadline"). Default 900s, matching the queue's per-delivery timeout.
    pub per_request_deadline: Duration,
    /// The URL this worker is reachable at from the Queue Manager's point of
    /// view. Not used by the worker itself; carried so it can be reported in
    /// `/stats` or logged at startup.
    pub worker_url_seen_by_queue: String,
    /// Hard cap on providers excluded per request during failover (spec.md
    /// §4.4 "Failover during a single request... up to a hard cap (default
    /// 3 providers per request)").
    pub max_failover_providers: u32,
}

impl WorkerConfig {
    pub fn new(worker_url_seen_by_queue: impl Into<String>) -> Self {
        Self {
            handler_pool_size: 16,
            per_request_deadline: Duration::from_secs(900),
            worker_url_seen_by_queue: worker_url_seen_by_queue.into(),
            max_failover_providers: 3,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handler_pool_size == 0 {
            return Err(ConfigError::InvalidField("handler_pool_size must be non-zero"));
        }
        if self.per_request_deadline.is_zero() {
            return Err(ConfigError::InvalidField("per_request_deadline must be non-zero"));
        }
        if self.max_failover_providers == 0 {
            return Err(ConfigError::InvalidField("max_failover_providers must be non-zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid worker configuration: {0}")]
    InvalidField(&'static str),
}
