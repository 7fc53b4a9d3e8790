//! `AppConfig`: loads and validates the full configuration surface named in
//! spec.md §6 (`providers[]`, `router.*`, `queue.*`, `worker.*`,
//! `scheduler.*`, `poller.*`) from a TOML file, the way every other
//! `*Config` in this workspace separates "plain data" from "validated and
//! ready to build a component from".

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use vpcp_types::{ArtifactRetrievalMode, OutageSignature, ProviderDescriptor, ProviderModel, QualityTier, RateLimitSpec};

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    /// Carried for adapter construction / operator visibility; the Router
    /// and Budget only ever see the derived `ProviderDescriptor`.
    pub base_url: String,
    #[serde(default)]
    pub credentials_ref: Option<String>,
    pub models: Vec<ProviderModel>,
    pub rate_limit: RateLimitSpec,
    pub artifact_retrieval_mode: ArtifactRetrievalMode,
    pub daily_credit_cap: u64,
    #[serde(default)]
    pub typical_latency_seconds: f64,
    #[serde(default)]
    pub known_outage_signatures: Vec<OutageSignature>,
}

impl ProviderConfig {
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            provider_id: self.id.clone(),
            models: self.models.clone(),
            rate_limit: self.rate_limit.clone(),
            artifact_retrieval_mode: self.artifact_retrieval_mode.clone(),
            typical_latency_seconds: self.typical_latency_seconds,
            daily_credit_cap: self.daily_credit_cap,
            known_outage_signatures: self.known_outage_signatures.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TierUpliftPolicyConfig {
    Never,
    OnExhaustion,
    AlwaysIfCheaper,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfigSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_request: u32,
    #[serde(default)]
    pub tier_uplift_policy: Option<TierUpliftPolicyConfig>,
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for RouterConfigSection {
    fn default() -> Self {
        Self {
            max_attempts_per_request: default_max_attempts(),
            tier_uplift_policy: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfigSection {
    #[serde(default = "default_dispatches_per_second")]
    pub dispatches_per_second: f64,
    #[serde(default = "default_max_concurrent_dispatches")]
    pub max_concurrent_dispatches: usize,
    #[serde(default = "default_min_backoff")]
    pub min_backoff_seconds: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,
    #[serde(default = "default_max_attempts_5")]
    pub max_attempts: u32,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
}

fn default_dispatches_per_second() -> f64 {
    10.0
}
fn default_max_concurrent_dispatches() -> usize {
    20
}
fn default_min_backoff() -> u64 {
    10
}
fn default_max_backoff() -> u64 {
    300
}
fn default_max_attempts_5() -> u32 {
    5
}
fn default_tick_interval() -> u64 {
    1
}

impl Default for QueueConfigSection {
    fn default() -> Self {
        Self {
            dispatches_per_second: default_dispatches_per_second(),
            max_concurrent_dispatches: default_max_concurrent_dispatches(),
            min_backoff_seconds: default_min_backoff(),
            max_backoff_seconds: default_max_backoff(),
            max_attempts: default_max_attempts_5(),
            tick_interval_seconds: default_tick_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfigSection {
    #[serde(default = "default_handler_pool_size")]
    pub handler_pool_size: usize,
    #[serde(default = "default_per_request_deadline")]
    pub per_request_deadline_seconds: u64,
    #[serde(default)]
    pub worker_url_seen_by_queue: String,
    #[serde(default = "default_max_failover_providers")]
    pub max_failover_providers: u32,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_handler_pool_size() -> usize {
    16
}
fn default_per_request_deadline() -> u64 {
    900
}
fn default_max_failover_providers() -> u32 {
    3
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

impl Default for WorkerConfigSection {
    fn default() -> Self {
        Self {
            handler_pool_size: default_handler_pool_size(),
            per_request_deadline_seconds: default_per_request_deadline(),
            worker_url_seen_by_queue: String::new(),
            max_failover_providers: default_max_failover_providers(),
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchWindowConfig {
    pub time_utc: String,
    pub tier_weights: HashMap<QualityTier, f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchedulerConfigSection {
    #[serde(default)]
    pub daily_target: u64,
    #[serde(default)]
    pub tier_shares: HashMap<QualityTier, f64>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub batch_windows: Vec<BatchWindowConfig>,
    #[serde(default)]
    pub tier_estimated_credit_cost: HashMap<QualityTier, u64>,
    #[serde(default)]
    pub gated_providers: Vec<String>,
    #[serde(default)]
    pub topic_source_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfigSection {
    #[serde(default = "default_poller_initial")]
    pub initial_interval_seconds: u64,
    #[serde(default = "default_poller_max")]
    pub max_interval_seconds: u64,
    #[serde(default = "default_poller_horizon")]
    pub growth_horizon_seconds: u64,
    #[serde(default = "default_poller_jitter")]
    pub jitter_fraction: f64,
    #[serde(default = "default_poller_lifetime")]
    pub max_job_lifetime_per_provider_seconds: u64,
    #[serde(default = "default_poller_concurrency")]
    pub max_concurrent_polls: usize,
    #[serde(default = "default_poller_job_deadline")]
    pub per_job_deadline_seconds: u64,
}

fn default_poller_initial() -> u64 {
    10
}
fn default_poller_max() -> u64 {
    120
}
fn default_poller_horizon() -> u64 {
    300
}
fn default_poller_jitter() -> f64 {
    0.10
}
fn default_poller_lifetime() -> u64 {
    24 * 3600
}
fn default_poller_concurrency() -> usize {
    32
}
fn default_poller_job_deadline() -> u64 {
    30
}

impl Default for PollerConfigSection {
    fn default() -> Self {
        Self {
            initial_interval_seconds: default_poller_initial(),
            max_interval_seconds: default_poller_max(),
            growth_horizon_seconds: default_poller_horizon(),
            jitter_fraction: default_poller_jitter(),
            max_job_lifetime_per_provider_seconds: default_poller_lifetime(),
            max_concurrent_polls: default_poller_concurrency(),
            per_job_deadline_seconds: default_poller_job_deadline(),
        }
    }
}

/// The top-level configuration surface of spec.md §6, assembled from one
/// TOML file. Each section maps onto the `*Config` the corresponding
/// crate already validates; `AppConfig::validate` only checks the parts
/// that don't have a natural home in any one crate (e.g. that every
/// provider id referenced elsewhere is actually configured).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub router: RouterConfigSection,
    #[serde(default)]
    pub queue: QueueConfigSection,
    #[serde(default)]
    pub worker: WorkerConfigSection,
    #[serde(default)]
    pub scheduler: SchedulerConfigSection,
    #[serde(default)]
    pub poller: PollerConfigSection,
    /// Local sled data directory holding the queue's and Poller's durable
    /// stores. Not part of spec.md §6's named surface, but every daemon
    /// needs one, so `vpcp` picks a home for it here rather than scattering
    /// `--data-dir` flags across subcommands.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "./vpcp-data".into()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no providers configured")]
    NoProviders,
    #[error("duplicate provider id: {0}")]
    DuplicateProvider(String),
    #[error("scheduler.gated_providers references unknown provider: {0}")]
    UnknownGatedProvider(String),
    #[error("invalid queue configuration: {0}")]
    Queue(#[from] vpcp_queue::ConfigError),
    #[error("invalid worker configuration: {0}")]
    Worker(#[from] vpcp_worker::ConfigError),
    #[error("invalid scheduler configuration: {0}")]
    Scheduler(#[from] vpcp_scheduler::ConfigError),
    #[error("invalid batch window time {0:?}: {1}")]
    BadBatchWindowTime(String, time::error::Parse),
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.id.clone()) {
                return Err(ConfigError::DuplicateProvider(provider.id.clone()));
            }
        }
        for gated in &self.scheduler.gated_providers {
            if !seen.contains(gated) {
                return Err(ConfigError::UnknownGatedProvider(gated.clone()));
            }
        }
        Ok(())
    }

    pub fn worker_deadline(&self) -> Duration {
        Duration::from_secs(self.worker.per_request_deadline_seconds)
    }

    pub fn queue_config(&self, worker_url: impl Into<String>) -> Result<vpcp_queue::QueueConfig, ConfigError> {
        let config = vpcp_queue::QueueConfig {
            worker_url: worker_url.into(),
            dispatches_per_second: self.queue.dispatches_per_second,
            max_concurrent_dispatches: self.queue.max_concurrent_dispatches,
            tick_interval: Duration::from_secs(self.queue.tick_interval_seconds),
            min_backoff: Duration::from_secs(self.queue.min_backoff_seconds),
            max_backoff: Duration::from_secs(self.queue.max_backoff_seconds),
            max_attempts: self.queue.max_attempts,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn worker_config(&self) -> Result<vpcp_worker::WorkerConfig, ConfigError> {
        let config = vpcp_worker::WorkerConfig {
            handler_pool_size: self.worker.handler_pool_size,
            per_request_deadline: self.worker_deadline(),
            worker_url_seen_by_queue: self.worker.worker_url_seen_by_queue.clone(),
            max_failover_providers: self.worker.max_failover_providers,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn router_policy(&self) -> vpcp_router::RouterPolicy {
        use vpcp_router::TierUpliftPolicy;
        let tier_uplift_policy = match self.router.tier_uplift_policy {
            Some(TierUpliftPolicyConfig::Never) => TierUpliftPolicy::Never,
            Some(TierUpliftPolicyConfig::OnExhaustion) | None => TierUpliftPolicy::OnExhaustion,
            Some(TierUpliftPolicyConfig::AlwaysIfCheaper) => TierUpliftPolicy::AlwaysIfCheaper,
        };
        vpcp_router::RouterPolicy {
            max_attempts_per_request: self.router.max_attempts_per_request,
            tier_uplift_policy,
        }
    }

    pub fn poller_config(&self) -> vpcp_poller::PollerConfig {
        vpcp_poller::PollerConfig {
            initial_interval: Duration::from_secs(self.poller.initial_interval_seconds),
            max_interval: Duration::from_secs(self.poller.max_interval_seconds),
            growth_horizon: Duration::from_secs(self.poller.growth_horizon_seconds),
            jitter_fraction: self.poller.jitter_fraction,
            max_job_lifetime: Duration::from_secs(self.poller.max_job_lifetime_per_provider_seconds),
            max_concurrent_polls: self.poller.max_concurrent_polls,
            per_job_deadline: Duration::from_secs(self.poller.per_job_deadline_seconds),
        }
    }

    pub fn scheduler_config(&self) -> Result<vpcp_scheduler::SchedulerConfig, ConfigError> {
        let mut batch_windows = Vec::with_capacity(self.scheduler.batch_windows.len());
        for window in &self.scheduler.batch_windows {
            let time = parse_hms(&window.time_utc).map_err(|e| ConfigError::BadBatchWindowTime(window.time_utc.clone(), e))?;
            batch_windows.push(vpcp_scheduler::BatchWindow::new(time, window.tier_weights.clone()));
        }
        let config = vpcp_scheduler::SchedulerConfig {
            daily_target: self.scheduler.daily_target,
            tier_shares: self.scheduler.tier_shares.clone(),
            platforms: self.scheduler.platforms.clone(),
            batch_windows,
            tier_estimated_credit_cost: self.scheduler.tier_estimated_credit_cost.clone(),
            gated_providers: self.scheduler.gated_providers.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Accepts a bare `HH:MM` or `HH:MM:SS` time-of-day, the natural shape for
/// `scheduler.batch_windows_utc[]` in a TOML file, without requiring a full
/// RFC3339 timestamp.
fn parse_hms(s: &str) -> Result<time::Time, time::error::Parse> {
    let format = time::format_description::parse("[hour]:[minute]:[second]").expect("static format description");
    if let Ok(t) = time::Time::parse(s, &format) {
        return Ok(t);
    }
    let short_format = time::format_description::parse("[hour]:[minute]").expect("static format description");
    time::Time::parse(s, &short_format)
}
