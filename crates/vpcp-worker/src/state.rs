//! `WorkerState`: the shared, per-process state every handler reads from
//! (spec.md §5 "one Rate Limiter instance shared by handlers, one Router
//! instance shared by handlers"). Mirrors the `AppState` shape of the
//! teacher's axum demo (`demos/axum-resilient-kv-store`), but wraps a set
//! of collaborators instead of a single tower `Service`.

use crate::config::WorkerConfig;
use crate::failure_log::FailureLog;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use vpcp_budget::BudgetAccountant;
use vpcp_poller::{ProviderJobStore, UploadCollaborator};
use vpcp_provider::ProviderAdapter;
use vpcp_ratelimiter::RateLimiterRegistry;
use vpcp_router::{NoViableProvider, Router};
use vpcp_types::{GenerationRequest, ModelId, ProviderId};

pub struct WorkerState {
    pub store: Arc<dyn ProviderJobStore>,
    pub adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
    pub rate_limiter: Arc<RateLimiterRegistry>,
    pub router: Arc<Router>,
    pub budget: Arc<BudgetAccountant>,
    pub upload: Arc<dyn UploadCollaborator>,
    pub config: WorkerConfig,
    pub failures: FailureLog,
    started_at: Instant,
    processed: AtomicU64,
    in_flight: AtomicU64,
    last_job_at: RwLock<Option<OffsetDateTime>>,
}

impl WorkerState {
    pub fn new(
        store: Arc<dyn ProviderJobStore>,
        adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
        rate_limiter: Arc<RateLimiterRegistry>,
        router: Arc<Router>,
        budget: Arc<BudgetAccountant>,
        upload: Arc<dyn UploadCollaborator>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            adapters,
            rate_limiter,
            router,
            budget,
            upload,
            config,
            failures: FailureLog::new(),
            started_at: Instant::now(),
            processed: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            last_job_at: RwLock::new(None),
        }
    }

    /// Wraps `Router::select`, supplying the observed-latency map from the
    /// Rate Limiter (spec.md §4.4 "observed_p50_latency").
    pub fn select_provider(&self, request: &GenerationRequest, excluded: &HashSet<ProviderId>) -> Result<(ProviderId, ModelId), NoViableProvider> {
        let observed: HashMap<ProviderId, Duration> = self
            .router
            .descriptors()
            .iter()
            .filter_map(|d| self.rate_limiter.observed_p50_latency(&d.provider_id).map(|lat| (d.provider_id.clone(), lat)))
            .collect();
        self.router.select(request, excluded, &observed)
    }

    /// The credit cost of the model `select_provider` chose, looked up from
    /// the Router's own descriptors rather than recomputed, so this can
    /// never disagree with what the Router actually priced.
    pub fn credit_cost(&self, provider_id: &str, model_id: &str) -> Option<u64> {
        self.router
            .descriptors()
            .iter()
            .find(|d| d.provider_id == provider_id)
            .and_then(|d| d.models.iter().find(|m| m.model_id == model_id))
            .map(|m| m.credit_cost)
    }

    pub fn begin_request(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn end_request(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
        *self.last_job_at.write() = Some(OffsetDateTime::now_utc());
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            processed: self.processed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            last_job_at: *self.last_job_at.read(),
            uptime: self.started_at.elapsed(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerStats {
    pub processed: u64,
    pub in_flight: u64,
    pub last_job_at: Option<OffsetDateTime>,
    pub uptime: Duration,
}
