//! One HTTP delivery attempt against a Worker, and the classification of
//! its outcome: 2xx acks, 4xx (non-429) is permanent, 5xx/429/network is
//! transient.
//!
//! Concurrency is bounded by wrapping the POST in a `Bulkhead` service.
//! The rate limiter is applied separately as an admission gate (`RateGate`
//! below) rather than stacked on top of the same service: its `Service`
//! impl hard-codes `type Error = RateLimiterError` and discards whatever
//! error the wrapped service returned, which would erase the HTTP status
//! classification this dispatcher depends on.

use std::time::Duration;
use thiserror::Error;
use tower::{Layer, Service, ServiceBuilder, ServiceExt};
use tower_resilience_bulkhead::{BulkheadConfig, BulkheadError};
use tower_resilience_ratelimiter::{RateLimiterConfig, RateLimiterError};
use vpcp_types::TaskEnvelope;

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("dispatch bulkhead: {0}")]
    Bulkhead(#[from] BulkheadError),
    #[error("request building failed: {0}")]
    Request(String),
}

/// What happened to one delivery attempt (spec.md §4.2 "Delivery"):
/// 2xx acks, 4xx (non-429) is permanent, 5xx/429/network is transient.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Ack,
    Permanent { status: Option<u16>, detail: String },
    Transient { status: Option<u16>, detail: String },
}

pub fn classify_status(status: reqwest::StatusCode) -> DispatchOutcome {
    if status.is_success() {
        DispatchOutcome::Ack
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DispatchOutcome::Transient {
            status: Some(status.as_u16()),
            detail: status.to_string(),
        }
    } else {
        DispatchOutcome::Permanent {
            status: Some(status.as_u16()),
            detail: status.to_string(),
        }
    }
}

/// Delivers one `TaskEnvelope` to `worker_url`, carrying the headers spec.md
/// §4.2/§6 name (`X-Attempt-No`, `X-Request-Id`, `X-Enqueue-Time`).
async fn deliver(client: reqwest::Client, worker_url: String, envelope: TaskEnvelope) -> Result<DispatchOutcome, DispatchError> {
    let body = serde_json::to_vec(&envelope).map_err(|e| DispatchError::Request(e.to_string()))?;

    let result = client
        .post(&worker_url)
        .header("X-Attempt-No", envelope.attempt_no.to_string())
        .header("X-Request-Id", envelope.request_id().to_string())
        .header(
            "X-Enqueue-Time",
            envelope
                .enqueue_time
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
        )
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) => Ok(classify_status(response.status())),
        Err(err) => Ok(DispatchOutcome::Transient {
            status: None,
            detail: err.to_string(),
        }),
    }
}

/// The concurrency-bounded delivery service: `max_concurrent_dispatches`
/// applied at the queue layer, independent of any per-provider limiter
/// (spec.md §4.2 "Rate control").
pub fn dispatch_service(
    client: reqwest::Client,
    worker_url: String,
    max_concurrent_dispatches: usize,
) -> tower::util::BoxCloneService<TaskEnvelope, DispatchOutcome, DispatchError> {
    let bulkhead = BulkheadConfig::builder()
        .max_concurrent_calls(max_concurrent_dispatches)
        .name("queue-dispatch")
        .build();

    let service = ServiceBuilder::new().layer(bulkhead).service_fn(move |envelope: TaskEnvelope| {
        let client = client.clone();
        let worker_url = worker_url.clone();
        deliver(client, worker_url, envelope)
    });

    tower::util::BoxCloneService::new(service)
}

/// A global `dispatches_per_second` admission gate, applied before a task
/// is handed to `dispatch_service` (spec.md §4.2 "Rate control").
///
/// Wraps a trivial no-op service rather than the dispatch call itself,
/// since `tower_resilience_ratelimiter::RateLimiter<S>` fixes its `Error`
/// type to `RateLimiterError` and discards the inner service's error.
pub struct RateGate {
    inner: tower_resilience_ratelimiter::RateLimiter<tower::util::BoxCloneService<(), (), RateLimiterError>>,
}

impl RateGate {
    pub fn new(dispatches_per_second: f64) -> Self {
        let limit_for_period = dispatches_per_second.max(1.0).round() as usize;
        let config = RateLimiterConfig::builder()
            .limit_for_period(limit_for_period)
            .refresh_period(Duration::from_secs(1))
            .timeout_duration(Duration::from_millis(1))
            .name("queue-dispatch-rate")
            .build();

        let noop = tower::util::BoxCloneService::new(tower::service_fn(|_: ()| async { Ok::<(), RateLimiterError>(()) }));
        let inner = config.layer(noop);
        Self { inner }
    }

    /// Non-blocking: `true` if a dispatch slot is available this instant.
    pub async fn try_acquire(&mut self) -> bool {
        match self.inner.ready().await {
            Ok(svc) => svc.call(()).await.is_ok(),
            Err(_) => false,
        }
    }
}
