//! The Worker's HTTP surface (spec.md §4.3): `POST /process_video_job`,
//! `GET /health`, `GET /stats`. Follows the `demos/axum-resilient-kv-store`
//! shape — a tower `Service` wrapped behind an `Arc<Mutex<...>>` in
//! `AppState`, called explicitly with `ServiceExt::ready`/`call` inside the
//! handler — generalized from one bulkhead-wrapped service to the whole
//! per-task pipeline instead of a single downstream call.

use crate::error::WorkerError;
use crate::pipeline::{self, ProcessOutcome};
use crate::state::WorkerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower::util::BoxCloneService;
use tower::{Service, ServiceBuilder, ServiceExt};
use tower_resilience_bulkhead::BulkheadConfig;
use vpcp_types::TaskEnvelope;

type AdmissionService = BoxCloneService<TaskEnvelope, ProcessOutcome, WorkerError>;

#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<WorkerState>,
    admission: Arc<Mutex<AdmissionService>>,
}

impl AppState {
    pub fn new(worker: Arc<WorkerState>) -> Self {
        let admission = build_admission_service(Arc::clone(&worker));
        Self {
            worker,
            admission: Arc::new(Mutex::new(admission)),
        }
    }
}

/// The handler-pool bound (spec.md §5 "a bounded pool of in-flight task
/// handlers"; §4.3 "429 / 503 — transient; the queue should retry").
///
/// Wraps the whole per-task pipeline in a `Bulkhead` rather than layering it
/// onto the axum `Router` directly, the same shape `vpcp_queue::dispatch`
/// uses for its own concurrency cap: a short `max_wait_duration` turns the
/// bulkhead into a non-blocking admission check instead of a queue.
fn build_admission_service(worker: Arc<WorkerState>) -> AdmissionService {
    let bulkhead = BulkheadConfig::builder()
        .max_concurrent_calls(worker.config.handler_pool_size)
        .max_wait_duration(Some(Duration::from_millis(1)))
        .name("worker-handler-pool")
        .build();

    let deadline_budget = worker.config.per_request_deadline;
    let service = ServiceBuilder::new().layer(bulkhead).service_fn(move |envelope: TaskEnvelope| {
        let worker = Arc::clone(&worker);
        async move {
            worker.begin_request();
            let outcome = run_with_deadline(&worker, envelope, deadline_budget).await;
            worker.end_request();
            outcome
        }
    });

    BoxCloneService::new(service)
}

/// The deadline cascade of spec.md §5 ("every suspension point... must
/// honor a deadline derived from the queue's per-delivery timeout"),
/// applied with `tokio::time::timeout` directly around the whole pipeline
/// rather than through a middleware layer.
async fn run_with_deadline(worker: &WorkerState, envelope: TaskEnvelope, budget: Duration) -> Result<ProcessOutcome, WorkerError> {
    let deadline = Instant::now() + budget;
    match tokio::time::timeout(budget, pipeline::process(worker, &envelope, deadline)).await {
        Ok(result) => result,
        Err(_) => Err(WorkerError::DeadlineExceeded),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/process_video_job", post(process_video_job))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/failures", get(failures))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn process_video_job(State(state): State<AppState>, Json(envelope): Json<TaskEnvelope>) -> axum::response::Response {
    let mut admission = state.admission.lock().await;
    let request_id = envelope.request_id();

    let ready = match admission.ready().await {
        Ok(svc) => svc,
        Err(err) => return err.into_response(),
    };

    match ready.call(envelope).await {
        Ok(outcome) => outcome_response(request_id, outcome),
        Err(err) => err.into_response(),
    }
}

fn outcome_response(request_id: vpcp_types::RequestId, outcome: ProcessOutcome) -> axum::response::Response {
    let body = match &outcome {
        ProcessOutcome::Duplicate => json!({ "request_id": request_id.to_string(), "status": "duplicate" }),
        ProcessOutcome::Succeeded => json!({ "request_id": request_id.to_string(), "status": "succeeded" }),
        ProcessOutcome::HandedToPoller => json!({ "request_id": request_id.to_string(), "status": "running" }),
        ProcessOutcome::Failed { reason } => json!({
            "request_id": request_id.to_string(),
            "status": "failed",
            "reason": reason,
        }),
    };
    Json(body).into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.worker.stats();
    let saturated = stats.in_flight >= state.worker.config.handler_pool_size as u64;
    Json(json!({
        "status": if saturated { "degraded" } else { "healthy" },
        "components": {
            "rate_limiter": "ok",
            "router": "ok",
            "budget": "ok",
        },
    }))
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.worker.stats();
    Json(json!({
        "processed": stats.processed,
        "in_flight": stats.in_flight,
        "last_job_at": stats.last_job_at.map(|t| t.to_string()),
        "uptime_seconds": stats.uptime.as_secs(),
    }))
}

#[derive(serde::Deserialize)]
struct FailuresQuery {
    #[serde(default = "default_failures_limit")]
    limit: usize,
}

fn default_failures_limit() -> usize {
    20
}

/// `GET /failures?limit=N`: the most recent terminal failures this worker
/// has seen (spec.md §7's structured failure record), for `vpcp status` to
/// surface. Additive to the stable three-route surface above.
async fn failures(State(state): State<AppState>, axum::extract::Query(query): axum::extract::Query<FailuresQuery>) -> impl IntoResponse {
    Json(state.worker.failures.recent(query.limit))
}
