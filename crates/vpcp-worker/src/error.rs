//! `WorkerError`: the handler-level error surface, distinct from
//! `vpcp_types::VpcpError` (the per-attempt provider/routing taxonomy).
//! A `WorkerError` is what the HTTP layer maps to a status code; a
//! `VpcpError` is what the per-task pipeline classifies an attempt as
//! (spec.md §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The handler pool is full; the queue should retry (spec.md §4.3
    /// "429 / 503 — transient; the queue should retry per its policy").
    #[error("handler pool is at capacity")]
    PoolFull,
    /// The worker-level deadline elapsed before the task reached a terminal
    /// or async-accepted state (spec.md §5 "Cancellation").
    #[error("worker deadline exceeded before the task completed")]
    DeadlineExceeded,
    #[error("durable store error: {0}")]
    Store(String),
    #[error("malformed request body: {0}")]
    BadRequest(String),
}

impl From<vpcp_poller::PollerError> for WorkerError {
    fn from(err: vpcp_poller::PollerError) -> Self {
        WorkerError::Store(err.to_string())
    }
}

impl From<tower_resilience_bulkhead::BulkheadError> for WorkerError {
    fn from(_err: tower_resilience_bulkhead::BulkheadError) -> Self {
        WorkerError::PoolFull
    }
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            WorkerError::PoolFull => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            WorkerError::DeadlineExceeded => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            WorkerError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            WorkerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };
        (status, axum::Json(json!({ "detail": detail }))).into_response()
    }
}
