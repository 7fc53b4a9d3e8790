//! The Worker (C3 of the video production control plane): receives a
//! delivered task over HTTP, drives it through routing and rate-limited
//! submission, and reports a terminal HTTP outcome to the queue (spec.md
//! §4.3).

mod config;
mod error;
mod failure_log;
mod http;
mod pipeline;
mod state;

pub use config::{ConfigError, WorkerConfig};
pub use error::WorkerError;
pub use failure_log::{FailureLog, FailureRecord};
pub use http::{router, AppState};
pub use pipeline::{process, ProcessOutcome};
pub use state::{WorkerState, WorkerStats};
