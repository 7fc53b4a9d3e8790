//! The Queue Manager (C2 of the video production control plane): durable,
//! at-least-once task delivery with delayed scheduling and retry-with-
//! backoff, independent of the per-provider rate limiting in `vpcp-ratelimiter`.

mod config;
mod dispatch;
mod dispatcher;
mod error;
mod store;
mod task;

pub use config::{ConfigError, QueueConfig};
pub use dispatch::{DispatchError, DispatchOutcome};
pub use dispatcher::QueueManager;
pub use error::QueueError;
pub use store::{SledTaskQueue, TaskQueue};
pub use task::{QueueStatus, QueuedTask, TaskHandle};
