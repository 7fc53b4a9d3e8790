use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("durable store error: {0}")]
    Store(#[from] sled::Error),

    #[error("failed to (de)serialize a queued task: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("no task found for request_id {0}")]
    NotFound(String),
}
