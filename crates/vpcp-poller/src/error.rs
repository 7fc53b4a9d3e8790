use thiserror::Error;
use vpcp_types::{MonotonicityViolation, ProviderJobId};

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("durable store error: {0}")]
    Store(#[from] sled::Error),

    #[error("failed to (de)serialize a ProviderJob: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("no ProviderJob found for id {0}")]
    NotFound(ProviderJobId),

    #[error(transparent)]
    Monotonicity(#[from] MonotonicityViolation),
}
