//! The Async Poller (C5 of the video production control plane): advances
//! every non-terminal `ProviderJob` toward a terminal state on an
//! age-dependent cadence, attributes completion/failure to its quality
//! tier in the Budget Accountant, and hands successful artifacts to an
//! `UploadCollaborator` (spec.md §4.5).

mod cadence;
mod error;
mod store;
mod tick;
mod upload;

pub use cadence::{base_interval, jittered_interval};
pub use error::PollerError;
pub use store::{ProviderJobStore, SledProviderJobStore};
pub use tick::{Poller, PollerConfig, TickReport};
pub use upload::{NullUploadCollaborator, UploadCollaborator, UploadError};
