//! The upload collaborator boundary (spec.md §1 "Out of scope... the
//! downstream destination-platform upload/publish step is a collaborator
//! the Poller calls into, not something this system implements").
//!
//! `UploadCollaborator` is the seam: the Poller fetches the artifact bytes
//! from the provider and hands them here once a `ProviderJob` reaches
//! SUCCEEDED. What happens after — where it gets published, what receipt
//! comes back — is entirely the collaborator's concern.

use async_trait::async_trait;
use vpcp_types::RequestId;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload collaborator rejected the artifact: {0}")]
    Rejected(String),
    #[error("upload collaborator is unreachable: {0}")]
    Unreachable(String),
}

/// Implemented by whatever downstream publishing system a deployment wires
/// in. The Poller never inspects the artifact bytes itself and never
/// blocks a `ProviderJob`'s terminal state on the outcome of this call —
/// SUCCEEDED is reached once the provider reports success, regardless of
/// whether the upload has completed (spec.md §4.5 point 3).
#[async_trait]
pub trait UploadCollaborator: Send + Sync {
    async fn upload(
        &self,
        request_id: &RequestId,
        artifact: &[u8],
        source_uri: &str,
    ) -> Result<(), UploadError>;
}

/// An `UploadCollaborator` that discards the artifact. Useful for
/// deployments that only need provider-side completion tracking, and for
/// tests that don't exercise the upload path.
pub struct NullUploadCollaborator;

#[async_trait]
impl UploadCollaborator for NullUploadCollaborator {
    async fn upload(
        &self,
        _request_id: &RequestId,
        _artifact: &[u8],
        _source_uri: &str,
    ) -> Result<(), UploadError> {
        Ok(())
    }
}
