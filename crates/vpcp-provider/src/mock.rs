//! An in-memory provider adapter used by unit/integration tests and the
//! demo binaries. Scripted to return a canned sequence of outcomes so
//! tests can drive exact scenarios (outage then recovery, hang-then-expire,
//! and so on) deterministically.

use crate::{
    classify_http, ErrorClassification, PollResponse, PollState, ProviderAdapter,
    ProviderAdapterError, SubmitResponse, SubmitState,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use vpcp_types::{ArtifactRetrievalMode, ModelId, OutageSignature};

/// One scripted response to a `submit` or `poll` call.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    SubmitOk { job_id: String },
    SubmitSyncSuccess { job_id: String, artifact_uri: String, credits: u64 },
    SubmitHttpError { status: u16, body: String },
    PollRunning,
    PollSucceeded { artifact_uri: String, credits: u64 },
    PollFailed,
    PollHttpError { status: u16, body: String },
}

/// A provider adapter whose responses are a pre-scripted queue, consumed
/// in order. Calls beyond the script repeat the last entry.
pub struct MockProviderAdapter {
    provider_id: String,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    outage_signatures: Vec<OutageSignature>,
    retrieval_mode: ArtifactRetrievalMode,
}

impl MockProviderAdapter {
    pub fn new(provider_id: impl Into<String>, script: Vec<ScriptedOutcome>) -> Self {
        Self {
            provider_id: provider_id.into(),
            script: Mutex::new(script.into()),
            outage_signatures: vec![
                OutageSignature { status: 522, body_contains: "Connection timed out".into() },
                OutageSignature { status: 523, body_contains: "Origin Is Unreachable".into() },
            ],
            retrieval_mode: ArtifactRetrievalMode::InlineUrl,
        }
    }

    fn next(&self) -> Option<ScriptedOutcome> {
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockProviderAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn submit(
        &self,
        _model: &ModelId,
        _prompt: &str,
        _duration_seconds: u32,
        _aspect_ratio: &str,
        _reference_asset: Option<&str>,
    ) -> Result<SubmitResponse, ProviderAdapterError> {
        match self.next() {
            Some(ScriptedOutcome::SubmitOk { job_id }) => Ok(SubmitResponse {
                job_id,
                state: SubmitState::Submitted,
                artifact_uri: None,
                credits_charged: None,
            }),
            Some(ScriptedOutcome::SubmitSyncSuccess { job_id, artifact_uri, credits }) => {
                Ok(SubmitResponse {
                    job_id,
                    state: SubmitState::Succeeded,
                    artifact_uri: Some(artifact_uri),
                    credits_charged: Some(credits),
                })
            }
            Some(ScriptedOutcome::SubmitHttpError { status, body }) => {
                let classification = classify_http(status, &body, &self.outage_signatures);
                Err(ProviderAdapterError::Transport {
                    detail: format!("{status}: {body}"),
                    classification,
                })
            }
            _ => Err(ProviderAdapterError::MalformedResponse),
        }
    }

    async fn poll(&self, _job_id: &str) -> Result<PollResponse, ProviderAdapterError> {
        match self.next() {
            Some(ScriptedOutcome::PollRunning) => Ok(PollResponse {
                state: PollState::Running,
                artifact_uri: None,
                failure_kind: None,
                credits_charged: None,
            }),
            Some(ScriptedOutcome::PollSucceeded { artifact_uri, credits }) => Ok(PollResponse {
                state: PollState::Succeeded,
                artifact_uri: Some(artifact_uri),
                failure_kind: None,
                credits_charged: Some(credits),
            }),
            Some(ScriptedOutcome::PollFailed) => Ok(PollResponse {
                state: PollState::Failed,
                artifact_uri: None,
                failure_kind: Some(vpcp_types::FailureKind::ProviderClientError),
                credits_charged: None,
            }),
            Some(ScriptedOutcome::PollHttpError { status, body }) => {
                let classification = classify_http(status, &body, &self.outage_signatures);
                Err(ProviderAdapterError::Transport {
                    detail: format!("{status}: {body}"),
                    classification,
                })
            }
            _ => Err(ProviderAdapterError::MalformedResponse),
        }
    }

    async fn fetch_artifact(&self, uri: &str) -> Result<Vec<u8>, ProviderAdapterError> {
        Ok(uri.as_bytes().to_vec())
    }

    fn artifact_retrieval_mode(&self) -> ArtifactRetrievalMode {
        self.retrieval_mode
    }

    fn classify_error(&self, http_status: u16, body: &str) -> ErrorClassification {
        classify_http(http_status, body, &self.outage_signatures)
    }
}
