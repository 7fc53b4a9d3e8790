//! The topic-selection collaborator boundary (spec.md §4.6 "Topic selection
//! is delegated to an external collaborator (`TopicSource.next(platform,
//! tier) -> creative_spec`). The Scheduler does not specify how topics are
//! chosen.").
//!
//! Mirrors `vpcp_poller::UploadCollaborator`: the Scheduler only knows the
//! shape of what comes back, never how it was produced.

use async_trait::async_trait;
use vpcp_types::QualityTier;

#[derive(Debug, thiserror::Error)]
pub enum TopicSourceError {
    #[error("topic source exhausted for platform {0}")]
    Exhausted(String),
    #[error("topic source unreachable: {0}")]
    Unreachable(String),
}

/// The already-expanded creative spec a `TopicSource` hands back. Template
/// expansion / LLM prompt synthesis itself is out of scope (spec.md §1);
/// this is what that pure function produces, consumed here as data.
#[derive(Debug, Clone)]
pub struct CreativeSpec {
    pub prompt: String,
    pub duration_seconds: u32,
    pub aspect_ratio: String,
}

/// `TopicSource.next(platform, tier) -> creative_spec` (spec.md §4.6).
#[async_trait]
pub trait TopicSource: Send + Sync {
    async fn next(&self, platform: &str, tier: QualityTier) -> Result<CreativeSpec, TopicSourceError>;
}

/// A `TopicSource` that cycles through a fixed list of prompts, ignoring
/// platform/tier. Useful for `plan --date` dry-runs and tests that don't
/// exercise the real topic collaborator.
pub struct FixedTopicSource {
    prompts: Vec<String>,
    aspect_ratio: String,
    duration_seconds: u32,
    cursor: std::sync::atomic::AtomicUsize,
}

impl FixedTopicSource {
    pub fn new(prompts: Vec<String>, duration_seconds: u32, aspect_ratio: impl Into<String>) -> Self {
        Self {
            prompts,
            aspect_ratio: aspect_ratio.into(),
            duration_seconds,
            cursor: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TopicSource for FixedTopicSource {
    async fn next(&self, platform: &str, _tier: QualityTier) -> Result<CreativeSpec, TopicSourceError> {
        if self.prompts.is_empty() {
            return Err(TopicSourceError::Exhausted(platform.to_string()));
        }
        let idx = self.cursor.fetch_add(1, std::sync::atomic::Ordering::Relaxed) % self.prompts.len();
        Ok(CreativeSpec {
            prompt: self.prompts[idx].clone(),
            duration_seconds: self.duration_seconds,
            aspect_ratio: self.aspect_ratio.clone(),
        })
    }
}
