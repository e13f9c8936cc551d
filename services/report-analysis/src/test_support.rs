//! Deterministic collaborators for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ai_client::{AiAdapter, GenerationRequest, GenerativeService, RetryPolicy, ServiceError};
use crate::metrics::AnalysisMetrics;
use crate::storage::{ArtifactFetcher, FetchError};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub prompt: String,
    pub has_binary: bool,
}

/// Replays queued replies in order; an exhausted queue answers with `EmptyResponse`.
#[derive(Default)]
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, ServiceError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedService {
    pub fn replying(replies: Vec<Result<String, ServiceError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeService for ScriptedService {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ServiceError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            model: request.model.to_string(),
            prompt: request.prompt.to_string(),
            has_binary: request.binary.is_some(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ServiceError::EmptyResponse))
    }
}

/// Serves artifacts from memory; unknown references are a 404.
#[derive(Default)]
pub struct MemoryFetcher {
    artifacts: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn with(mut self, file_ref: &str, bytes: &[u8]) -> Self {
        self.artifacts.insert(file_ref.to_string(), bytes.to_vec());
        self
    }
}

#[async_trait]
impl ArtifactFetcher for MemoryFetcher {
    async fn fetch(&self, file_ref: &str) -> Result<Vec<u8>, FetchError> {
        self.artifacts
            .get(file_ref)
            .cloned()
            .ok_or_else(|| FetchError::new(Some(404), "not found"))
    }
}

pub fn adapter(service: Arc<ScriptedService>, metrics: AnalysisMetrics) -> Arc<AiAdapter> {
    Arc::new(AiAdapter::new(service, "text-model", "vision-model", Duration::from_secs(5), metrics))
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(1))
}

/// Treats PDF bytes as UTF-8 text.
pub fn utf8_decoder(data: &[u8]) -> anyhow::Result<String> {
    Ok(String::from_utf8_lossy(data).into_owned())
}
