//! AI Invocation Adapter
//!
//! Wraps an injected [`GenerativeService`] with model selection, a hard
//! per-call ceiling, error classification, and the single-retry policy.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use healthmate_utils::AiConfig;

use crate::metrics::AnalysisMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Text,
    Vision,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Text => "text",
            ModelKind::Vision => "vision",
        }
    }
}

/// Pure function of binary presence.
pub fn select_model(has_binary: bool) -> ModelKind {
    if has_binary {
        ModelKind::Vision
    } else {
        ModelKind::Text
    }
}

/// Binary content inlined into a request.
#[derive(Debug, Clone, Copy)]
pub struct InlineBinary<'a> {
    pub bytes: &'a [u8],
    pub mime_type: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub binary: Option<InlineBinary<'a>>,
}

/// Failure reported by a generative service implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("generative service responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("generative service unreachable: {0}")]
    Transport(String),

    #[error("generative service returned no text")]
    EmptyResponse,

    /// A success status whose body is not the expected shape.
    #[error("generative service returned an unreadable body: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait GenerativeService: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiErrorKind {
    Timeout,
    Transient,
    Permanent,
}

impl AiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiErrorKind::Timeout => "timeout",
            AiErrorKind::Transient => "transient",
            AiErrorKind::Permanent => "permanent",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("AI invocation failed ({kind:?}): {message}")]
pub struct AiInvocationError {
    pub kind: AiErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl AiInvocationError {
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: AiErrorKind::Timeout,
            status: None,
            message: format!("no response within {:?}", after),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == AiErrorKind::Transient
    }
}

impl From<ServiceError> for AiInvocationError {
    fn from(error: ServiceError) -> Self {
        let message = error.to_string();
        match error {
            ServiceError::Status { status, .. } if (500..600).contains(&status) => Self {
                kind: AiErrorKind::Transient,
                status: Some(status),
                message,
            },
            // Everything else with a status, including auth and quota rejections
            ServiceError::Status { status, .. } => Self {
                kind: AiErrorKind::Permanent,
                status: Some(status),
                message,
            },
            ServiceError::Transport(_) => Self {
                kind: AiErrorKind::Transient,
                status: None,
                message,
            },
            ServiceError::EmptyResponse | ServiceError::MalformedResponse(_) => Self {
                kind: AiErrorKind::Permanent,
                status: None,
                message,
            },
        }
    }
}

pub struct AiAdapter {
    service: Arc<dyn GenerativeService>,
    text_model: String,
    vision_model: String,
    timeout: Duration,
    metrics: AnalysisMetrics,
}

impl AiAdapter {
    pub fn new(
        service: Arc<dyn GenerativeService>,
        text_model: impl Into<String>,
        vision_model: impl Into<String>,
        timeout: Duration,
        metrics: AnalysisMetrics,
    ) -> Self {
        Self {
            service,
            text_model: text_model.into(),
            vision_model: vision_model.into(),
            timeout,
            metrics,
        }
    }

    pub fn from_config(service: Arc<dyn GenerativeService>, config: &AiConfig, metrics: AnalysisMetrics) -> Self {
        Self::new(
            service,
            config.text_model.clone(),
            config.vision_model.clone(),
            Duration::from_secs(config.timeout_seconds),
            metrics,
        )
    }

    pub fn model_name(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::Text => &self.text_model,
            ModelKind::Vision => &self.vision_model,
        }
    }

    /// One call to the generative service, bounded by the adapter timeout.
    pub async fn invoke(&self, prompt: &str, binary: Option<InlineBinary<'_>>) -> Result<String, AiInvocationError> {
        let kind = select_model(binary.is_some());
        let request = GenerationRequest {
            model: self.model_name(kind),
            prompt,
            binary,
        };

        debug!(model = request.model, prompt_len = prompt.len(), "Invoking generative service");

        let result = match tokio::time::timeout(self.timeout, self.service.generate(request)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(AiInvocationError::from(e)),
            Err(_) => Err(AiInvocationError::timeout(self.timeout)),
        };

        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind.as_str(),
        };
        self.metrics.record_invocation(kind.as_str(), label);

        result
    }
}

/// Transient failures are retried exactly once after `backoff`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, AiInvocationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiInvocationError>>,
    {
        match operation().await {
            Err(e) if e.is_transient() => {
                warn!(error = %e, backoff_ms = self.backoff.as_millis() as u64, "Transient AI failure, retrying once");
                tokio::time::sleep(self.backoff).await;
                operation().await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays scripted responses and records the model of each request.
    struct Scripted {
        responses: Mutex<Vec<Result<String, ServiceError>>>,
        models: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<String, ServiceError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                models: Mutex::new(Vec::new()),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl GenerativeService for Scripted {
        async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ServiceError> {
            self.models.lock().unwrap().push(request.model.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn adapter(service: Arc<Scripted>, timeout: Duration) -> AiAdapter {
        AiAdapter::new(service, "text-model", "vision-model", timeout, AnalysisMetrics::new().unwrap())
    }

    #[test]
    fn test_model_selection() {
        assert_eq!(select_model(false), ModelKind::Text);
        assert_eq!(select_model(true), ModelKind::Vision);
    }

    #[test]
    fn test_error_classification() {
        let cases = [
            (ServiceError::Status { status: 503, message: "overloaded".into() }, AiErrorKind::Transient),
            (ServiceError::Status { status: 500, message: "internal".into() }, AiErrorKind::Transient),
            (ServiceError::Status { status: 401, message: "bad key".into() }, AiErrorKind::Permanent),
            (ServiceError::Status { status: 429, message: "quota".into() }, AiErrorKind::Permanent),
            (ServiceError::Transport("connection reset".into()), AiErrorKind::Transient),
            (ServiceError::EmptyResponse, AiErrorKind::Permanent),
            (ServiceError::MalformedResponse("expected value".into()), AiErrorKind::Permanent),
        ];

        for (error, expected) in cases {
            assert_eq!(AiInvocationError::from(error).kind, expected);
        }
    }

    #[tokio::test]
    async fn test_invoke_routes_by_binary_presence() {
        let service = Arc::new(Scripted::new(vec![Ok("a".into()), Ok("b".into())]));
        let adapter = adapter(service.clone(), Duration::from_secs(5));

        adapter.invoke("prompt", None).await.unwrap();
        let binary = InlineBinary { bytes: &[1, 2, 3], mime_type: "image/png" };
        adapter.invoke("prompt", Some(binary)).await.unwrap();

        assert_eq!(*service.models.lock().unwrap(), vec!["text-model", "vision-model"]);
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let mut scripted = Scripted::new(vec![Ok("late".into())]);
        scripted.delay = Some(Duration::from_millis(500));
        let adapter = adapter(Arc::new(scripted), Duration::from_millis(50));

        let err = adapter.invoke("prompt", None).await.unwrap_err();

        assert_eq!(err.kind, AiErrorKind::Timeout);
        assert_eq!(adapter.metrics.invocation_count("text", "timeout"), 1);
    }

    #[tokio::test]
    async fn test_retry_once_on_transient() {
        let service = Arc::new(Scripted::new(vec![
            Err(ServiceError::Status { status: 503, message: "busy".into() }),
            Ok("recovered".into()),
        ]));
        let adapter = adapter(service.clone(), Duration::from_secs(5));
        let retry = RetryPolicy::new(Duration::from_millis(1));

        let text = retry.run(|| adapter.invoke("prompt", None)).await.unwrap();

        assert_eq!(text, "recovered");
        assert_eq!(service.models.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_second_transient() {
        let service = Arc::new(Scripted::new(vec![
            Err(ServiceError::Transport("reset".into())),
            Err(ServiceError::Transport("reset".into())),
            Ok("never reached".into()),
        ]));
        let adapter = adapter(service.clone(), Duration::from_secs(5));

        let err = RetryPolicy::new(Duration::from_millis(1))
            .run(|| adapter.invoke("prompt", None))
            .await
            .unwrap_err();

        assert_eq!(err.kind, AiErrorKind::Transient);
        assert_eq!(service.models.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent() {
        let service = Arc::new(Scripted::new(vec![
            Err(ServiceError::Status { status: 400, message: "bad request".into() }),
            Ok("never reached".into()),
        ]));
        let adapter = adapter(service.clone(), Duration::from_secs(5));

        let err = RetryPolicy::new(Duration::from_millis(1))
            .run(|| adapter.invoke("prompt", None))
            .await
            .unwrap_err();

        assert_eq!(err.kind, AiErrorKind::Permanent);
        assert_eq!(service.models.lock().unwrap().len(), 1);
    }
}
