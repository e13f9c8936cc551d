//! Artifact Fetcher
//!
//! Byte-fetch-by-reference boundary with object storage. The core never
//! interprets `file_ref` beyond handing it to a fetcher.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use healthmate_utils::StorageConfig;

/// Artifact retrieval failed. `status` is the upstream HTTP status when one
/// was received; `None` means the request never got a response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("artifact fetch failed (status {status:?}): {message}")]
pub struct FetchError {
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, file_ref: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches artifacts over HTTP(S), e.g. from pre-signed object storage URLs.
pub struct HttpArtifactFetcher {
    client: Client,
    bearer_token: Option<String>,
}

impl HttpArtifactFetcher {
    pub fn new(config: &StorageConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            bearer_token: config.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, file_ref: &str) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(file_ref);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::new(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Artifact storage rejected fetch");
            return Err(FetchError::new(
                Some(status.as_u16()),
                format!("storage responded with {}", status),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::new(None, format!("failed to read artifact body: {}", e)))?;

        Ok(bytes.to_vec())
    }
}
