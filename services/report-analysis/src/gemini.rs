//! Gemini `generateContent` client.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use healthmate_utils::AiConfig;

use crate::ai_client::{GenerationRequest, GenerativeService, ServiceError};

/// Extra headroom over the adapter ceiling so the adapter reports the timeout.
const TRANSPORT_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

pub struct GeminiClient {
    client: Client,
    api_url: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds) + TRANSPORT_TIMEOUT_SLACK)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.api_url, model)
    }
}

#[async_trait]
impl GenerativeService for GeminiClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ServiceError> {
        let mut parts = vec![Part::Text {
            text: request.prompt.to_string(),
        }];
        if let Some(binary) = request.binary {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: binary.mime_type.to_string(),
                    data: BASE64.encode(binary.bytes),
                },
            });
        }

        let body = GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint(request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport(format!("failed to read Gemini response: {}", e)))?;
        let parsed: GeminiResponse =
            serde_json::from_slice(&body).map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ServiceError::EmptyResponse);
        }

        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}
