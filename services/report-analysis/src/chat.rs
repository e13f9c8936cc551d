//! Chat Assistant

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

use healthmate_models::{ChatReply, ChatRequest};
use healthmate_utils::{HealthMateError, HealthMateResult};

use crate::ai_client::{AiAdapter, RetryPolicy};
use crate::prompt::build_chat_prompt;

pub struct ChatAssistant {
    adapter: Arc<AiAdapter>,
    retry: RetryPolicy,
}

impl ChatAssistant {
    pub fn new(adapter: Arc<AiAdapter>, retry: RetryPolicy) -> Self {
        Self { adapter, retry }
    }

    pub async fn reply(&self, request: ChatRequest) -> HealthMateResult<ChatReply> {
        request.validate()?;
        if request.message.trim().is_empty() {
            return Err(HealthMateError::validation("message", "Message is required"));
        }

        let prompt = build_chat_prompt(&request.message, request.context.as_deref());
        let reply = self
            .retry
            .run(|| self.adapter.invoke(&prompt, None))
            .await
            .map_err(|e| {
                warn!(kind = e.kind.as_str(), error = %e, "Chat reply failed");
                HealthMateError::upstream("generative-ai", e.to_string())
            })?;

        Ok(ChatReply {
            reply: reply.trim().to_string(),
            timestamp: Utc::now(),
        })
    }
}
