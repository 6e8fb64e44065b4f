use crate::chat::types::{ChatMessage, Role, ToolSpec};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The external language model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the conversation and offered tools; return the assistant's message.
    ///
    /// Transport failures, non-2xx responses and responses without a message
    /// are all `ModelUnavailable`.
    async fn complete(&self, history: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage>;
}

/// Client for Ollama's `POST /api/chat` (non-streaming).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[ToolSpec]>::is_empty")]
    tools: &'a [ToolSpec],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ModelUnavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn complete(&self, history: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        let url = format!("{}/api/chat", self.base_url);
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest {
                model: &self.model,
                messages: history,
                tools,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| AppError::ModelUnavailable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ModelUnavailable(format!(
                "Model endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::ModelUnavailable(format!("Malformed model response: {}", e)))?;

        let mut message = parsed.message.ok_or_else(|| {
            AppError::ModelUnavailable("Model response has no 'message'".to_string())
        })?;
        message.role = Role::Assistant;

        tracing::debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            tool_calls = message.tool_calls().len(),
            "Model call completed"
        );

        Ok(message)
    }
}
