use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::common::{join_url, shared_http_client, truncate_for_details};
use crate::client::ChatCompletion;
use crate::error::{ChatError, ChatErrorCode};
use crate::types::ChatMessage;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";

/// Non-streaming client for a local Ollama server (`POST /api/chat`).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    model: String,
    base_url: String,
}

impl OllamaClient {
    pub fn new(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_BASE_URL)
    }
}

#[async_trait]
impl ChatCompletion for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let payload = build_ollama_chat_payload(&self.model, messages);
        let endpoint = join_url(&self.base_url, "api/chat");
        let client = shared_http_client(&self.base_url);

        debug!(
            model = %self.model,
            message_count = messages.len(),
            "sending ollama chat request"
        );

        let response = client
            .post(endpoint.as_str())
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ChatError::new(
                    ChatErrorCode::Transport,
                    format!("Ollama transport failed: {error}"),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_string());
            return Err(ChatError::new(
                ChatErrorCode::Http,
                format!("Ollama HTTP {status}: {body}"),
            ));
        }

        let body = response.text().await.map_err(|error| {
            ChatError::new(
                ChatErrorCode::Transport,
                format!("Ollama response read failed: {error}"),
            )
        })?;
        parse_ollama_chat_reply(&body)
    }
}

pub fn build_ollama_chat_payload(model: &str, messages: &[ChatMessage]) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "stream": false,
    })
}

/// Extracts the trimmed assistant text from a non-streaming `/api/chat` body.
pub fn parse_ollama_chat_reply(body: &str) -> Result<String, ChatError> {
    let value: Value = serde_json::from_str(body).map_err(|error| {
        ChatError::new(
            ChatErrorCode::Protocol,
            format!("Ollama response is not valid JSON: {error}"),
        )
        .with_details(json!({ "bodyPrefix": truncate_for_details(body, 800) }))
    })?;

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(ChatError::new(
            ChatErrorCode::Http,
            format!("Ollama error: {error}"),
        ));
    }

    let content = value
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ChatError::new(
                ChatErrorCode::Protocol,
                "Ollama response did not contain message.content",
            )
            .with_details(json!({ "bodyPrefix": truncate_for_details(body, 800) }))
        })?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::new(
            ChatErrorCode::EmptyReply,
            "Ollama returned an empty reply",
        ));
    }
    Ok(trimmed.to_string())
}
