//! LLM provider client.
//!
//! The pipeline talks to the model through the [`LlmClient`] trait so tests
//! can script completions. The production implementation is
//! [`OpenRouterClient`], a thin wrapper over the OpenRouter chat completions
//! API.

use crate::config::LlmConfig;
use crate::error::ServiceError;
use crate::usage::TokenUsage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One completed LLM call: the model's text plus token accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Provider seam for the pipeline's three LLM stages.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single-turn prompt to `model` and return its completion.
    async fn complete(&self, prompt: &str, model: &str) -> Result<Completion, ServiceError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

/// OpenRouter chat completions client.
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::llm(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(&self, prompt: &str, model: &str) -> Result<Completion, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %model, prompt_chars = prompt.len(), "sending completion request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::llm_with_status(
                format!("provider returned {}: {}", status, detail),
                status.as_u16(),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::llm(format!("malformed provider response: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::llm("provider response carried no completion"))?;

        // Fall back to a character-based estimate when the provider omits
        // usage counts.
        let usage = match parsed.usage {
            Some(u) => TokenUsage::new(
                u.prompt_tokens.unwrap_or_default(),
                u.completion_tokens.unwrap_or_default(),
            ),
            None => TokenUsage::estimated(prompt, &text),
        };

        Ok(Completion { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_response_parses_standard_payload() {
        let raw = r#"{
            "choices": [{"message": {"content": "SELECT 1"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("SELECT 1")
        );
        assert_eq!(parsed.usage.as_ref().unwrap().prompt_tokens, Some(12));
    }

    #[test]
    fn test_chat_response_tolerates_missing_usage() {
        let raw = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn test_chat_request_serialization() {
        let body = ChatRequest {
            model: "openai/gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "openai/gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
