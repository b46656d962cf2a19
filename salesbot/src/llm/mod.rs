//! LLM provider abstraction.
//!
//! The engine talks to the external language capability through the
//! [`LlmProvider`] trait so the extraction logic stays independent of any
//! concrete service. `OpenAiLlmProvider` speaks the OpenAI-compatible
//! `/chat/completions` wire format (which also covers OpenRouter-style
//! gateways via `base_url`); `StubLlmProvider` returns scripted replies
//! for deterministic tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// Configuration for an LLM provider, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout_seconds: Option<u64>,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: Some(400),
            temperature: Some(0.1),
            timeout_seconds: Some(30),
        }
    }
}

/// Information about a provider, for logging and diagnostics.
#[derive(Debug, Clone)]
pub struct LlmProviderInfo {
    pub name: String,
    pub model: String,
}

/// Abstract interface for the external language capability.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion: system prompt plus a single user message, and
    /// return the assistant text verbatim.
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, EngineError>;

    fn info(&self) -> LlmProviderInfo;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-compatible provider (OpenAI or OpenRouter-style endpoints).
pub struct OpenAiLlmProvider {
    config: LlmProviderConfig,
    client: reqwest::Client,
}

impl OpenAiLlmProvider {
    pub fn new(config: LlmProviderConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.timeout_seconds.unwrap_or(30),
            ))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlmProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, EngineError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| EngineError::Config("API key required for OpenAI provider".into()))?;

        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1");
        let url = format!("{}/chat/completions", base_url);

        let request_body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| EngineError::Extraction(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| EngineError::Extraction(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            let preview: String = raw_body.chars().take(500).collect();
            return Err(EngineError::Extraction(format!(
                "LLM API returned HTTP {}: {}",
                status.as_u16(),
                preview
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&raw_body).map_err(|e| {
            EngineError::Extraction(format!("malformed LLM API response: {}", e))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EngineError::Extraction("LLM API response had no choices".into()))?;

        tracing::debug!(
            model = %self.config.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "LLM completion finished"
        );
        Ok(content)
    }

    fn info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: "OpenAI".to_string(),
            model: self.config.model.clone(),
        }
    }
}

/// Deterministic provider for tests: pops scripted replies in order and
/// repeats the last one once the script is exhausted.
pub struct StubLlmProvider {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
}

impl StubLlmProvider {
    pub fn new(replies: Vec<String>) -> Self {
        let fallback = replies
            .last()
            .cloned()
            .unwrap_or_else(|| "{}".to_string());
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
        }
    }

    pub fn single(reply: impl Into<String>) -> Self {
        Self::new(vec![reply.into()])
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<String, EngineError> {
        let mut replies = self
            .replies
            .lock()
            .map_err(|_| EngineError::Extraction("stub reply queue poisoned".into()))?;
        Ok(replies.pop_front().unwrap_or_else(|| self.fallback.clone()))
    }

    fn info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: "Stub".to_string(),
            model: "stub".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_provider_replays_script_then_repeats_last() {
        let provider = StubLlmProvider::new(vec!["one".to_string(), "two".to_string()]);
        assert_eq!(provider.complete("s", "u").await.unwrap(), "one");
        assert_eq!(provider.complete("s", "u").await.unwrap(), "two");
        assert_eq!(provider.complete("s", "u").await.unwrap(), "two");
    }

    #[test]
    fn openai_provider_requires_no_key_at_construction() {
        let provider = OpenAiLlmProvider::new(LlmProviderConfig::default());
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().info().name, "OpenAI");
    }
}
