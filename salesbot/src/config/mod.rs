//! Startup configuration, read once from the environment and immutable
//! thereafter.
//!
//! A missing credential is fatal at startup, never a per-turn error.

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::llm::LlmProviderConfig;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 400;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub llm: LlmProviderConfig,
    /// Candidates below this confidence are sent to clarification.
    pub confidence_threshold: f64,
}

impl EngineConfig {
    /// Read configuration from the environment. `OPENAI_API_KEY` is
    /// required; everything else has defaults.
    pub fn from_env() -> Result<Self, EngineError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            EngineError::Config(
                "OPENAI_API_KEY is not set; the language capability needs a credential".to_string(),
            )
        })?;
        if api_key.trim().is_empty() {
            return Err(EngineError::Config("OPENAI_API_KEY is empty".to_string()));
        }

        let llm = LlmProviderConfig {
            model: env_or("SALESBOT_MODEL", DEFAULT_MODEL.to_string()),
            api_key: Some(api_key),
            base_url: std::env::var("SALESBOT_BASE_URL").ok(),
            max_tokens: Some(env_parsed("SALESBOT_MAX_TOKENS", DEFAULT_MAX_TOKENS)),
            temperature: Some(env_parsed("SALESBOT_TEMPERATURE", DEFAULT_TEMPERATURE)),
            timeout_seconds: Some(env_parsed(
                "SALESBOT_TIMEOUT_SECONDS",
                DEFAULT_TIMEOUT_SECONDS,
            )),
        };

        let confidence_threshold = env_parsed(
            "SALESBOT_CONFIDENCE_THRESHOLD",
            DEFAULT_CONFIDENCE_THRESHOLD,
        );
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(EngineError::Config(format!(
                "SALESBOT_CONFIDENCE_THRESHOLD must be in [0,1], got {}",
                confidence_threshold
            )));
        }

        Ok(Self {
            llm,
            confidence_threshold,
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
