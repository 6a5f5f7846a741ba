//! Configuration for the HTTP-backed provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Configuration for an OpenAI-compatible chat-completions endpoint
/// (OpenAI itself, or any provider exposing the same request/response
/// shape — LM Studio, OpenRouter, vLLM's OpenAI-compat mode, etc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl RemoteLlmConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
        }
    }

    pub fn from_env(env_var: &str, base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = std::env::var(env_var)
            .map_err(|_| ProviderError::ApiKeyNotFound(format!("environment variable {env_var} not set")))?;
        Ok(Self::new(api_key, base_url, model))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}
