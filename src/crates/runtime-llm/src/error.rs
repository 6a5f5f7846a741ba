//! Provider-level error detail. `runtime_core::LlmError` only distinguishes
//! transient-vs-fatal for the step loop's retry policy; this richer enum is
//! what a provider implementation actually raises before being folded down
//! at the `LlmClient::generate` boundary.

use runtime_core::LlmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("provider returned an error: {0}")]
    Provider(String),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("api key not found: {0}")]
    ApiKeyNotFound(String),
}

impl ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Http(_) | ProviderError::RateLimited(_))
    }
}

impl From<ProviderError> for LlmError {
    fn from(err: ProviderError) -> Self {
        if err.is_retryable() {
            LlmError::Transient(err.to_string())
        } else {
            LlmError::Fatal(err.to_string())
        }
    }
}
