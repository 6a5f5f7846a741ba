//! The narrow LLM client interface the step loop calls through.
//! `runtime-llm` provides the concrete implementations; this crate only
//! knows the trait and the message/result shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Set on a tool-role message to correlate it with the originating
    /// call.
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool the model may call, in the shape the provider's function-calling
/// API expects: name, free-text description, and a JSON-schema for
/// arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One tool call requested by the model in a single turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    pub args: Value,
}

/// The result of one `LlmClient::generate` call: the streamed text
/// deltas (already concatenated into `final_text` for convenience),
/// any tool calls the model requested, and whether this was the final
/// chunk of the turn (always true for non-streaming backends).
#[derive(Debug, Clone, Default)]
pub struct GenerateResult {
    pub deltas: Vec<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub final_text: Option<String>,
}

impl GenerateResult {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// True if this turn produced user-visible assistant text (non-empty
    /// `final_text`), consulted by the implicit judge's rule 2.
    pub fn has_visible_text(&self) -> bool {
        self.final_text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    /// A transient failure (rate limit, timeout, connection reset); the
    /// step loop retries this with bounded backoff (default 3 attempts)
    /// before surfacing it further.
    #[error("transient LLM failure: {0}")]
    Transient(String),

    /// A non-retryable failure (bad request, auth failure, context length
    /// exceeded).
    #[error("LLM call failed: {0}")]
    Fatal(String),
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Transient(_))
    }
}

/// `llm.Generate(messages, tools) -> (deltas, toolCalls, final)`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, messages: &[Message], tools: &[ToolDef]) -> Result<GenerateResult, LlmError>;
}
