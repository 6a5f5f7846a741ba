//! The narrow tool registry interface the step loop calls through.
//! `runtime-tools` provides the concrete implementations, including the
//! one tool the spec makes real: `set_output`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm_client::ToolDef;

/// Context handed to a tool call: enough for a handler like `set_output`
/// to reach the current node visit's accumulator without the registry
/// knowing anything about the executor's internals.
pub struct ToolContext<'a> {
    pub session_id: &'a str,
    pub graph_id: &'a str,
    pub node_id: &'a str,
    /// Callback the `set_output` handler invokes to durably record an
    /// output key. Any other tool ignores this.
    pub set_output: &'a (dyn Fn(String, Value) + Send + Sync),
}

#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub ok: bool,
    pub content: Value,
}

impl ToolCallResult {
    pub fn ok(content: Value) -> Self {
        Self { ok: true, content }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: serde_json::json!({ "error": message.into() }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// A tool failed in a way the registry itself could not route back
    /// to the model as a `tool_result` (e.g. argument deserialization
    /// exploded before the handler even ran). Ordinary handler failures
    /// should return `ToolCallResult::error` instead, since the LLM is
    /// meant to see and react to them; the framework never retries a
    /// tool call on its own.
    #[error("tool '{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

/// `tools.List()`, `tools.Call(name, args, ctx) -> result`.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn list(&self, names: &[String]) -> Vec<ToolDef>;

    async fn call(&self, name: &str, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult, ToolError>;
}
