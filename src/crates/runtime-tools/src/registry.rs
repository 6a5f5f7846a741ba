//! `DefaultToolRegistry`: a fixed, immutable-after-construction map of
//! tool name to handler. Grounded on the teacher's `RuntimeError` error-code
//! idiom (`runtime/error.rs`) for argument validation failures, and on the
//! spec's own framing of the registry as "immutable after runtime start" —
//! there is deliberately no `register` method taking `&self`; a registry is
//! built once via [`ToolRegistryBuilder`] and handed to the executor as a
//! `Arc<dyn ToolRegistry>`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use runtime_core::{ToolCallResult, ToolContext, ToolDef, ToolError, ToolRegistry};
use serde_json::Value;

/// A single tool implementation. Distinct from `ToolRegistry` itself so a
/// registry can hold many of these behind one trait object map.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn def(&self) -> ToolDef;

    /// Per-tool timeout; `None` means no timeout is enforced beyond
    /// whatever the caller's own cancellation token provides. Grounded on
    /// the spec's "per-tool timeouts come from the tool registry".
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn call(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult, ToolError>;
}

fn validate_required_fields(def: &ToolDef, args: &Value) -> Result<(), ToolError> {
    let required = def
        .parameters
        .get("required")
        .and_then(Value::as_array)
        .map(|v| v.as_slice())
        .unwrap_or(&[]);

    for field in required {
        let Some(name) = field.as_str() else { continue };
        if args.get(name).is_none() {
            return Err(ToolError::Failed {
                name: def.name.clone(),
                reason: format!("missing required argument '{name}'"),
            });
        }
    }
    Ok(())
}

pub struct DefaultToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

#[async_trait]
impl ToolRegistry for DefaultToolRegistry {
    fn list(&self, names: &[String]) -> Vec<ToolDef> {
        names.iter().filter_map(|n| self.handlers.get(n)).map(|h| h.def()).collect()
    }

    async fn call(&self, name: &str, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult, ToolError> {
        let handler = self.handlers.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        validate_required_fields(&handler.def(), &args)?;

        match handler.timeout() {
            Some(duration) => tokio::time::timeout(duration, handler.call(args, ctx))
                .await
                .map_err(|_| ToolError::Failed {
                    name: name.to_string(),
                    reason: format!("timed out after {}ms", duration.as_millis()),
                })?,
            None => handler.call(args, ctx).await,
        }
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.handlers.insert(handler.def().name.clone(), Arc::new(handler));
        self
    }

    /// Pre-wired with the one built-in tool the spec requires.
    pub fn with_defaults() -> Self {
        Self::new().with_tool(crate::builtin::SetOutputTool)
    }

    pub fn build(self) -> DefaultToolRegistry {
        DefaultToolRegistry { handlers: self.handlers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_ctx_sink(_: String, _: Value) {}

    #[tokio::test]
    async fn list_returns_defs_only_for_requested_names_that_exist() {
        let registry = ToolRegistryBuilder::with_defaults().build();
        let defs = registry.list(&["set_output".to_string(), "nonexistent".to_string()]);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "set_output");
    }

    #[tokio::test]
    async fn calling_an_unknown_tool_is_a_tool_error() {
        let registry = ToolRegistryBuilder::with_defaults().build();
        let ctx = ToolContext {
            session_id: "s",
            graph_id: "g",
            node_id: "n",
            set_output: &noop_ctx_sink,
        };
        let err = registry.call("does_not_exist", Value::Null, &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn missing_required_argument_is_rejected_before_the_handler_runs() {
        let registry = ToolRegistryBuilder::with_defaults().build();
        let ctx = ToolContext {
            session_id: "s",
            graph_id: "g",
            node_id: "n",
            set_output: &noop_ctx_sink,
        };
        let err = registry
            .call("set_output", serde_json::json!({"key": "x"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
    }

    #[tokio::test]
    async fn valid_call_round_trips_through_the_registry() {
        let registry = ToolRegistryBuilder::with_defaults().build();
        let captured = std::sync::Mutex::new(None);
        let sink = |k: String, v: Value| *captured.lock().unwrap() = Some((k, v));
        let ctx = ToolContext {
            session_id: "s",
            graph_id: "g",
            node_id: "n",
            set_output: &sink,
        };
        let result = registry
            .call("set_output", serde_json::json!({"key": "a", "value": 1}), &ctx)
            .await
            .unwrap();
        assert!(result.ok);
    }
}
