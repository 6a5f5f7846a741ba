//! The one tool the runtime makes real: `set_output` writes to the
//! current node visit's accumulator through the executor-provided
//! context rather than through any side channel, so every other tool
//! call looks identical from the registry's point of view.

use async_trait::async_trait;
use runtime_core::{ToolCallResult, ToolContext, ToolDef, ToolError};
use serde_json::Value;

use crate::registry::ToolHandler;

pub struct SetOutputTool;

#[async_trait]
impl ToolHandler for SetOutputTool {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: "set_output".to_string(),
            description: "Record a named output for this node. Call this once per required \
                output key before finishing the turn."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string" },
                    "value": {},
                },
                "required": ["key", "value"],
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult, ToolError> {
        let key = args
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::Failed {
                name: "set_output".to_string(),
                reason: "missing required field 'key'".to_string(),
            })?
            .to_string();
        let value = args.get("value").cloned().unwrap_or(Value::Null);

        (ctx.set_output)(key.clone(), value.clone());

        Ok(ToolCallResult::ok(serde_json::json!({ "key": key, "accepted": true })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn set_output_invokes_the_context_callback_with_key_and_value() {
        let captured: Mutex<Option<(String, Value)>> = Mutex::new(None);
        let sink = |k: String, v: Value| {
            *captured.lock().unwrap() = Some((k, v));
        };
        let ctx = ToolContext {
            session_id: "s1",
            graph_id: "g1",
            node_id: "n1",
            set_output: &sink,
        };

        let result = SetOutputTool
            .call(serde_json::json!({"key": "answer", "value": 42}), &ctx)
            .await
            .unwrap();

        assert!(result.ok);
        assert_eq!(captured.into_inner().unwrap(), Some(("answer".to_string(), serde_json::json!(42))));
    }

    #[tokio::test]
    async fn set_output_without_a_key_fails_without_touching_the_context() {
        let sink = |_: String, _: Value| panic!("should not be called");
        let ctx = ToolContext {
            session_id: "s1",
            graph_id: "g1",
            node_id: "n1",
            set_output: &sink,
        };

        let err = SetOutputTool.call(serde_json::json!({"value": 1}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
    }
}
