//! Deterministic backend for tests and demos: no network calls, scripted
//! or rule-based responses so graph executor behaviour is reproducible.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use runtime_core::{GenerateResult, LlmClient, LlmError, Message, Role, ToolCallRequest, ToolDef};

/// One scripted turn: either plain text, or a set of tool calls the
/// executor should dispatch.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    Text(String),
    ToolCalls(Vec<ToolCallRequest>),
}

/// Replays a fixed script of turns regardless of what's in `messages`,
/// looping the last entry if the script runs out. Useful for
/// deterministic end-to-end tests of the step loop and edge evaluation.
pub struct MockLlmClient {
    script: Vec<ScriptedTurn>,
    cursor: AtomicUsize,
}

impl MockLlmClient {
    pub fn new(script: Vec<ScriptedTurn>) -> Self {
        Self { script, cursor: AtomicUsize::new(0) }
    }

    pub fn single_text(text: impl Into<String>) -> Self {
        Self::new(vec![ScriptedTurn::Text(text.into())])
    }

    fn next_turn(&self) -> ScriptedTurn {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        let idx = idx.min(self.script.len().saturating_sub(1));
        self.script[idx].clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, _messages: &[Message], _tools: &[ToolDef]) -> Result<GenerateResult, LlmError> {
        match self.next_turn() {
            ScriptedTurn::Text(text) => Ok(GenerateResult {
                deltas: vec![text.clone()],
                tool_calls: Vec::new(),
                final_text: Some(text),
            }),
            ScriptedTurn::ToolCalls(calls) => Ok(GenerateResult {
                deltas: Vec::new(),
                tool_calls: calls,
                final_text: None,
            }),
        }
    }
}

/// Rule-based stand-in used by the monitoring pattern's Health Judge
/// reference graph: echoes the last user message verbatim, useful where a
/// test only cares that *a* response reaches the judge, not its content.
pub struct EchoLlmClient {
    last_seen: Mutex<Option<String>>,
}

impl Default for EchoLlmClient {
    fn default() -> Self {
        Self { last_seen: Mutex::new(None) }
    }
}

#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn generate(&self, messages: &[Message], _tools: &[ToolDef]) -> Result<GenerateResult, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        *self.last_seen.lock().unwrap() = Some(last_user.clone());
        Ok(GenerateResult {
            deltas: vec![last_user.clone()],
            tool_calls: Vec::new(),
            final_text: Some(last_user),
        })
    }
}

/// Scripted like [`MockLlmClient`] but also records the `messages` slice
/// seen on every call, so a test can assert on what the step loop fed back
/// as history (tool calls, tool results, replayed resume context).
pub struct RecordingLlmClient {
    script: Mutex<Vec<ScriptedTurn>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl RecordingLlmClient {
    pub fn new(script: Vec<ScriptedTurn>) -> Self {
        Self { script: Mutex::new(script), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for RecordingLlmClient {
    async fn generate(&self, messages: &[Message], _tools: &[ToolDef]) -> Result<GenerateResult, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let mut script = self.script.lock().unwrap();
        let turn = if script.len() > 1 { script.remove(0) } else { script[0].clone() };
        match turn {
            ScriptedTurn::Text(text) => Ok(GenerateResult {
                deltas: vec![text.clone()],
                tool_calls: Vec::new(),
                final_text: Some(text),
            }),
            ScriptedTurn::ToolCalls(calls) => Ok(GenerateResult {
                deltas: Vec::new(),
                tool_calls: calls,
                final_text: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn script_advances_and_clamps_at_the_last_entry() {
        let client = MockLlmClient::new(vec![
            ScriptedTurn::Text("first".into()),
            ScriptedTurn::Text("second".into()),
        ]);
        let r1 = client.generate(&[], &[]).await.unwrap();
        let r2 = client.generate(&[], &[]).await.unwrap();
        let r3 = client.generate(&[], &[]).await.unwrap();
        assert_eq!(r1.final_text.as_deref(), Some("first"));
        assert_eq!(r2.final_text.as_deref(), Some("second"));
        assert_eq!(r3.final_text.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn tool_call_turn_has_no_visible_text() {
        let client = MockLlmClient::new(vec![ScriptedTurn::ToolCalls(vec![ToolCallRequest {
            call_id: "c1".into(),
            name: "set_output".into(),
            args: json!({"key": "x", "value": 1}),
        }])]);
        let result = client.generate(&[], &[]).await.unwrap();
        assert!(result.has_tool_calls());
        assert!(!result.has_visible_text());
    }

    #[tokio::test]
    async fn echo_client_returns_the_last_user_message() {
        let client = EchoLlmClient::default();
        let messages = vec![Message::system("sys"), Message::user("hello there")];
        let result = client.generate(&messages, &[]).await.unwrap();
        assert_eq!(result.final_text.as_deref(), Some("hello there"));
    }
}
