//! Persisted data-model entities: sessions, conversation messages, and
//! per-node cursors. These are plain records; the storage behaviour that
//! makes them durable (append-only parts files, `cursor.json`,
//! `state.json`) lives in `runtime-store`, which depends on this crate for
//! the shapes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The session's key/value state: read by edge conditions and system
/// prompts, written only at node-ACCEPT or on the cancellation-flush path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SharedMemory(pub HashMap<String, Value>);

impl SharedMemory {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = (String, Value)>) {
        self.0.extend(other);
    }

    /// Restricts a copy of this memory to the given key set, used for
    /// primary-session bridging when a secondary stream fires
    /// (`AgentRuntime` filters by the target node's `inputKeys`).
    pub fn filtered(&self, keys: &[String]) -> SharedMemory {
        let mut out = HashMap::new();
        for key in keys {
            if let Some(v) = self.0.get(key) {
                out.insert(key.clone(), v.clone());
            }
        }
        SharedMemory(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

/// `{sessionRoot}/state.json` schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub graph_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub status: SessionStatus,
    pub memory: SharedMemory,
    #[serde(default)]
    pub metrics: Option<Value>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, graph_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            session_id: session_id.into(),
            graph_id: graph_id.into(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Active,
            memory: SharedMemory::default(),
            metrics: None,
        }
    }
}

/// One immutable entry in a (session, node) conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    ToolCall,
    ToolResult,
    SystemMarker,
}

/// A single `parts/NNNNNNNNNN.json` entry. `ordinal` is assigned by
/// `ConversationStore::Append` and is never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub ordinal: u64,
    pub kind: MessageKind,
    pub content: Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ConversationMessage {
    pub fn new(kind: MessageKind, content: Value) -> Self {
        Self {
            ordinal: 0,
            kind,
            content,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// One pending or completed tool call recorded on an assistant message,
/// used to detect orphans (a `tool_call` with no matching `tool_result`)
/// on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub name: String,
    pub args: Value,
}

/// Per-node-visit state persisted to `cursor.json` after every step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeCursor {
    pub iteration: u32,
    /// Write-in-progress outputs, durable before judge acceptance.
    pub outputs: HashMap<String, Value>,
    pub user_interaction_count: u32,
    pub recent_responses: Vec<String>,
    pub recent_tool_fingerprints: Vec<String>,
    pub last_message_ordinal: u64,
    /// Consecutive RETRY verdicts with an unchanged evidence fingerprint;
    /// feeds the Health Judge's `stepsSinceLastAccept` and the ESCALATE
    /// stall threshold.
    pub stall_count: u32,
    pub visit_count: u32,
}

/// Structured escalation record emitted by a Health Judge node and
/// consumed by a Queen node (see `runtime-monitoring`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationTicket {
    pub ticket_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub worker_agent_id: String,
    pub worker_session_id: String,
    pub worker_node_id: String,
    pub worker_graph_id: String,
    pub severity: Severity,
    pub cause: String,
    pub judge_reasoning: String,
    pub suggested_action: String,
    pub recent_verdicts: Vec<String>,
    pub total_steps_checked: u32,
    pub steps_since_last_accept: u32,
    #[serde(default)]
    pub stall_minutes: Option<f64>,
    pub evidence_snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl EscalationTicket {
    /// `evidenceSnippet` is capped at 500 chars per the external interface
    /// contract; truncates on a char boundary rather than a byte index.
    pub fn truncate_evidence(snippet: &str) -> String {
        snippet.chars().take(500).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_memory_filter_drops_missing_and_unlisted_keys() {
        let mut mem = SharedMemory::default();
        mem.insert("a", Value::from(1));
        mem.insert("b", Value::from(2));
        let filtered = mem.filtered(&["a".to_string(), "missing".to_string()]);
        assert_eq!(filtered.get("a"), Some(&Value::from(1)));
        assert_eq!(filtered.get("b"), None);
        assert_eq!(filtered.get("missing"), None);
    }

    #[test]
    fn evidence_snippet_is_capped_at_500_chars() {
        let long = "x".repeat(600);
        let truncated = EscalationTicket::truncate_evidence(&long);
        assert_eq!(truncated.chars().count(), 500);
    }
}
