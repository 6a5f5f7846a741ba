//! Narrow persistence interfaces the executor and stream depend on.
//! `runtime-store` provides the concrete file-backed implementations
//! (`parts/NNNNNNNNNN.json`, `cursor.json`, `state.json`); this crate only
//! knows the trait contracts and the durable-output bookkeeping
//! ([`OutputAccumulator`]) that is small enough to live with the step
//! loop that drives it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::model::{ConversationMessage, MessageKind, NodeCursor, SessionState, SharedMemory};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("state lock timed out for session '{0}'")]
    StateLockTimeout(String),

    #[error("corrupt state.json for session '{0}': {1}")]
    CorruptState(String, String),

    #[error("corrupt cursor for ({session_id}, {node_id}): {reason}")]
    CorruptCursor {
        session_id: String,
        node_id: String,
        reason: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One logical append-only log per (sessionId, nodeId).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, msg: ConversationMessage) -> Result<u64, StoreError>;
    async fn read_from(&self, ordinal: u64) -> Result<Vec<ConversationMessage>, StoreError>;
    async fn last_ordinal(&self) -> Result<u64, StoreError>;
    async fn write_cursor(&self, cursor: &NodeCursor) -> Result<(), StoreError>;
    async fn read_cursor(&self) -> Result<Option<NodeCursor>, StoreError>;
}

/// Per-session `state.json` + sub-roots.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn read_state(&self, session_id: &str) -> Result<SessionState, StoreError>;
    async fn write_state(&self, state: &SessionState) -> Result<(), StoreError>;
    async fn list_sessions(&self) -> Result<Vec<String>, StoreError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;

    /// A `SessionStore` rooted at `graphs/{graphId}/` under the current
    /// session root, used for secondary-graph isolation.
    fn child_store_for(&self, graph_id: &str) -> Arc<dyn SessionStore>;

    /// The `ConversationStore` for `conversations/{nodeId}/` under this
    /// session root. `conversationMode = continuous` graphs pass the same
    /// `thread_id` across node transitions to share one log.
    fn conversation_store_for(&self, node_id: &str, thread_id: &str) -> Arc<dyn ConversationStore>;
}

/// Named snapshots of session state + conversation cursors.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn checkpoint(&self, session_id: &str, name: &str) -> Result<(), StoreError>;
    async fn restore_checkpoint(&self, session_id: &str, name: &str) -> Result<SessionState, StoreError>;
    async fn list_checkpoints(&self, session_id: &str) -> Result<Vec<String>, StoreError>;
}

/// Replays messages written after the last persisted cursor and repairs
/// any `tool_call` left without a matching `tool_result` (the process
/// crashed mid-dispatch) by appending a synthetic interrupted result so
/// the model can retry the call. Returns the replayed tail, cursor-exclusive,
/// including any synthetic repairs just appended.
pub async fn repair_orphans(
    store: &dyn ConversationStore,
) -> Result<Vec<ConversationMessage>, StoreError> {
    let cursor = store.read_cursor().await?.unwrap_or_default();
    let last = store.last_ordinal().await?;
    if cursor.last_message_ordinal >= last {
        return Ok(Vec::new());
    }

    let tail = store.read_from(cursor.last_message_ordinal + 1).await?;
    let mut pending: Vec<String> = Vec::new();
    for msg in &tail {
        match msg.kind {
            // The executor appends one `ToolCall` message per turn holding
            // the whole `Vec<ToolCallRequest>` (`executor.rs`'s
            // `serde_json::to_value(&turn.tool_calls)`), keyed by that
            // struct's `call_id` field — not the single-object `callId`
            // shape `ToolResult` messages use.
            MessageKind::ToolCall => {
                if let Some(calls) = msg.content.as_array() {
                    for call in calls {
                        if let Some(id) = call.get("call_id").and_then(|v| v.as_str()) {
                            pending.push(id.to_string());
                        }
                    }
                }
            }
            MessageKind::ToolResult => {
                if let Some(id) = msg.content.get("callId").and_then(|v| v.as_str()) {
                    pending.retain(|c| c != id);
                }
            }
            _ => {}
        }
    }

    for call_id in pending {
        store
            .append(ConversationMessage::new(
                MessageKind::ToolResult,
                serde_json::json!({ "callId": call_id, "error": "interrupted", "interrupted": true }),
            ))
            .await?;
    }

    store.read_from(cursor.last_message_ordinal + 1).await
}

/// Owns one node visit's write-in-progress outputs. `set` writes through
/// to `cursor.json` immediately (durability before judge acceptance, data
/// model invariant 3); `flush` is called on ACCEPT and on the
/// cancellation path before `state.json` is rewritten (invariant 7).
pub struct OutputAccumulator {
    store: Arc<dyn ConversationStore>,
    cursor: NodeCursor,
}

impl OutputAccumulator {
    /// Restores from a persisted cursor if present, otherwise starts
    /// fresh — matches the executor's "accumulator ← new
    /// OutputAccumulator(restored from cursor.json if present)" step.
    pub async fn open(store: Arc<dyn ConversationStore>) -> Result<Self, StoreError> {
        let cursor = store.read_cursor().await?.unwrap_or_default();
        Ok(Self { store, cursor })
    }

    pub fn cursor(&self) -> &NodeCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut NodeCursor {
        &mut self.cursor
    }

    pub async fn set(&mut self, key: impl Into<String>, value: Value) -> Result<(), StoreError> {
        self.cursor.outputs.insert(key.into(), value);
        self.store.write_cursor(&self.cursor).await
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.cursor.outputs.keys()
    }

    pub fn outputs(&self) -> &HashMap<String, Value> {
        &self.cursor.outputs
    }

    /// Writes the accumulator into `SharedMemory`. Called on ACCEPT and
    /// on any cancellation path before `state.json` is written.
    pub fn flush(&self, memory: &mut SharedMemory) {
        for (k, v) in &self.cursor.outputs {
            memory.insert(k.clone(), v.clone());
        }
    }

    pub async fn persist_cursor(&self) -> Result<(), StoreError> {
        self.store.write_cursor(&self.cursor).await
    }
}
