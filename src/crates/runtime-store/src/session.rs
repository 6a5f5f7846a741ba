//! `FileSessionStore`: `{base}/{sessionId}/state.json` plus the
//! `data/`/`conversations/`/`checkpoints/`/`graphs/{graphId}/` sub-roots
//! (§4.3). Conversation logs live in a flat `{base}/_conversations/{threadId}/`
//! root rather than nested under a session directory — see
//! `conversation.rs` for why `conversation_store_for` doesn't need one.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use runtime_core::{ConversationStore, SessionState, SessionStore, StoreError};
use tokio::fs;

use crate::conversation::FileConversationStore;
use crate::fsutil::{read_json_opt, write_json_durable};
use crate::lock::SessionLocks;

pub struct FileSessionStore {
    base: PathBuf,
    locks: Arc<SessionLocks>,
}

impl FileSessionStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base, locks: Arc::new(SessionLocks::new()) }
    }

    fn with_locks(base: PathBuf, locks: Arc<SessionLocks>) -> Self {
        Self { base, locks }
    }

    fn session_root(&self, session_id: &str) -> PathBuf {
        self.base.join(session_id)
    }

    fn state_path(&self, session_id: &str) -> PathBuf {
        self.session_root(session_id).join("state.json")
    }

    fn conversations_root(&self) -> PathBuf {
        self.base.join("_conversations")
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn read_state(&self, session_id: &str) -> Result<SessionState, StoreError> {
        // Copy-on-read: a single `fs::read` call snapshots the whole file
        // in one syscall, so a subscriber never observes a half-written
        // state produced by an in-flight rename from another task.
        read_json_opt(&self.state_path(session_id))
            .await?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))
    }

    async fn write_state(&self, state: &SessionState) -> Result<(), StoreError> {
        let _guard = self.locks.acquire(&state.session_id).await;
        write_json_durable(&self.state_path(&state.session_id), state).await
    }

    async fn list_sessions(&self) -> Result<Vec<String>, StoreError> {
        if fs::metadata(&self.base).await.is_err() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&self.base).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name == "_conversations" {
                    continue;
                }
                if entry.path().join("state.json").exists() {
                    out.push(name.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        let _guard = self.locks.acquire(session_id).await;
        match fs::remove_dir_all(self.session_root(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn child_store_for(&self, graph_id: &str) -> Arc<dyn SessionStore> {
        Arc::new(Self::with_locks(self.base.join("graphs").join(graph_id), self.locks.clone()))
    }

    fn conversation_store_for(&self, _node_id: &str, thread_id: &str) -> Arc<dyn ConversationStore> {
        Arc::new(FileConversationStore::new(self.conversations_root().join(thread_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_state_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf());
        let state = SessionState::new("sess-1", "graph-a");
        store.write_state(&state).await.unwrap();

        let reread = store.read_state("sess-1").await.unwrap();
        assert_eq!(reread.session_id, "sess-1");
        assert_eq!(reread.graph_id, "graph-a");
    }

    #[tokio::test]
    async fn read_state_of_unknown_session_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf());
        let err = store.read_state("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn list_sessions_only_reports_directories_with_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf());
        store.write_state(&SessionState::new("a", "g")).await.unwrap();
        store.write_state(&SessionState::new("b", "g")).await.unwrap();
        // conversation store writes shouldn't show up as a "session"
        let _ = store.conversation_store_for("node", "a");

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn delete_session_removes_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf());
        store.write_state(&SessionState::new("gone", "g")).await.unwrap();
        store.delete_session("gone").await.unwrap();
        assert!(store.read_state("gone").await.is_err());
    }

    #[tokio::test]
    async fn child_store_is_rooted_under_graphs_graph_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf());
        let child = store.child_store_for("monitoring");
        child.write_state(&SessionState::new("worker-1", "monitoring")).await.unwrap();
        assert!(dir.path().join("graphs").join("monitoring").join("worker-1").join("state.json").exists());
    }
}
