//! `FileCheckpointStore`: named snapshots of `state.json` under
//! `{sessionRoot}/checkpoints/{name}/`. Restoring a checkpoint does not
//! rewind conversation logs (they stay append-only, orphan-tool-call
//! repair already handles resume consistency) — only `SharedMemory` and
//! session status are rolled back, which is what edge conditions and the
//! step loop actually read.

use std::path::PathBuf;

use async_trait::async_trait;
use runtime_core::{CheckpointStore, SessionState, StoreError};
use tokio::fs;

use crate::fsutil::{read_json_opt, write_json_durable};

pub struct FileCheckpointStore {
    base: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    fn checkpoint_path(&self, session_id: &str, name: &str) -> PathBuf {
        self.base.join(session_id).join("checkpoints").join(name).join("state.json")
    }

    fn state_path(&self, session_id: &str) -> PathBuf {
        self.base.join(session_id).join("state.json")
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn checkpoint(&self, session_id: &str, name: &str) -> Result<(), StoreError> {
        let state: SessionState = read_json_opt(&self.state_path(session_id))
            .await?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        write_json_durable(&self.checkpoint_path(session_id, name), &state).await
    }

    async fn restore_checkpoint(&self, session_id: &str, name: &str) -> Result<SessionState, StoreError> {
        let state: SessionState = read_json_opt(&self.checkpoint_path(session_id, name))
            .await?
            .ok_or_else(|| StoreError::CorruptState(session_id.to_string(), format!("no checkpoint named '{name}'")))?;
        write_json_durable(&self.state_path(session_id), &state).await?;
        Ok(state)
    }

    async fn list_checkpoints(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.base.join(session_id).join("checkpoints");
        if fs::metadata(&dir).await.is_err() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&dir).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    out.push(name.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsutil::write_json_durable;

    #[tokio::test]
    async fn checkpoint_then_restore_round_trips_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = SessionState::new("sess-1", "graph-a");
        write_json_durable(&dir.path().join("sess-1").join("state.json"), &state).await.unwrap();

        let store = FileCheckpointStore::new(dir.path().to_path_buf());
        store.checkpoint("sess-1", "before-tool-call").await.unwrap();

        state.memory.insert("mutated", serde_json::json!(true));
        write_json_durable(&dir.path().join("sess-1").join("state.json"), &state).await.unwrap();

        let restored = store.restore_checkpoint("sess-1", "before-tool-call").await.unwrap();
        assert!(restored.memory.get("mutated").is_none());
    }

    #[tokio::test]
    async fn list_checkpoints_is_empty_for_uncheckpointed_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().to_path_buf());
        assert!(store.list_checkpoints("never-checkpointed").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restoring_unknown_checkpoint_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().to_path_buf());
        assert!(store.restore_checkpoint("sess-1", "nope").await.is_err());
    }
}
