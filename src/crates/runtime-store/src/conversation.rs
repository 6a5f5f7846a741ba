//! `FileConversationStore`: one append-only log per thread, addressed by
//! `thread_id` directly rather than nested under a particular session's
//! directory — `thread_id` already disambiguates session scope for both
//! `continuous` (`thread_id == sessionId`) and `isolated`
//! (`thread_id == "{sessionId}-{nodeId}"`) modes, and `conversation_store_for`
//! has no `session_id` parameter to nest a path under. Grounded on
//! `langgraph_checkpoint`'s `thread_id`-keyed addressing of checkpoint
//! storage (`CheckpointConfig::thread_id` is the primary key there too).

use std::path::PathBuf;

use async_trait::async_trait;
use runtime_core::{ConversationMessage, ConversationStore, NodeCursor, StoreError};
use tokio::fs;

use crate::fsutil::{read_json_opt, write_json_durable};

pub struct FileConversationStore {
    dir: PathBuf,
}

impl FileConversationStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn parts_dir(&self) -> PathBuf {
        self.dir.join("parts")
    }

    fn cursor_path(&self) -> PathBuf {
        self.dir.join("cursor.json")
    }

    async fn part_names(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.parts_dir();
        if fs::metadata(&dir).await.is_err() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".json") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn append(&self, mut msg: ConversationMessage) -> Result<u64, StoreError> {
        let ordinal = self.last_ordinal().await? + 1;
        msg.ordinal = ordinal;
        let path = self.parts_dir().join(format!("{:010}.json", ordinal));
        write_json_durable(&path, &msg).await?;
        Ok(ordinal)
    }

    async fn read_from(&self, ordinal: u64) -> Result<Vec<ConversationMessage>, StoreError> {
        let mut out = Vec::new();
        for name in self.part_names().await? {
            let bytes = fs::read(self.parts_dir().join(&name)).await?;
            let msg: ConversationMessage = serde_json::from_slice(&bytes)?;
            if msg.ordinal >= ordinal {
                out.push(msg);
            }
        }
        Ok(out)
    }

    async fn last_ordinal(&self) -> Result<u64, StoreError> {
        let mut max = 0u64;
        for name in self.part_names().await? {
            if let Some(stem) = name.strip_suffix(".json") {
                if let Ok(n) = stem.parse::<u64>() {
                    max = max.max(n);
                }
            }
        }
        Ok(max)
    }

    async fn write_cursor(&self, cursor: &NodeCursor) -> Result<(), StoreError> {
        write_json_durable(&self.cursor_path(), cursor).await
    }

    async fn read_cursor(&self) -> Result<Option<NodeCursor>, StoreError> {
        read_json_opt(&self.cursor_path()).await
    }
}
