//! File-based store — one pretty-printed JSON file per conversation.
//!
//! Storage location: `~/.stepwise/conversations/<id>.json`
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-save never leaves a half-written record behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use stepwise_core::error::StoreError;
use stepwise_core::message::{Conversation, ConversationId};
use stepwise_core::store::{ConversationStore, ConversationSummary};
use tracing::{debug, warn};

const EXTENSION: &str = "json";

/// A directory of conversation records.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(path = %dir.display(), "File conversation store opened");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `id`. IDs that could escape the directory are
    /// rejected.
    fn record_path(&self, id: &ConversationId) -> Result<PathBuf, StoreError> {
        let valid = !id.0.is_empty()
            && id
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::Io(format!("invalid conversation id '{id}'")));
        }
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }

    async fn read_record(path: &Path, id: &str) -> Result<Conversation, StoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Io(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ConversationStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let path = self.record_path(&conversation.id)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StoreError::Io(format!("failed to create conversation directory: {e}"))
        })?;

        let json = serde_json::to_string_pretty(conversation).map_err(|e| {
            StoreError::Io(format!("failed to serialize conversation: {e}"))
        })?;

        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::Io(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Io(format!("failed to replace {}: {e}", path.display())))?;

        debug!(
            conversation = %conversation.id,
            messages = conversation.len(),
            "Conversation written"
        );
        Ok(())
    }

    async fn load(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError> {
        let path = self.record_path(id)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        Self::read_record(&path, &id.0).await.map(Some)
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(format!("failed to list conversations: {e}"))),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::Io(format!("failed to list conversations: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            match Self::read_record(&path, &id).await {
                Ok(conversation) => summaries.push(ConversationSummary::from(&conversation)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable conversation"),
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::message::Message;
    use stepwise_core::step::ExecutionStep;

    #[tokio::test]
    async fn save_and_reload_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());

        let mut conv = Conversation::new();
        conv.push(Message::user("What's the weather in Rome?"));
        let mut answer = Message::assistant("Sunny.").with_model("mock-model");
        answer.execution_steps = Some(vec![ExecutionStep::observation("18°C, clear")]);
        conv.push(answer);
        store.save(&conv).await.unwrap();

        let on_disk = tmp.path().join(format!("{}.json", conv.id));
        let content = std::fs::read_to_string(&on_disk).unwrap();
        assert!(content.contains("\"type\": \"observation\""));

        // A fresh store over the same directory sees the record.
        let reopened = FileStore::new(tmp.path());
        let loaded = reopened.load(&conv.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[1].model_id.as_deref(), Some("mock-model"));
        assert_eq!(
            loaded.messages[1].execution_steps.as_ref().unwrap()[0].content,
            "18°C, clear"
        );
        assert_eq!(loaded.title.as_deref(), Some("What's the weather in Rome?"));
    }

    #[tokio::test]
    async fn save_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("nested"));
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        store.save(&conv).await.unwrap();
        store.save(&conv).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", conv.id)]);
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        assert!(store.load(&ConversationId::new()).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("does-not-exist"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_escaping_ids_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let result = store.load(&ConversationId::from("../secrets")).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn corrupted_records() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());

        let mut conv = Conversation::new();
        conv.push(Message::user("valid"));
        store.save(&conv).await.unwrap();
        std::fs::write(tmp.path().join("broken.json"), "this is not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        // Listing skips the broken record.
        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, conv.id);

        // Loading it directly reports the corruption.
        let result = store.load(&ConversationId::from("broken")).await;
        assert!(matches!(result, Err(StoreError::Corrupted { .. })));
    }
}
