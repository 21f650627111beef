//! Injected capabilities - summarization and optional persistence

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::store::schema::{Message, PortableConversation};
use crate::utils::TopicExtractor;

/// Summarization capability consumed by the store during compaction.
///
/// Implementations usually call out to a language model. Failures are
/// tolerated by the engine: the affected conversation keeps its prior
/// summary and falls back to hard trimming until the summarizer recovers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a cumulative summary of `messages`, folding in `prior` when a
    /// rolling summary already exists.
    async fn summarize(&self, prior: Option<&str>, messages: &[Message]) -> anyhow::Result<String>;

    /// Topic tokens describing `messages`, best first, at most `limit`.
    ///
    /// The default keyword strategy ranks significant words by frequency;
    /// override to plug in a smarter extraction pipeline.
    fn extract_topics(&self, messages: &[Message], limit: usize) -> Vec<String> {
        TopicExtractor::with_max_topics(limit).extract_from_messages(messages)
    }
}

/// Snapshot persistence driven by the host at startup and shutdown.
///
/// The engine itself never persists; hosts wire an implementation to
/// `ConversationStore::load_all_from` / `save_all_to` when they want state
/// to survive a restart.
#[async_trait]
pub trait ConversationPersistence: Send + Sync {
    async fn load_all(&self) -> anyhow::Result<Vec<PortableConversation>>;
    async fn save_all(&self, records: &[PortableConversation]) -> anyhow::Result<()>;
}

/// Single-file JSON adapter for the persistence port.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl ConversationPersistence for JsonFilePersistence {
    async fn load_all(&self) -> anyhow::Result<Vec<PortableConversation>> {
        if !self.path.exists() {
            debug!("No snapshot at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let records: Vec<PortableConversation> = serde_json::from_str(&raw)?;
        info!("Read {} conversations from {}", records.len(), self.path.display());
        Ok(records)
    }

    async fn save_all(&self, records: &[PortableConversation]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, raw)?;
        info!("Wrote {} conversations to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::Role;
    use chrono::Utc;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn sample_record(id: &str) -> PortableConversation {
        let now = Utc::now();
        PortableConversation {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
            messages: vec![Message {
                id: Uuid::new_v4(),
                role: Role::User,
                content: "ship it".to_string(),
                created_at: now,
                token_estimate: Some(2),
                metadata: HashMap::new(),
            }],
            summary: None,
        }
    }

    #[tokio::test]
    async fn test_missing_snapshot_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let port = JsonFilePersistence::new(dir.path().join("absent.json"));

        let records = port.load_all().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let port = JsonFilePersistence::new(dir.path().join("nested/snapshot.json"));

        let records = vec![sample_record("a"), sample_record("b")];
        assert_ok!(port.save_all(&records).await);

        let loaded = assert_ok!(port.load_all().await);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[0].messages[0].content, "ship it");
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "{not json").unwrap();

        let port = JsonFilePersistence::new(path);
        assert_err!(port.load_all().await);
    }
}
