//! Portable conversation records - full-fidelity export and import

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::info;

use crate::error::{MemoryError, Result};
use crate::store::schema::PortableConversation;
use crate::store::{ConversationState, ConversationStore};

impl ConversationStore {
    /// Snapshot one conversation as a portable record: all live messages,
    /// the rolling summary, metadata, and timestamps.
    pub async fn export(&self, conversation_id: &str) -> Result<PortableConversation> {
        let handle = self.get_handle(conversation_id)?;
        let state = handle.read().await;
        if state.deleted {
            return Err(MemoryError::NotFound(conversation_id.to_string()));
        }

        Ok(PortableConversation {
            id: state.id.clone(),
            created_at: state.created_at,
            updated_at: state.updated_at,
            metadata: state.metadata.clone(),
            messages: state.messages.clone(),
            summary: state.summary.clone(),
        })
    }

    /// Install a portable record under its embedded id.
    ///
    /// The record is validated before the store is touched; a rejected
    /// import leaves no trace. An occupied id fails with `AlreadyExists`
    /// rather than merging.
    pub async fn import(&self, record: PortableConversation) -> Result<String> {
        validate_record(&record)?;

        let id = record.id.clone();
        let message_count = record.messages.len();
        self.insert_fresh(ConversationState {
            id: id.clone(),
            messages: record.messages,
            summary: record.summary,
            created_at: record.created_at,
            // Importing counts as activity; the retention clock restarts.
            updated_at: Utc::now(),
            metadata: record.metadata,
            deleted: false,
        })?;

        info!("Imported conversation {} ({} live messages)", id, message_count);
        Ok(id)
    }

    /// `export`, encoded as pretty JSON.
    pub async fn export_json(&self, conversation_id: &str) -> Result<String> {
        let record = self.export(conversation_id).await?;
        serde_json::to_string_pretty(&record)
            .map_err(|e| MemoryError::SerializationInvalid(e.to_string()))
    }

    /// `import` from a JSON document produced by `export_json`.
    pub async fn import_json(&self, raw: &str) -> Result<String> {
        let record: PortableConversation = serde_json::from_str(raw)
            .map_err(|e| MemoryError::SerializationInvalid(e.to_string()))?;
        self.import(record).await
    }
}

/// Structural checks a record must pass before it may enter the store.
fn validate_record(record: &PortableConversation) -> Result<()> {
    if record.id.trim().is_empty() {
        return Err(MemoryError::SerializationInvalid(
            "conversation id is empty".to_string(),
        ));
    }

    let mut seen: HashSet<uuid::Uuid> = HashSet::with_capacity(record.messages.len());
    let mut previous: Option<DateTime<Utc>> = None;
    for message in &record.messages {
        if !seen.insert(message.id) {
            return Err(MemoryError::SerializationInvalid(format!(
                "duplicate message id: {}",
                message.id
            )));
        }
        if let Some(prev) = previous {
            if message.created_at < prev {
                return Err(MemoryError::SerializationInvalid(
                    "message timestamps run backwards".to_string(),
                ));
            }
        }
        previous = Some(message.created_at);
    }

    if let Some(summary) = &record.summary {
        if summary.text.trim().is_empty() {
            return Err(MemoryError::SerializationInvalid(
                "summary text is empty".to_string(),
            ));
        }
        if summary.covered_message_count == 0 {
            return Err(MemoryError::SerializationInvalid(
                "summary covers zero messages".to_string(),
            ));
        }
        if summary.last_message_at < summary.first_message_at {
            return Err(MemoryError::SerializationInvalid(
                "summary span runs backwards".to_string(),
            ));
        }
    }

    Ok(())
}
