//! Keyword search across live conversation messages
//!
//! Flow for a query:
//! 1. Resolve scope: one conversation (missing scope is an error) or all
//! 2. Scan live messages for case-insensitive substring matches
//! 3. Rank hits newest-first; timestamp ties keep insertion order
//! 4. Attach the surrounding context window, clipped at the edges

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{MemoryError, Result};
use crate::store::schema::Message;
use crate::store::{ConversationState, ConversationStore};
use crate::utils::TextUtils;

/// Messages kept on each side of a match in its context window.
const CONTEXT_RADIUS: usize = 2;

/// Search parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// Restrict the scan to one conversation.
    pub conversation_id: Option<String>,
    /// Result cap; the engine default applies when unset. Zero matches
    /// nothing.
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation_id: None,
            limit: None,
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One ranked match with its surrounding turns.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub conversation_id: String,
    pub message: Message,
    /// The match plus up to `CONTEXT_RADIUS` messages either side of it.
    pub context_window: Vec<Message>,
}

impl ConversationStore {
    /// Case-insensitive substring search over live messages.
    ///
    /// Compacted-away messages and summary text are out of scope; an empty
    /// or whitespace query matches nothing, as does an explicit zero limit.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let needle = query.query.trim();
        if needle.is_empty() {
            debug!("Empty search query, returning no results");
            return Ok(Vec::new());
        }
        if query.limit == Some(0) {
            debug!("Zero result limit, returning no results");
            return Ok(Vec::new());
        }
        let limit = query
            .limit
            .unwrap_or(self.config.default_search_limit)
            .clamp(1, 100);

        let scoped = query.conversation_id.is_some();
        let handles: Vec<(String, Arc<RwLock<ConversationState>>)> = match &query.conversation_id {
            Some(id) => vec![(id.clone(), self.get_handle(id)?)],
            None => self
                .conversations
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        };

        let mut hits = Vec::new();
        for (conversation_id, handle) in handles {
            let state = handle.read().await;
            if state.deleted {
                if scoped {
                    return Err(MemoryError::NotFound(conversation_id));
                }
                continue;
            }

            for (index, message) in state.messages.iter().enumerate() {
                if !TextUtils::contains_ignore_case(&message.content, needle) {
                    continue;
                }
                let window_start = index.saturating_sub(CONTEXT_RADIUS);
                let window_end = (index + CONTEXT_RADIUS + 1).min(state.messages.len());
                hits.push(SearchHit {
                    conversation_id: conversation_id.clone(),
                    message: message.clone(),
                    context_window: state.messages[window_start..window_end].to_vec(),
                });
            }
        }

        // Newest first; the sort is stable, so equal timestamps keep their
        // scan (insertion) order.
        hits.sort_by(|a, b| b.message.created_at.cmp(&a.message.created_at));
        hits.truncate(limit);

        info!("Search '{}' matched {} messages (limit {})", needle, hits.len(), limit);
        Ok(hits)
    }
}
