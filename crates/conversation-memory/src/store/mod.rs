//! Conversation store - per-conversation locked state over a concurrent map
//!
//! Each conversation lives behind its own `RwLock`, so writers on different
//! conversations never contend and readers always observe a consistent
//! snapshot. The map itself is a `DashMap`; no operation holds a global lock
//! beyond the momentary shard access.

pub mod compaction;
pub mod retention;
pub mod schema;
pub mod serializer;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{MemoryError, Result};
use crate::ports::{ConversationPersistence, Summarizer};

pub use retention::CleanupStats;
pub use schema::{
    Context, ConversationInfo, ConversationStats, Message, PortableConversation, Role, Summary,
};

/// Per-conversation state guarded by its own lock.
#[derive(Debug, Clone)]
pub(crate) struct ConversationState {
    pub id: String,
    pub messages: Vec<Message>,
    pub summary: Option<Summary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
    /// Set under the write lock just before the entry leaves the map, so a
    /// writer holding a stale handle cannot resurrect evicted state.
    pub deleted: bool,
}

impl ConversationState {
    fn fresh(id: &str, metadata: HashMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            messages: Vec::new(),
            summary: None,
            created_at: now,
            updated_at: now,
            metadata,
            deleted: false,
        }
    }

    /// Messages already folded into the rolling summary.
    pub fn covered_count(&self) -> usize {
        self.summary
            .as_ref()
            .map(|s| s.covered_message_count)
            .unwrap_or(0)
    }

    /// Live messages plus everything the summary stands in for.
    pub fn total_count(&self) -> usize {
        self.messages.len() + self.covered_count()
    }
}

/// Lock-free counters tracking engine activity.
#[derive(Debug, Default)]
pub struct EngineCounters {
    messages_appended: AtomicU64,
    compactions_run: AtomicU64,
    summarizer_failures: AtomicU64,
    hard_trims: AtomicU64,
    conversations_evicted: AtomicU64,
}

impl EngineCounters {
    pub fn inc_messages_appended(&self) -> u64 {
        self.messages_appended.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_compactions_run(&self) -> u64 {
        self.compactions_run.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_summarizer_failures(&self) -> u64 {
        self.summarizer_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_hard_trims(&self) -> u64 {
        self.hard_trims.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_conversations_evicted(&self) -> u64 {
        self.conversations_evicted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            messages_appended: self.messages_appended.load(Ordering::Relaxed),
            compactions_run: self.compactions_run.load(Ordering::Relaxed),
            summarizer_failures: self.summarizer_failures.load(Ordering::Relaxed),
            hard_trims: self.hard_trims.load(Ordering::Relaxed),
            conversations_evicted: self.conversations_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy)]
pub struct CounterSnapshot {
    pub messages_appended: u64,
    pub compactions_run: u64,
    pub summarizer_failures: u64,
    pub hard_trims: u64,
    pub conversations_evicted: u64,
}

/// In-memory conversation store with rolling summaries.
///
/// Construct once and share behind an `Arc`; every method takes `&self`.
pub struct ConversationStore {
    pub(crate) conversations: DashMap<String, Arc<RwLock<ConversationState>>>,
    /// Importance scores keyed by (conversation, message). Kept outside the
    /// per-conversation state so marks survive compaction of their target.
    pub(crate) importance: DashMap<(String, Uuid), f64>,
    pub(crate) summarizer: Arc<dyn Summarizer>,
    pub(crate) config: EngineConfig,
    pub(crate) counters: EngineCounters,
}

impl ConversationStore {
    pub fn new(config: EngineConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        info!(
            "Conversation store ready (threshold: {}, keep_tail: {}, max_messages: {})",
            config.summary_threshold, config.keep_tail, config.max_messages
        );
        Self {
            conversations: DashMap::new(),
            importance: DashMap::new(),
            summarizer,
            config,
            counters: EngineCounters::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Stable id snapshot; the map is only touched momentarily.
    pub fn conversation_ids(&self) -> Vec<String> {
        self.conversations
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    // ----- creation -----

    /// Create a conversation under a generated id and return it.
    pub async fn create_conversation(&self, metadata: HashMap<String, String>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.create_conversation_with_id(&id, metadata).await?;
        Ok(id)
    }

    /// Create a conversation under a caller-supplied id.
    pub async fn create_conversation_with_id(
        &self,
        conversation_id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.insert_fresh(ConversationState::fresh(conversation_id, metadata))?;
        info!("Created conversation: {}", conversation_id);
        Ok(())
    }

    /// Insert a fully-formed state; `AlreadyExists` when the id is taken.
    pub(crate) fn insert_fresh(&self, state: ConversationState) -> Result<()> {
        match self.conversations.entry(state.id.clone()) {
            Entry::Occupied(_) => Err(MemoryError::AlreadyExists(state.id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(state)));
                Ok(())
            }
        }
    }

    /// Fast path returns the existing handle; slow path inserts a fresh one.
    fn get_or_create(&self, conversation_id: &str) -> Arc<RwLock<ConversationState>> {
        if let Some(existing) = self.conversations.get(conversation_id) {
            return existing.value().clone();
        }

        let fresh = Arc::new(RwLock::new(ConversationState::fresh(
            conversation_id,
            HashMap::new(),
        )));
        // entry() so two racing creators converge on one state
        self.conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                info!("Created conversation implicitly: {}", conversation_id);
                fresh
            })
            .value()
            .clone()
    }

    /// Handle for an existing conversation, `NotFound` otherwise.
    pub(crate) fn get_handle(&self, conversation_id: &str) -> Result<Arc<RwLock<ConversationState>>> {
        self.conversations
            .get(conversation_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MemoryError::NotFound(conversation_id.to_string()))
    }

    // ----- appends -----

    /// Append one turn and evaluate the compaction trigger.
    ///
    /// Missing conversations are created on the fly, so this call is
    /// infallible; summarizer trouble is absorbed internally and at worst
    /// costs the oldest messages to a hard trim.
    pub async fn add_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: impl Into<String>,
        metadata: HashMap<String, String>,
    ) -> Message {
        let content = content.into();
        loop {
            let handle = self.get_or_create(conversation_id);
            let mut state = handle.write().await;
            if state.deleted {
                // Lost a race with eviction; take a fresh handle.
                drop(state);
                continue;
            }

            let message = build_message(&state, role, &content, &metadata);
            state.messages.push(message.clone());
            state.updated_at = Utc::now();
            self.counters.inc_messages_appended();
            debug!(
                "Appended {} message {} to {} ({} live)",
                role,
                message.id,
                conversation_id,
                state.messages.len()
            );

            self.maybe_compact(&mut state).await;
            self.enforce_max_messages(&mut state);

            return message;
        }
    }

    // ----- reads -----

    /// Assemble the context for the next model call: the most recent live
    /// messages (oldest first) plus the rolling summary when requested.
    ///
    /// Unlike `add_message`, a missing conversation is an error here; reads
    /// never create state.
    pub async fn get_context(
        &self,
        conversation_id: &str,
        max_messages: Option<usize>,
        include_summary: bool,
    ) -> Result<Context> {
        let handle = self.get_handle(conversation_id)?;
        let state = handle.read().await;
        if state.deleted {
            return Err(MemoryError::NotFound(conversation_id.to_string()));
        }

        let window = max_messages.unwrap_or(self.config.default_context_messages);
        let start = state.messages.len().saturating_sub(window);
        let messages = state.messages[start..].to_vec();
        let summary = if include_summary {
            state.summary.clone()
        } else {
            None
        };

        debug!(
            "Context for {}: {} of {} live messages, summary: {}",
            conversation_id,
            messages.len(),
            state.messages.len(),
            summary.is_some()
        );

        Ok(Context {
            conversation_id: conversation_id.to_string(),
            messages,
            summary,
            total_message_count: state.total_count(),
            metadata: state.metadata.clone(),
        })
    }

    /// Listing of all conversations, most recently updated first.
    pub async fn list_conversations(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Vec<ConversationInfo> {
        let handles: Vec<Arc<RwLock<ConversationState>>> = self
            .conversations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            let state = handle.read().await;
            if state.deleted {
                continue;
            }
            infos.push(ConversationInfo {
                id: state.id.clone(),
                created_at: state.created_at,
                updated_at: state.updated_at,
                live_message_count: state.messages.len(),
                total_message_count: state.total_count(),
                has_summary: state.summary.is_some(),
            });
        }

        infos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        infos
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(50))
            .collect()
    }

    /// Detailed counts for one conversation.
    pub async fn get_conversation_stats(&self, conversation_id: &str) -> Result<ConversationStats> {
        let handle = self.get_handle(conversation_id)?;
        let state = handle.read().await;
        if state.deleted {
            return Err(MemoryError::NotFound(conversation_id.to_string()));
        }

        let user_message_count = state
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .count();

        Ok(ConversationStats {
            conversation_id: conversation_id.to_string(),
            live_message_count: state.messages.len(),
            user_message_count,
            assistant_message_count: state.messages.len() - user_message_count,
            compacted_message_count: state.covered_count(),
            total_message_count: state.total_count(),
            has_summary: state.summary.is_some(),
            created_at: state.created_at,
            updated_at: state.updated_at,
            metadata: state.metadata.clone(),
        })
    }

    // ----- importance -----

    /// Record a salience score for a message.
    ///
    /// Deliberately tolerant: the mark lands even when the target message has
    /// already been compacted away or the conversation does not exist, so
    /// background scorers never race the compactor.
    pub fn mark_important(&self, conversation_id: &str, message_id: Uuid, score: f64) {
        self.importance
            .insert((conversation_id.to_string(), message_id), score);
        debug!(
            "Importance {:.2} on message {} in {}",
            score, message_id, conversation_id
        );
    }

    /// Live messages scoring at or above `min_score`, in timeline order.
    /// Marks whose message was compacted away are skipped.
    pub async fn get_important_messages(
        &self,
        conversation_id: &str,
        min_score: f64,
    ) -> Result<Vec<Message>> {
        let handle = self.get_handle(conversation_id)?;
        let state = handle.read().await;
        if state.deleted {
            return Err(MemoryError::NotFound(conversation_id.to_string()));
        }

        let hits = state
            .messages
            .iter()
            .filter(|message| {
                self.importance
                    .get(&(conversation_id.to_string(), message.id))
                    .map(|score| *score >= min_score)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(hits)
    }

    // ----- deletion -----

    /// Remove a conversation and every record attached to it.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let handle = self.get_handle(conversation_id)?;
        let mut state = handle.write().await;
        if state.deleted {
            return Err(MemoryError::NotFound(conversation_id.to_string()));
        }

        state.deleted = true;
        self.conversations.remove(conversation_id);
        self.purge_importance(conversation_id);
        info!(
            "Deleted conversation {} ({} live messages dropped)",
            conversation_id,
            state.messages.len()
        );
        Ok(())
    }

    /// Drop every importance entry belonging to `conversation_id`; returns
    /// how many went away.
    pub(crate) fn purge_importance(&self, conversation_id: &str) -> usize {
        let stale: Vec<(String, Uuid)> = self
            .importance
            .iter()
            .filter(|entry| entry.key().0 == conversation_id)
            .map(|entry| entry.key().clone())
            .collect();
        for key in &stale {
            self.importance.remove(key);
        }
        stale.len()
    }

    // ----- persistence port -----

    /// Export every conversation through the persistence port. Returns the
    /// number of records written.
    pub async fn save_all_to(&self, port: &dyn ConversationPersistence) -> anyhow::Result<usize> {
        let ids = self.conversation_ids();
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.export(&id).await {
                Ok(record) => records.push(record),
                // Evicted between the snapshot and the export; skip it.
                Err(MemoryError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let count = records.len();
        port.save_all(&records).await?;
        info!("Saved {} conversations through the persistence port", count);
        Ok(count)
    }

    /// Import records from the persistence port. Bad or conflicting records
    /// are skipped with a warning so one stale entry cannot poison startup.
    /// Returns the number imported.
    pub async fn load_all_from(&self, port: &dyn ConversationPersistence) -> anyhow::Result<usize> {
        let records = port.load_all().await?;
        let mut imported = 0;
        for record in records {
            let id = record.id.clone();
            match self.import(record).await {
                Ok(_) => imported += 1,
                Err(MemoryError::AlreadyExists(_)) => {
                    warn!("Skipping persisted conversation {}: id already present", id);
                }
                Err(e) => {
                    warn!("Skipping persisted conversation {}: {}", id, e);
                }
            }
        }
        info!("Loaded {} conversations through the persistence port", imported);
        Ok(imported)
    }
}

/// Build the next message for `state`, clamping `created_at` forward by one
/// tick when the wall clock stepped behind the previous message.
fn build_message(
    state: &ConversationState,
    role: Role,
    content: &str,
    metadata: &HashMap<String, String>,
) -> Message {
    let created_at = clamp_monotonic(state.messages.last().map(|m| m.created_at), Utc::now());
    Message {
        id: Uuid::new_v4(),
        role,
        content: content.to_string(),
        created_at,
        // Rough chars-per-token heuristic.
        token_estimate: Some((content.len() / 4) as u32),
        metadata: metadata.clone(),
    }
}

/// One tick past `previous` when `now` runs behind it, `now` otherwise.
/// Equal timestamps pass through untouched; ordering ties are broken by
/// insertion order downstream.
fn clamp_monotonic(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now < prev => prev + Duration::microseconds(1),
        _ => now,
    }
}
