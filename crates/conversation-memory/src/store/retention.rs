//! Retention sweep - evict conversations whose activity has gone stale

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::store::ConversationStore;

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub conversations_evicted: usize,
    pub messages_dropped: usize,
    pub importance_entries_dropped: usize,
}

impl ConversationStore {
    /// Evict every conversation whose `updated_at` lies before
    /// `now - retention_days`.
    ///
    /// The id set is snapshotted up front; conversations created while the
    /// sweep runs are not visited, and each eviction happens under that
    /// conversation's own write lock so in-flight appends either finish
    /// first or land on a fresh implicit conversation. Running the sweep
    /// again immediately is a no-op.
    pub async fn clean_old_conversations(
        &self,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> CleanupStats {
        // A window the calendar cannot represent keeps everything.
        let cutoff = now
            .checked_sub_signed(Duration::days(i64::from(retention_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let ids = self.conversation_ids();
        debug!(
            "Retention sweep over {} conversations (cutoff: {})",
            ids.len(),
            cutoff
        );

        let mut stats = CleanupStats::default();
        for id in ids {
            let handle = match self.conversations.get(&id).map(|e| e.value().clone()) {
                Some(handle) => handle,
                // Deleted since the snapshot
                None => continue,
            };

            let mut state = handle.write().await;
            if state.deleted || state.updated_at >= cutoff {
                continue;
            }

            state.deleted = true;
            self.conversations.remove(&id);
            stats.importance_entries_dropped += self.purge_importance(&id);
            stats.messages_dropped += state.messages.len();
            stats.conversations_evicted += 1;
            self.counters.inc_conversations_evicted();
            debug!("Evicted conversation {} (last activity: {})", id, state.updated_at);
        }

        if stats.conversations_evicted > 0 {
            info!(
                "Retention sweep evicted {} conversations ({} messages, {} importance entries)",
                stats.conversations_evicted, stats.messages_dropped, stats.importance_entries_dropped
            );
        }
        stats
    }

    /// Sweep with the configured retention window against the current clock.
    pub async fn clean_expired(&self) -> CleanupStats {
        self.clean_old_conversations(self.config.retention_days, Utc::now())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::MemoryError;
    use crate::ports::Summarizer;
    use crate::store::schema::{Message, Role};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct StubSummarizer;

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(
            &self,
            _prior: Option<&str>,
            messages: &[Message],
        ) -> anyhow::Result<String> {
            Ok(format!("{} turns condensed", messages.len()))
        }
    }

    fn create_test_store() -> ConversationStore {
        ConversationStore::new(EngineConfig::default(), Arc::new(StubSummarizer))
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_stale_conversations() {
        let store = create_test_store();
        store
            .add_message("stale", Role::User, "old news", HashMap::new())
            .await;

        // Capture an instant between the two conversations' last activity,
        // then sweep as if 30 days had passed since that instant.
        let midpoint = Utc::now();
        store
            .add_message("active", Role::User, "fresh news", HashMap::new())
            .await;

        let stats = store
            .clean_old_conversations(30, midpoint + Duration::days(30))
            .await;

        assert_eq!(stats.conversations_evicted, 1);
        assert_eq!(store.conversation_count(), 1);
        assert!(store.get_context("active", None, false).await.is_ok());
        assert!(store.get_context("stale", None, false).await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_keeps_recent_conversations() {
        let store = create_test_store();
        store
            .add_message("recent", Role::User, "hello", HashMap::new())
            .await;

        let stats = store.clean_old_conversations(30, Utc::now()).await;

        assert_eq!(stats, CleanupStats::default());
        assert_eq!(store.conversation_count(), 1);
        assert!(store.get_context("recent", None, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_sweep_drops_importance_with_the_conversation() {
        let store = create_test_store();
        let message = store
            .add_message("stale", Role::User, "mark me", HashMap::new())
            .await;
        store.mark_important("stale", message.id, 0.8);
        store.mark_important("stale", uuid::Uuid::new_v4(), 0.4);

        let stats = store
            .clean_old_conversations(30, Utc::now() + Duration::days(31))
            .await;

        assert_eq!(stats.conversations_evicted, 1);
        assert_eq!(stats.messages_dropped, 1);
        assert_eq!(stats.importance_entries_dropped, 2);
        assert!(store.importance.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = create_test_store();
        store
            .add_message("stale", Role::User, "going away", HashMap::new())
            .await;

        let later = Utc::now() + Duration::days(45);
        let first = store.clean_old_conversations(30, later).await;
        let second = store.clean_old_conversations(30, later).await;

        assert_eq!(first.conversations_evicted, 1);
        assert_eq!(second, CleanupStats::default());
    }

    #[tokio::test]
    async fn test_evicted_conversation_is_gone_for_readers() {
        let store = create_test_store();
        store
            .add_message("stale", Role::User, "bye", HashMap::new())
            .await;

        store
            .clean_old_conversations(0, Utc::now() + Duration::days(1))
            .await;

        assert!(matches!(
            store.get_context("stale", None, false).await,
            Err(MemoryError::NotFound(_))
        ));

        // A later append rebuilds the conversation from scratch
        store
            .add_message("stale", Role::User, "round two", HashMap::new())
            .await;
        let ctx = store.get_context("stale", Some(100), true).await.unwrap();
        assert_eq!(ctx.messages.len(), 1);
        assert_eq!(ctx.total_message_count, 1);
    }

    #[tokio::test]
    async fn test_clean_expired_uses_configured_window() {
        let store = create_test_store();
        store
            .add_message("fresh", Role::User, "hello", HashMap::new())
            .await;

        // Nothing is 30 days old in this test process
        let stats = store.clean_expired().await;
        assert_eq!(stats.conversations_evicted, 0);
    }

    #[tokio::test]
    async fn test_zero_day_retention_evicts_everything_behind_now() {
        let store = create_test_store();
        store
            .add_message("any", Role::User, "hello", HashMap::new())
            .await;

        let stats = store
            .clean_old_conversations(0, Utc::now() + Duration::seconds(5))
            .await;
        assert_eq!(stats.conversations_evicted, 1);
    }

    #[tokio::test]
    async fn test_enormous_retention_window_keeps_everything() {
        let store = create_test_store();
        store
            .add_message("kept", Role::User, "still here", HashMap::new())
            .await;

        // u32::MAX days underflows the calendar; the sweep must treat the
        // window as unbounded instead of aborting.
        let stats = store.clean_old_conversations(u32::MAX, Utc::now()).await;

        assert_eq!(stats, CleanupStats::default());
        assert_eq!(store.conversation_count(), 1);
        assert!(store.get_context("kept", None, false).await.is_ok());
    }
}
