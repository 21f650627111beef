//! Compaction - fold the oldest live messages into the rolling summary
//!
//! Runs inline on the appending task, under the conversation's write lock.
//! Holding the lock across the summarizer call is what queues concurrent
//! appends to the same conversation behind an in-flight summarization;
//! other conversations are untouched.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{MemoryError, Result};
use crate::store::schema::Summary;
use crate::store::{ConversationState, ConversationStore};
use crate::utils::{TextUtils, TopicExtractor};

impl ConversationStore {
    /// Evaluate the compaction trigger after an append and run one pass when
    /// crossed. Summarizer trouble never escapes: on failure the prior
    /// summary and the live window stay exactly as they were.
    pub(crate) async fn maybe_compact(&self, state: &mut ConversationState) {
        if state.messages.len() < self.config.summary_threshold {
            return;
        }

        match self.compact(state).await {
            Ok(0) => {}
            Ok(folded) => {
                self.counters.inc_compactions_run();
                info!(
                    "Compacted {} messages in {} ({} live remain, {} covered total)",
                    folded,
                    state.id,
                    state.messages.len(),
                    state.covered_count()
                );
            }
            Err(e) => {
                self.counters.inc_summarizer_failures();
                warn!(
                    "Compaction aborted for {}: {}. Conversation continues unsummarized.",
                    state.id, e
                );
            }
        }
    }

    /// One compaction pass: split off everything but the tail, ask the
    /// summarizer for a cumulative summary, then swap in the new rolling
    /// summary and the shortened live window together. Returns how many
    /// messages were folded away; `0` means there was nothing to fold.
    async fn compact(&self, state: &mut ConversationState) -> Result<usize> {
        let live = state.messages.len();
        if live <= self.config.keep_tail {
            return Ok(0);
        }
        let split = live - self.config.keep_tail;

        let to_compact: Vec<_> = state.messages[..split].to_vec();
        let prior_text = state.summary.as_ref().map(|s| s.text.clone());

        let summary_text = self
            .summarizer
            .summarize(prior_text.as_deref(), &to_compact)
            .await
            .map_err(|e| MemoryError::SummarizationFailed(e.to_string()))?;

        let fresh_topics = self
            .summarizer
            .extract_topics(&to_compact, self.config.max_topics);
        let extractor = TopicExtractor::with_max_topics(self.config.max_topics);
        let topics = match &state.summary {
            Some(prior) => extractor.merge_topics(&fresh_topics, &prior.topics),
            None => {
                let mut topics = fresh_topics;
                topics.truncate(self.config.max_topics);
                topics
            }
        };

        let first_message_at = state
            .summary
            .as_ref()
            .map(|s| s.first_message_at)
            .or_else(|| to_compact.first().map(|m| m.created_at))
            .unwrap_or_else(Utc::now);
        let last_message_at = to_compact
            .last()
            .map(|m| m.created_at)
            .unwrap_or_else(Utc::now);

        let covered_total = state.covered_count() + split;
        let preview = TextUtils::truncate_with_ellipsis(&summary_text, 80).into_owned();
        state.summary = Some(Summary {
            text: summary_text,
            covered_message_count: covered_total,
            topics,
            first_message_at,
            last_message_at,
            created_at: Utc::now(),
        });
        state.messages.drain(..split);
        state.updated_at = Utc::now();

        debug!("Rolling summary for {}: {}", state.id, preview);
        Ok(split)
    }

    /// Last-resort cap: drop the oldest live messages until the hard limit
    /// holds again. Loses data, so it only matters when compaction failed or
    /// could not make enough room.
    pub(crate) fn enforce_max_messages(&self, state: &mut ConversationState) {
        let live = state.messages.len();
        if live <= self.config.max_messages {
            return;
        }

        let excess = live - self.config.max_messages;
        state.messages.drain(..excess);
        state.updated_at = Utc::now();
        self.counters.inc_hard_trims();
        warn!(
            "Hard trimmed {} messages from {} ({} live remain, no summary produced)",
            excess,
            state.id,
            state.messages.len()
        );
    }
}
