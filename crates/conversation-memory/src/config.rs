// conversation-memory/src/config.rs

use anyhow::{bail, Result};
use std::env;
use tracing::{info, warn};

/// Tunable limits for the memory engine.
///
/// Every limit has a code default; `from_env` overrides from `MEMORY_*`
/// environment variables so deployments can retune without a rebuild.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Live-message count at which an append triggers compaction.
    pub summary_threshold: usize,
    /// Most recent messages left live by each compaction.
    pub keep_tail: usize,
    /// Hard cap on live messages per conversation.
    pub max_messages: usize,
    /// Topic tokens carried on the rolling summary.
    pub max_topics: usize,
    /// Window size `get_context` uses when the caller does not pick one.
    pub default_context_messages: usize,
    /// Result cap `search` uses when the caller does not pick one.
    pub default_search_limit: usize,
    /// Age in days past which the retention sweep evicts a conversation.
    pub retention_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            summary_threshold: 20,
            keep_tail: 10,
            max_messages: 50,
            max_topics: 5,
            default_context_messages: 10,
            default_search_limit: 10,
            retention_days: 30,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let config = Self {
            summary_threshold: env::var("MEMORY_SUMMARY_THRESHOLD")
                .unwrap_or_else(|_| "20".into())
                .parse()?,
            keep_tail: env::var("MEMORY_KEEP_TAIL")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            max_messages: env::var("MEMORY_MAX_MESSAGES")
                .unwrap_or_else(|_| "50".into())
                .parse()?,
            max_topics: env::var("MEMORY_MAX_TOPICS")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
            default_context_messages: env::var("MEMORY_CONTEXT_MESSAGES")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            default_search_limit: env::var("MEMORY_SEARCH_LIMIT")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            retention_days: env::var("MEMORY_RETENTION_DAYS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject limit combinations the compaction algorithm cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.summary_threshold == 0 {
            bail!("summary_threshold must be at least 1");
        }
        if self.keep_tail > self.summary_threshold {
            bail!(
                "keep_tail ({}) must not exceed summary_threshold ({})",
                self.keep_tail,
                self.summary_threshold
            );
        }
        if self.summary_threshold > self.max_messages {
            bail!(
                "summary_threshold ({}) must not exceed max_messages ({})",
                self.summary_threshold,
                self.max_messages
            );
        }
        if self.default_context_messages == 0 {
            bail!("default_context_messages must be at least 1");
        }
        if self.default_search_limit == 0 {
            bail!("default_search_limit must be at least 1");
        }
        Ok(())
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Summary Threshold: {}", self.summary_threshold);
        info!("- Keep Tail: {}", self.keep_tail);
        info!("- Max Messages: {}", self.max_messages);
        info!("- Max Topics: {}", self.max_topics);
        info!("- Context Window: {}", self.default_context_messages);
        info!("- Search Limit: {}", self.default_search_limit);
        info!("- Retention: {} days", self.retention_days);
    }
}
