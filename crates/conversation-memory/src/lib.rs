// conversation-memory/src/lib.rs

pub mod config;
pub mod error;
pub mod ports;
pub mod search;
pub mod store;
pub mod telemetry;
pub mod utils;

// Public API exports
pub use config::EngineConfig;
pub use error::{MemoryError, Result};
pub use ports::{ConversationPersistence, JsonFilePersistence, Summarizer};
pub use store::{ConversationStore, CounterSnapshot, EngineCounters};

// Schema exports
pub use store::{
    CleanupStats, Context, ConversationInfo, ConversationStats, Message, PortableConversation,
    Role, Summary,
};
pub use search::{SearchHit, SearchQuery};
