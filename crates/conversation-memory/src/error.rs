//! Error types for the memory engine

use thiserror::Error;

/// Failures surfaced by store operations.
///
/// `SummarizationFailed` is produced during compaction and absorbed inside
/// `add_message`; callers of the public API only ever observe the other
/// variants.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Conversation already exists: {0}")]
    AlreadyExists(String),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("Invalid conversation record: {0}")]
    SerializationInvalid(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
