//! Utilities module - Text processing and topic extraction helpers

pub mod text_utils;
pub mod topic_extractor;

// Re-export commonly used utilities
pub use text_utils::TextUtils;
pub use topic_extractor::TopicExtractor;
