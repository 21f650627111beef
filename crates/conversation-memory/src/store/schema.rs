//! Schema types - conversations, messages, summaries, and portable records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Speaker of a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One immutable dialogue turn.
///
/// `created_at` is non-decreasing within a conversation; the store clamps
/// appends forward when the wall clock steps backward. A missing
/// `token_estimate` means the cost is unknown, not zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_estimate: Option<u32>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Rolling summary standing in for compacted-away messages.
///
/// A conversation carries at most one; each compaction folds the freshly
/// removed prefix into it, so `covered_message_count` is cumulative across
/// every compaction the conversation has seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub covered_message_count: usize,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Timestamp of the earliest message the summary covers.
    pub first_message_at: DateTime<Utc>,
    /// Timestamp of the latest message the summary covers.
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Bounded view of a conversation assembled for the next model call.
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    pub conversation_id: String,
    /// Most recent live messages, oldest first.
    pub messages: Vec<Message>,
    pub summary: Option<Summary>,
    /// Live messages plus everything already folded into the summary.
    pub total_message_count: usize,
    pub metadata: HashMap<String, String>,
}

/// Listing entry for one conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub live_message_count: usize,
    pub total_message_count: usize,
    pub has_summary: bool,
}

/// Per-conversation breakdown reported by `get_conversation_stats`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationStats {
    pub conversation_id: String,
    pub live_message_count: usize,
    pub user_message_count: usize,
    pub assistant_message_count: usize,
    pub compacted_message_count: usize,
    pub total_message_count: usize,
    pub has_summary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

/// Full-fidelity export record for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortableConversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");

        let parsed: Role = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(parsed, Role::Assistant);
    }

    #[test]
    fn test_message_token_estimate_defaults_to_unknown() {
        let raw = r#"{
            "id": "4f2f1c1e-9f0a-4b6b-8a6e-2f3c8d1b5a00",
            "role": "user",
            "content": "hello",
            "created_at": "2024-01-15T10:30:00Z"
        }"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(message.token_estimate, None);
        assert!(message.metadata.is_empty());
    }

    #[test]
    fn test_portable_record_round_trips_through_json() {
        let raw = r#"{
            "id": "support-1",
            "created_at": "2024-01-15T10:00:00Z",
            "updated_at": "2024-01-15T11:00:00Z",
            "metadata": {"channel": "email"},
            "messages": [{
                "id": "4f2f1c1e-9f0a-4b6b-8a6e-2f3c8d1b5a00",
                "role": "user",
                "content": "my invoice is wrong",
                "created_at": "2024-01-15T10:30:00Z",
                "token_estimate": 6
            }],
            "summary": {
                "text": "Customer disputes an invoice.",
                "covered_message_count": 12,
                "topics": ["invoice", "billing"],
                "first_message_at": "2024-01-15T10:00:00Z",
                "last_message_at": "2024-01-15T10:29:00Z",
                "created_at": "2024-01-15T10:29:30Z"
            }
        }"#;
        let record: PortableConversation = serde_json::from_str(raw).unwrap();
        assert_eq!(record.messages.len(), 1);
        assert_eq!(record.messages[0].token_estimate, Some(6));

        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: PortableConversation = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.messages, record.messages);
        assert_eq!(decoded.summary, record.summary);
        assert_eq!(decoded.metadata.get("channel").map(String::as_str), Some("email"));
    }
}
