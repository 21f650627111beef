//! Frequency-ranked topic extraction for rolling summaries

use crate::store::schema::Message;
use crate::utils::text_utils::TextUtils;
use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref STOP_WORDS: Vec<&'static str> = vec![
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
        "of", "with", "by", "is", "am", "are", "was", "were", "be", "been",
        "being", "have", "has", "had", "do", "does", "did", "will", "would",
        "shall", "should", "may", "might", "must", "can", "could", "i", "you",
        "he", "she", "it", "we", "they", "me", "him", "her", "us", "them",
        "my", "your", "his", "its", "our", "their", "mine", "yours", "hers",
        "ours", "theirs", "this", "that", "these", "those", "what", "which",
        "who", "when", "where", "how", "why", "not", "no", "yes", "if", "then",
        "than", "so", "just", "about", "into", "over", "under", "again",
    ];
}

/// Ranks distinct significant words by how often they occur across a batch
/// of messages.
pub struct TopicExtractor {
    max_topics: usize,
    min_word_length: usize,
}

impl Default for TopicExtractor {
    fn default() -> Self {
        Self {
            max_topics: 5,
            min_word_length: 3,
        }
    }
}

impl TopicExtractor {
    pub fn new(max_topics: usize, min_word_length: usize) -> Self {
        Self {
            max_topics,
            min_word_length,
        }
    }

    /// Extractor with the default word-length floor and a custom cap.
    pub fn with_max_topics(max_topics: usize) -> Self {
        Self {
            max_topics,
            ..Self::default()
        }
    }

    /// Extract the most frequent significant words from `messages`.
    ///
    /// Ties rank by first occurrence so repeated extraction over the same
    /// batch is deterministic. Tokens come back lowercased.
    pub fn extract_from_messages(&self, messages: &[Message]) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for message in messages {
            let normalized = TextUtils::normalize_whitespace(&message.content);
            for token in TextUtils::word_tokens(&normalized) {
                if token.len() < self.min_word_length || Self::is_stop_word(&token) {
                    continue;
                }
                let seen = counts.entry(token.clone()).or_insert(0);
                if *seen == 0 {
                    order.push(token);
                }
                *seen += 1;
            }
        }

        let mut ranked: Vec<(String, usize, usize)> = order
            .into_iter()
            .enumerate()
            .map(|(first_seen, token)| {
                let count = counts.get(&token).copied().unwrap_or(0);
                (token, count, first_seen)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        ranked
            .into_iter()
            .map(|(token, _, _)| token)
            .take(self.max_topics)
            .collect()
    }

    /// Merge freshly extracted topics with the prior summary's topics.
    ///
    /// Fresh tokens lead so the list follows recent content; prior topics
    /// survive until displaced. Case-insensitive dedup, capped at
    /// `max_topics`.
    pub fn merge_topics(&self, fresh: &[String], prior: &[String]) -> Vec<String> {
        let mut merged: Vec<String> = Vec::with_capacity(self.max_topics);
        for topic in fresh.iter().chain(prior.iter()) {
            if merged.iter().any(|kept| kept.eq_ignore_ascii_case(topic)) {
                continue;
            }
            merged.push(topic.clone());
            if merged.len() == self.max_topics {
                break;
            }
        }
        merged
    }

    /// Check if a word is a stop word.
    pub fn is_stop_word(word: &str) -> bool {
        STOP_WORDS.contains(&word.to_lowercase().as_str())
    }
}
