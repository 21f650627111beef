//! Efficient text processing helpers shared by search and topic extraction

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Case-insensitive text operations without allocation when possible
pub struct TextUtils;

impl TextUtils {
    /// Check whether `text` contains `pattern`, ignoring case.
    pub fn contains_ignore_case(text: &str, pattern: &str) -> bool {
        if pattern.is_empty() {
            return true;
        }
        if pattern.len() > text.len() {
            return false;
        }
        text.to_lowercase().contains(&pattern.to_lowercase())
    }

    /// Collapse whitespace runs into single spaces and trim the ends.
    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        match WHITESPACE_RUN.is_match(text) {
            true => Cow::Owned(WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()),
            false => Cow::Borrowed(text),
        }
    }

    /// Lowercased alphanumeric tokens with surrounding punctuation stripped.
    pub fn word_tokens(text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(|raw| {
                raw.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|token| !token.is_empty())
            .collect()
    }

    /// Truncate to at most `max_chars` characters, appending an ellipsis when
    /// anything was cut. Safe on multi-byte content.
    pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> Cow<'_, str> {
        if text.chars().count() <= max_chars {
            return Cow::Borrowed(text);
        }
        if max_chars <= 3 {
            return Cow::Borrowed("...");
        }
        let kept: String = text.chars().take(max_chars - 3).collect();
        Cow::Owned(format!("{}...", kept))
    }
}
