//! Record types for conversation memory
//!
//! Defines the stored turn record, its privacy classification and the
//! `User:` / `AI:` document format used for embedding and context rebuilding.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RecallError;

/// Opaque record identifier assigned at creation.
pub type RecordId = Uuid;

/// Marker that opens the user part of a stored turn.
pub const USER_MARKER: &str = "User:";
/// Marker that opens the assistant part of a stored turn.
pub const ASSISTANT_MARKER: &str = "AI:";

/// A single stored turn (user message plus assistant reply).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique identifier for this record
    pub id: RecordId,
    /// Turn document, `User: ...\nAI: ...`
    pub content: String,
    /// Vector embedding of `content`
    pub embedding: Vec<f32>,
    /// Sensitivity assigned at save time
    pub privacy_level: PrivacyLevel,
    /// Normalized tags (lowercase, deduplicated)
    pub tags: Vec<String>,
    /// When this record was created
    pub created_at: DateTime<Utc>,
    /// Character count of the user part
    pub message_length: usize,
    /// Character count of the assistant part
    pub response_length: usize,
}

impl ConversationRecord {
    /// Build a record for a turn. The caller supplies id-independent fields; the id is fresh.
    pub fn new(
        user_text: &str,
        assistant_text: &str,
        embedding: Vec<f32>,
        privacy_level: PrivacyLevel,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: format_turn(user_text, assistant_text),
            embedding,
            privacy_level,
            tags: Vec::new(),
            created_at,
            message_length: user_text.chars().count(),
            response_length: assistant_text.chars().count(),
        }
    }

    /// Split the stored document back into `(user, assistant)`.
    ///
    /// The split is taken at `message_length` characters into the user part, so a user
    /// message that itself contains `\nAI:` keeps its roles. Falls back to [`parse_turn`]
    /// when the recorded length does not line up with the markers. Returns `None` when the
    /// delimiter markers are missing.
    pub fn turn(&self) -> Option<(&str, &str)> {
        split_at_length(&self.content, self.message_length).or_else(|| parse_turn(&self.content))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Format a turn as the stored document.
pub fn format_turn(user_text: &str, assistant_text: &str) -> String {
    format!("{USER_MARKER} {user_text}\n{ASSISTANT_MARKER} {assistant_text}")
}

fn split_at_length(content: &str, user_chars: usize) -> Option<(&str, &str)> {
    let rest = content.strip_prefix(USER_MARKER)?.strip_prefix(' ')?;
    let split = rest
        .char_indices()
        .nth(user_chars)
        .map_or(rest.len(), |(i, _)| i);
    let assistant = rest[split..]
        .strip_prefix('\n')?
        .strip_prefix(ASSISTANT_MARKER)?
        .strip_prefix(' ')?;
    Some((&rest[..split], assistant))
}

/// Parse a stored document into `(user, assistant)`, trimmed.
///
/// Splits at the first `\nAI:` marker, so a user message containing that marker is cut
/// short. Prefer [`ConversationRecord::turn`], which knows the user message length.
pub fn parse_turn(content: &str) -> Option<(&str, &str)> {
    let rest = content.trim_start().strip_prefix(USER_MARKER)?;
    let delimiter = format!("\n{ASSISTANT_MARKER}");
    let split = rest.find(&delimiter)?;
    let user = rest[..split].trim();
    let assistant = rest[split + delimiter.len()..].trim();
    Some((user, assistant))
}

/// Coarse sensitivity classification of a turn.
///
/// This is a keyword hint for browsing and filtering, not an access-control boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    High,
    Medium,
    Low,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::High => "high",
            PrivacyLevel::Medium => "medium",
            PrivacyLevel::Low => "low",
        }
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = RecallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(PrivacyLevel::High),
            "medium" => Ok(PrivacyLevel::Medium),
            "low" => Ok(PrivacyLevel::Low),
            other => Err(RecallError::Validation(format!(
                "Unknown privacy level: {other}. Use high, medium, or low."
            ))),
        }
    }
}

/// A search hit with its similarity score (higher is more similar).
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: ConversationRecord,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: &str, assistant: &str) -> ConversationRecord {
        ConversationRecord::new(user, assistant, vec![0.1; 8], PrivacyLevel::Low, Utc::now())
    }

    #[test]
    fn test_record_new_formats_document() {
        let r = record("Hello there", "Hi! How can I help?");
        assert_eq!(r.content, "User: Hello there\nAI: Hi! How can I help?");
        assert_eq!(r.message_length, 11);
        assert_eq!(r.response_length, 19);
        assert!(r.tags.is_empty());
    }

    #[test]
    fn test_lengths_count_characters_not_bytes() {
        let r = record("こんにちは", "はい");
        assert_eq!(r.message_length, 5);
        assert_eq!(r.response_length, 2);
    }

    #[test]
    fn test_turn_parses_back() {
        let r = record("What is Rust?", "A systems language.");
        assert_eq!(r.turn(), Some(("What is Rust?", "A systems language.")));
    }

    #[test]
    fn test_turn_keeps_marker_inside_user_text() {
        let r = record("quote this:\nAI: fake reply", "done");
        assert_eq!(r.turn(), Some(("quote this:\nAI: fake reply", "done")));
    }

    #[test]
    fn test_turn_with_stale_length_falls_back() {
        let mut r = record("hi", "hello");
        r.message_length = 99;
        assert_eq!(r.turn(), Some(("hi", "hello")));
    }

    #[test]
    fn test_parse_turn_multiline_reply() {
        let content = "User: list two things\nAI: one\ntwo";
        assert_eq!(parse_turn(content), Some(("list two things", "one\ntwo")));
    }

    #[test]
    fn test_parse_turn_missing_markers() {
        assert_eq!(parse_turn("just some text"), None);
        assert_eq!(parse_turn("User: no reply marker"), None);
        assert_eq!(parse_turn("AI: reply without user"), None);
    }

    #[test]
    fn test_privacy_level_from_str() {
        assert_eq!("HIGH".parse::<PrivacyLevel>().unwrap(), PrivacyLevel::High);
        assert_eq!(" medium ".parse::<PrivacyLevel>().unwrap(), PrivacyLevel::Medium);
        assert!("secret".parse::<PrivacyLevel>().is_err());
    }

    #[test]
    fn test_privacy_level_serializes_lowercase() {
        let json = serde_json::to_string(&PrivacyLevel::High).unwrap();
        assert_eq!(json, "\"high\"");
        let back: PrivacyLevel = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(back, PrivacyLevel::Low);
    }
}
