//! Conversation memory
//!
//! Defines the stored turn record and the store that persists, searches and lists turns.

pub mod store;
pub mod types;

pub use store::ConversationStore;
pub use types::{
    ASSISTANT_MARKER, ConversationRecord, PrivacyLevel, RecordId, ScoredRecord, USER_MARKER,
    format_turn, parse_turn,
};
