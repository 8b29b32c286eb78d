//! Context window assembly
//!
//! A context window is the fixed system message, then the most recent well-formed prior
//! turns as user/assistant pairs (oldest first), then the current user message.

pub mod assembler;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::ConversationRecord;

pub use assembler::ContextAssembler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message handed to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered messages for one completion request. The current message is always last.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    messages: Vec<ChatMessage>,
}

impl ContextWindow {
    /// Build a window from unordered history.
    ///
    /// Records whose document lacks the turn markers are skipped before the newest
    /// `max_turns` are selected.
    pub fn build(
        system_prompt: &str,
        history: &[ConversationRecord],
        current_user_text: &str,
        max_turns: usize,
    ) -> Self {
        let mut ordered: Vec<&ConversationRecord> = history.iter().collect();
        ordered.sort_by_key(|r| r.created_at);

        let turns: Vec<(&str, &str)> = ordered
            .into_iter()
            .filter_map(|record| {
                let turn = record.turn();
                if turn.is_none() {
                    debug!("Skipping malformed conversation record {}", record.id);
                }
                turn
            })
            .collect();

        let skip = turns.len().saturating_sub(max_turns);

        let mut messages = Vec::with_capacity(2 * max_turns.min(turns.len()) + 2);
        messages.push(ChatMessage::system(system_prompt));
        for (user, assistant) in turns.into_iter().skip(skip) {
            messages.push(ChatMessage::user(user));
            messages.push(ChatMessage::assistant(assistant));
        }
        messages.push(ChatMessage::user(current_user_text));

        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
