//! Recall - Conversation memory for a chat assistant
//!
//! This crate persists dialog turns with a privacy classification and an embedding, serves
//! filtered listing and similarity search over them, and assembles bounded context windows
//! for the next completion request.

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod privacy;
pub mod provider;
pub mod retrieval;
pub mod storage;
pub mod testing;

pub use app::{AppContext, ChatReply, open_store};
pub use config::Config;
pub use error::{ErrorCode, RecallError, Result};
pub use memory::{ConversationRecord, ConversationStore, PrivacyLevel, RecordId, ScoredRecord};
