use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::ContextConfig;
use crate::context::{ChatMessage, ContextWindow};
use crate::error::{RecallError, Result};
use crate::memory::{ConversationRecord, ConversationStore};
use crate::provider::{CompletionProvider, with_timeout};

const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds context windows from stored history and asks the completion provider for replies.
pub struct ContextAssembler {
    store: Arc<ConversationStore>,
    completion: Arc<dyn CompletionProvider>,
    config: ContextConfig,
    timeout: Duration,
}

impl ContextAssembler {
    pub fn new(
        store: Arc<ConversationStore>,
        completion: Arc<dyn CompletionProvider>,
        config: ContextConfig,
    ) -> Self {
        Self {
            store,
            completion,
            config,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build_context(
        &self,
        history: &[ConversationRecord],
        current_user_text: &str,
    ) -> ContextWindow {
        ContextWindow::build(
            &self.config.system_prompt,
            history,
            current_user_text,
            self.config.max_turns,
        )
    }

    /// Reply to `current_user_text` using recent stored turns as context.
    ///
    /// The reply is returned unmodified. Provider failures and timeouts are errors.
    pub async fn respond(&self, current_user_text: &str) -> Result<String> {
        let current = current_user_text.trim();
        if current.is_empty() {
            return Err(RecallError::Validation(
                "Message must not be empty".to_string(),
            ));
        }

        let history = self.store.recent(self.config.history_window, None).await?;
        let window = self.build_context(&history, current);
        debug!(
            "Requesting completion from {} with {} messages",
            self.completion.name(),
            window.len()
        );

        let messages: Vec<ChatMessage> = window.into_messages();
        let reply = with_timeout(
            self.timeout,
            self.completion.name(),
            self.completion.complete(&messages),
        )
        .await?;

        Ok(reply)
    }
}
