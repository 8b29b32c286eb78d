//! Application context
//!
//! Built once at start-up and passed to every request handler. Holds the shared store, the
//! context assembler and the query normalizer configured from [`Config`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::ContextAssembler;
use crate::error::{RecallError, Result};
use crate::memory::{ConversationStore, RecordId};
use crate::provider::{
    CompletionProvider, EmbeddingProvider, completion_provider_from_config,
    embedding_provider_from_config,
};
use crate::retrieval::RetrievalFilter;

/// Outcome of one chat exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
    /// `None` when the reply was produced but the turn could not be stored
    pub record_id: Option<RecordId>,
}

pub struct AppContext {
    pub config: Config,
    pub store: Arc<ConversationStore>,
    pub assembler: ContextAssembler,
    pub filter: RetrievalFilter,
}

impl AppContext {
    /// Build providers from config and open the store.
    pub async fn from_config(config: Config) -> Result<Self> {
        let embedder = embedding_provider_from_config(&config.embedding)?;
        let completion = completion_provider_from_config(&config.completion)?;
        Self::new(config, embedder, completion).await
    }

    pub async fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(open_store_with(&config, embedder).await?);
        let assembler =
            ContextAssembler::new(Arc::clone(&store), completion, config.context.clone())
                .with_timeout(Duration::from_secs(config.completion.timeout_secs));
        let filter = RetrievalFilter::from_config(&config.retrieval);

        Ok(Self {
            config,
            store,
            assembler,
            filter,
        })
    }

    /// Answer a message and remember the exchange.
    ///
    /// The reply is returned even if storing the turn fails afterwards.
    pub async fn chat(&self, message: &str) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(RecallError::Validation(
                "Message must not be empty".to_string(),
            ));
        }

        let reply = self.assembler.respond(message).await?;

        let record_id = match self.store.save(message, &reply).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Reply generated but the turn was not saved: {e}");
                None
            }
        };

        info!("Chat turn complete (saved: {})", record_id.is_some());
        Ok(ChatReply { reply, record_id })
    }
}

/// Open only the store, for commands that never call the completion provider.
pub async fn open_store(config: &Config) -> Result<ConversationStore> {
    config.validate()?;
    let embedder = embedding_provider_from_config(&config.embedding)?;
    open_store_with(config, embedder).await
}

async fn open_store_with(
    config: &Config,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<ConversationStore> {
    Ok(ConversationStore::open(
        &config.storage.data_dir,
        &config.storage.collection,
        embedder,
    )
    .await?
    .with_embed_timeout(Duration::from_secs(config.embedding.timeout_secs)))
}
