//! Embedding and completion providers
//!
//! Defines the provider traits the store and assembler depend on, the bounded-timeout
//! wrapper every provider call goes through, and factories that build the configured
//! implementation.

pub mod local;
pub mod openai;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{CompletionConfig, EmbeddingConfig};
use crate::context::ChatMessage;

pub use local::{FastEmbedProvider, LocalModel};
pub use openai::{OpenAiCompletionProvider, OpenAiEmbeddingProvider};

/// Errors raised by embedding or completion providers
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} did not respond within {timeout:?}")]
    Timeout {
        provider: &'static str,
        timeout: Duration,
    },
    #[error("API error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
}

/// Converts text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Converts an ordered message sequence into a reply.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Run a provider future with an upper bound on how long it may take.
pub async fn with_timeout<T, F>(
    timeout: Duration,
    provider: &'static str,
    fut: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout { provider, timeout }),
    }
}

/// Build the embedding provider selected by `[embedding].provider`.
pub fn embedding_provider_from_config(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    match config.provider.as_str() {
        "local" => {
            let model = LocalModel::from_name(&config.model)?;
            Ok(Arc::new(FastEmbedProvider::new(model)))
        }
        "openai" => Ok(Arc::new(OpenAiEmbeddingProvider::from_env(config)?)),
        other => Err(ProviderError::Config(format!(
            "Unknown embedding provider: {other}. Use local or openai."
        ))),
    }
}

/// Build the completion provider described by `[completion]`.
pub fn completion_provider_from_config(
    config: &CompletionConfig,
) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
    Ok(Arc::new(OpenAiCompletionProvider::from_env(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout(Duration::from_secs(1), "test", async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_with_timeout_elapsed() {
        let result: Result<(), ProviderError> =
            with_timeout(Duration::from_millis(20), "slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(ProviderError::Timeout { provider, timeout }) => {
                assert_eq!(provider, "slow");
                assert_eq!(timeout, Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_embedding_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "cohere".to_string(),
            ..EmbeddingConfig::default()
        };
        let err = embedding_provider_from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn test_local_provider_built_without_loading_model() {
        let provider = embedding_provider_from_config(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.name(), "fastembed");
        assert_eq!(provider.dimensions(), 384);
    }
}
