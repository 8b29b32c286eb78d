//! Test utilities for recall - provider mocks
//!
//! These let store and assembler tests run without downloading a model or calling an API:
//! - Deterministic hash-based embeddings
//! - Embedders that fail or stall, for atomicity and timeout tests
//! - A scripted completion provider that records what it was sent

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::ChatMessage;
use crate::provider::{CompletionProvider, EmbeddingProvider, ProviderError};

/// Dimension matching the default local model.
pub const MOCK_EMBEDDING_DIMENSION: usize = 384;

/// Mock embedding provider for fast tests that don't need real ML.
/// Produces deterministic vectors based on input text hash.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            dimensions: MOCK_EMBEDDING_DIMENSION,
        }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Generate a deterministic "embedding" from text using hashing.
    /// Values are in range [-1, 1]; identical text always gives identical vectors.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        (0..self.dimensions)
            .map(|i| {
                let x = seed
                    .wrapping_mul(i as u64 + 1)
                    .wrapping_add(0x9e3779b97f4a7c15);
                let normalized = (x as f32) / (u64::MAX as f32);
                (normalized * 2.0) - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "mock-embedding"
    }
}

/// Embedder whose every call fails.
#[derive(Debug, Clone, Default)]
pub struct FailingEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Api("embedding service unavailable".to_string()))
    }

    fn dimensions(&self) -> usize {
        MOCK_EMBEDDING_DIMENSION
    }

    fn name(&self) -> &'static str {
        "failing-embedding"
    }
}

/// Embedder that sleeps before answering.
#[derive(Debug, Clone)]
pub struct StalledEmbeddingProvider {
    delay: Duration,
}

impl StalledEmbeddingProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl EmbeddingProvider for StalledEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        tokio::time::sleep(self.delay).await;
        MockEmbeddingProvider::new().embed(text).await
    }

    fn dimensions(&self) -> usize {
        MOCK_EMBEDDING_DIMENSION
    }

    fn name(&self) -> &'static str {
        "stalled-embedding"
    }
}

/// Completion provider returning a fixed reply (or failing) and keeping every request.
#[derive(Debug)]
pub struct MockCompletionProvider {
    reply: Result<String, String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockCompletionProvider {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every message sequence received so far, oldest call first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(ProviderError::Api)
    }

    fn name(&self) -> &'static str {
        "mock-completion"
    }
}
