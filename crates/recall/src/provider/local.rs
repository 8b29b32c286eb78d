//! Local embedding provider backed by fastembed
//!
//! The ONNX model is downloaded and loaded on the first `embed` call, not at construction,
//! so building a store for history browsing never pays the model start-up cost.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use tracing::info;

use super::{EmbeddingProvider, ProviderError};

/// Dimension shared by every supported local model.
pub const LOCAL_EMBEDDING_DIMENSION: usize = 384;

/// Local models selectable through `[embedding].model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalModel {
    #[default]
    MultilingualE5Small,
    AllMiniLmL6V2,
    BgeSmallEnV15,
}

impl LocalModel {
    /// Resolve a configured model name. An empty name selects the default model.
    pub fn from_name(name: &str) -> Result<Self, ProviderError> {
        match name.trim().to_lowercase().as_str() {
            "" | "multilingual-e5-small" | "intfloat/multilingual-e5-small" => {
                Ok(LocalModel::MultilingualE5Small)
            }
            "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
                Ok(LocalModel::AllMiniLmL6V2)
            }
            "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok(LocalModel::BgeSmallEnV15),
            other => Err(ProviderError::Config(format!(
                "Unknown local embedding model: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LocalModel::MultilingualE5Small => "multilingual-e5-small",
            LocalModel::AllMiniLmL6V2 => "all-minilm-l6-v2",
            LocalModel::BgeSmallEnV15 => "bge-small-en-v1.5",
        }
    }

    pub fn dimensions(&self) -> usize {
        LOCAL_EMBEDDING_DIMENSION
    }

    fn fastembed_model(&self) -> FastEmbedModel {
        match self {
            LocalModel::MultilingualE5Small => FastEmbedModel::MultilingualE5Small,
            LocalModel::AllMiniLmL6V2 => FastEmbedModel::AllMiniLML6V2,
            LocalModel::BgeSmallEnV15 => FastEmbedModel::BGESmallENV15,
        }
    }
}

/// Embedding provider running a fastembed model in-process.
pub struct FastEmbedProvider {
    model: LocalModel,
    inner: Arc<Mutex<Option<TextEmbedding>>>,
}

impl FastEmbedProvider {
    pub fn new(model: LocalModel) -> Self {
        Self {
            model,
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub fn model(&self) -> LocalModel {
        self.model
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let inner = Arc::clone(&self.inner);
        let model = self.model;
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| ProviderError::Model("Embedding model lock poisoned".to_string()))?;

            if guard.is_none() {
                info!("Loading local embedding model {}", model.as_str());
                let loaded = TextEmbedding::try_new(InitOptions::new(model.fastembed_model()))
                    .map_err(|e| ProviderError::Model(e.to_string()))?;
                *guard = Some(loaded);
            }

            let embedder = guard
                .as_mut()
                .ok_or_else(|| ProviderError::Model("Embedding model not loaded".to_string()))?;

            embedder
                .embed(vec![text], None)
                .map_err(|e| ProviderError::Model(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::Model("No embedding returned".to_string()))
        })
        .await
        .map_err(|e| ProviderError::Model(format!("Embedding task failed: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.model.dimensions()
    }

    fn name(&self) -> &'static str {
        "fastembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_names() {
        assert_eq!(
            LocalModel::from_name("").unwrap(),
            LocalModel::MultilingualE5Small
        );
        assert_eq!(
            LocalModel::from_name("All-MiniLM-L6-v2").unwrap(),
            LocalModel::AllMiniLmL6V2
        );
        assert_eq!(
            LocalModel::from_name("BAAI/bge-small-en-v1.5").unwrap(),
            LocalModel::BgeSmallEnV15
        );
        assert!(LocalModel::from_name("text-embedding-3-small").is_err());
    }

    #[test]
    fn test_provider_is_lazy() {
        let provider = FastEmbedProvider::new(LocalModel::default());
        assert!(provider.inner.lock().unwrap().is_none());
        assert_eq!(provider.dimensions(), LOCAL_EMBEDDING_DIMENSION);
    }
}

#[cfg(all(test, feature = "ml-tests"))]
mod ml_tests {
    use super::*;

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (norm_a * norm_b)
    }

    #[tokio::test]
    async fn test_embed_returns_model_dimension() {
        let provider = FastEmbedProvider::new(LocalModel::default());
        let embedding = provider.embed("Hello, world!").await.unwrap();
        assert_eq!(embedding.len(), LOCAL_EMBEDDING_DIMENSION);
    }

    #[tokio::test]
    async fn test_similar_turns_score_higher() {
        let provider = FastEmbedProvider::new(LocalModel::default());

        let a = provider
            .embed("User: how do I reset my password\nAI: use the settings page")
            .await
            .unwrap();
        let b = provider
            .embed("User: I forgot my password\nAI: you can reset it in settings")
            .await
            .unwrap();
        let c = provider
            .embed("User: what's a good pasta recipe\nAI: try carbonara")
            .await
            .unwrap();

        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }
}
