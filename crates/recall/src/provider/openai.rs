//! Providers for OpenAI-compatible HTTP APIs
//!
//! Both providers talk to any endpoint that speaks the OpenAI `/embeddings` and
//! `/chat/completions` wire format. The API key is read from the environment variable
//! named in config. Requests are made once; a failed call is reported, never retried.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CompletionProvider, EmbeddingProvider, ProviderError};
use crate::config::{CompletionConfig, EmbeddingConfig};
use crate::context::ChatMessage;

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

fn read_api_key(var: &str) -> Result<String, ProviderError> {
    match env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(ProviderError::Config(format!("API key env var '{var}' not set"))),
    }
}

fn build_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Config(format!("Failed to build HTTP client: {e}")))
}

fn endpoint(api_url: &str, path: &str) -> Result<String, ProviderError> {
    let base = url::Url::parse(api_url)
        .map_err(|e| ProviderError::Config(format!("Invalid api_url '{api_url}': {e}")))?;
    Ok(format!("{}/{path}", base.as_str().trim_end_matches('/')))
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ProviderError::Api(format!("API returned {status}: {body}")))
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding provider for `POST {api_url}/embeddings`
#[derive(Debug)]
pub struct OpenAiEmbeddingProvider {
    client: Client,
    url: String,
    model: String,
    dimension: usize,
    api_key: String,
}

impl OpenAiEmbeddingProvider {
    /// Create a provider reading the API key from `config.api_key_env`.
    pub fn from_env(config: &EmbeddingConfig) -> Result<Self, ProviderError> {
        let api_key = read_api_key(&config.api_key_env)?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &EmbeddingConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let model = if config.model.trim().is_empty() {
            DEFAULT_EMBEDDING_MODEL.to_string()
        } else {
            config.model.clone()
        };

        info!(
            "OpenAI embedding provider initialized with model: {}, api_url: {}",
            model, config.api_url
        );

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: endpoint(&config.api_url, "embeddings")?,
            model,
            dimension: config.dimension,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Api(e.to_string()))?;

        let parsed: EmbeddingResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::Parse("Empty embedding response".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(ProviderError::Dimension {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "openai-embeddings"
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Completion provider for `POST {api_url}/chat/completions`
#[derive(Debug)]
pub struct OpenAiCompletionProvider {
    client: Client,
    url: String,
    model: String,
    max_tokens: Option<u32>,
    api_key: String,
}

impl OpenAiCompletionProvider {
    /// Create a provider reading the API key from `config.api_key_env`.
    pub fn from_env(config: &CompletionConfig) -> Result<Self, ProviderError> {
        let api_key = read_api_key(&config.api_key_env)?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &CompletionConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        info!(
            "OpenAI completion provider initialized with model: {}, api_url: {}",
            config.model, config.api_url
        );

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: endpoint(&config.api_url, "chat/completions")?,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };

        debug!("Calling chat completions at {} with {} messages", self.url, messages.len());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Api(e.to_string()))?;

        let completion: ChatCompletionResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Api("Empty response".to_string()))
    }

    fn name(&self) -> &'static str {
        "openai-chat"
    }
}
