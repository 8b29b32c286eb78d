use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RecallError, Result};

/// Main configuration structure for Recall
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Where and under which name conversations are persisted
    #[serde(default)]
    pub storage: StorageConfig,
    /// Default and maximum result limits for history queries
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Context window assembly
    #[serde(default)]
    pub context: ContextConfig,
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Completion provider configuration
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise the first existing file among
    /// `~/.recall/config.toml`, `<config_dir>/recall/config.toml` and `./config.toml` is used,
    /// falling back to defaults when none is found.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::from_file(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".recall").join("config.toml")),
            dirs::config_dir().map(|c| c.join("recall").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecallError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RecallError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply `RECALL_DATA_DIR`, `RECALL_COLLECTION` and `RECALL_MODEL` from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| lookup(key).and_then(|v| env_value(&v));

        if let Some(dir) = read("RECALL_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(collection) = read("RECALL_COLLECTION") {
            self.storage.collection = collection;
        }
        if let Some(model) = read("RECALL_MODEL") {
            self.completion.model = model;
        }
    }

    /// Reject settings the rest of the crate cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.storage.collection.trim().is_empty() {
            return Err(RecallError::Config(
                "storage.collection must not be empty".to_string(),
            ));
        }

        let positive = [
            ("retrieval.search_limit", self.retrieval.search_limit),
            ("retrieval.list_limit", self.retrieval.list_limit),
            ("retrieval.max_limit", self.retrieval.max_limit),
            ("context.max_turns", self.context.max_turns),
            ("context.history_window", self.context.history_window),
            ("embedding.dimension", self.embedding.dimension),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(RecallError::Config(format!("{name} must be greater than 0")));
            }
        }

        if self.embedding.timeout_secs == 0 || self.completion.timeout_secs == 0 {
            return Err(RecallError::Config(
                "provider timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.context.history_window < self.context.max_turns {
            return Err(RecallError::Config(format!(
                "context.history_window ({}) must be at least context.max_turns ({})",
                self.context.history_window, self.context.max_turns
            )));
        }

        match self.embedding.provider.as_str() {
            "local" | "openai" => Ok(()),
            other => Err(RecallError::Config(format!(
                "Unknown embedding provider: {other}. Use local or openai."
            ))),
        }
    }
}

/// Strip an inline `# comment` and surrounding whitespace; empty means unset.
fn env_value(raw: &str) -> Option<String> {
    let value = raw.split('#').next().unwrap_or_default().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the LanceDB dataset
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Table name for conversation records
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            collection: default_collection(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".recall").join("data"))
        .unwrap_or_else(|| PathBuf::from(".recall/data"))
}

fn default_collection() -> String {
    "conversations".to_string()
}

/// Query limit defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Results returned by a search when no limit is given
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Records returned by a listing when no limit is given
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    /// Upper bound any requested limit is clamped to
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            list_limit: default_list_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_search_limit() -> usize {
    5
}

fn default_list_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    500
}

/// Context window configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Prior turns included in each completion request
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Recent records read from the store before malformed ones are dropped
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Fixed system message opening every context window
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            history_window: default_history_window(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_max_turns() -> usize {
    5
}

fn default_history_window() -> usize {
    20
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant with memory of previous conversations. \
     Use the earlier turns of this conversation when they are relevant to the question."
        .to_string()
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Provider type: local or openai
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model name; empty selects the provider's default model
    #[serde(default)]
    pub model: String,
    /// Vector length returned by the openai provider (local models fix their own)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// API base URL for the openai provider
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Upper bound on a single embedding call
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: String::new(),
            dimension: default_embedding_dimension(),
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}

fn default_embedding_dimension() -> usize {
    1536
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

/// Completion provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Model identifier
    #[serde(default = "default_completion_model")]
    pub model: String,
    /// Upper bound on a single completion call
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    /// Reply token cap; the provider's own default when absent
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            model: default_completion_model(),
            timeout_secs: default_completion_timeout_secs(),
            max_tokens: None,
        }
    }
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_completion_model() -> String {
    "gpt-4.1".to_string()
}

fn default_completion_timeout_secs() -> u64 {
    60
}
