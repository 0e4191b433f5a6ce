// Embeddings module
// Provider boundary: turns text into fixed-length vectors over HTTP

#[cfg(test)]
mod tests;

mod http;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{RagError, Result};

pub use ollama::{ModelInfo, OllamaClient};
pub use openai::OpenAiClient;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text:latest";

/// Converts text into embedding vectors.
///
/// Implementations own their retry and timeout policy; a call that still fails
/// surfaces as a single [`RagError::Provider`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Name of the model producing the vectors
    fn model_name(&self) -> &str;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    /// Server base URL; the provider's public default when unset
    pub base_url: Option<Url>,
    /// Model name; the provider's default when unset
    pub model: Option<String>,
    /// Maximum number of texts sent in one request
    pub batch_size: u32,
    /// Maximum number of embedding calls in flight during ingest
    pub max_in_flight: usize,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            base_url: None,
            model: None,
            batch_size: 64,
            max_in_flight: 8,
            timeout_seconds: 30,
            retry_attempts: 3,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl EmbeddingConfig {
    /// Base URL to talk to, falling back to the provider default
    #[inline]
    pub fn effective_base_url(&self) -> Result<Url> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }

        let default = match self.provider {
            ProviderKind::OpenAi => DEFAULT_OPENAI_URL,
            ProviderKind::Ollama => DEFAULT_OLLAMA_URL,
        };
        Url::parse(default).map_err(|e| {
            RagError::InvalidConfiguration(format!("Invalid default URL {}: {}", default, e))
        })
    }

    /// Model to request, falling back to the provider default
    #[inline]
    pub fn effective_model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, ProviderKind::OpenAi) => DEFAULT_OPENAI_MODEL,
            (None, ProviderKind::Ollama) => DEFAULT_OLLAMA_MODEL,
        }
    }
}

/// Build the provider selected by the configuration
#[inline]
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(config)?),
        ProviderKind::Ollama => Arc::new(OllamaClient::new(config)?),
    };
    Ok(provider)
}

/// Collapse a boundary error chain into a provider error
pub(crate) fn provider_error(error: &anyhow::Error) -> RagError {
    RagError::Provider(format!("{:#}", error))
}
