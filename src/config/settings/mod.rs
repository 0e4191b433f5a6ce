
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::RagError;
use crate::chunking::ChunkingConfig;
use crate::embeddings::{EmbeddingConfig, ProviderKind};
use crate::loader::{DocumentFormat, LoaderConfig};
use crate::pipeline::RetrievalConfig;

pub const CONFIG_DIR_ENV: &str = "DOCS_RAG_CONFIG_DIR";
const CONFIG_FILE_NAME: &str = "config.toml";
const MAX_CHUNK_SIZE: usize = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid chunk size: {0} (must be between 2 and {MAX_CHUNK_SIZE})")]
    InvalidChunkSize(usize),
    #[error("Invalid chunk overlap: {0} (must be greater than 0)")]
    InvalidChunkOverlap(usize),
    #[error("Chunk size ({0}) must be greater than chunk overlap ({1})")]
    ChunkSizeTooSmall(usize, usize),
    #[error("Invalid URL: {0} (must use http or https)")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 2048)")]
    InvalidBatchSize(u32),
    #[error("Invalid max in-flight requests: {0} (must be between 1 and 256)")]
    InvalidMaxInFlight(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid API key variable name: {0:?}")]
    InvalidApiKeyEnv(String),
    #[error("Invalid top k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("At least one loader extension must be configured")]
    NoExtensions,
    #[error("Unsupported loader extension: {0}")]
    UnsupportedExtension(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for RagError {
    #[inline]
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Io(e) => Self::Io(e),
            other => Self::InvalidConfiguration(other.to_string()),
        }
    }
}

impl Config {
    /// Directory holding `config.toml`: `$DOCS_RAG_CONFIG_DIR`, else the platform config dir
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        dirs::config_dir()
            .map(|dir| dir.join("docs-rag"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when it doesn't exist
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> crate::Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)?;
        let mut config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config.validate()?;

        debug!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> crate::Result<()> {
        self.validate()?;

        fs::create_dir_all(&self.base_dir)?;
        let content = toml::to_string_pretty(self).map_err(ConfigError::from)?;
        fs::write(self.config_file_path(), content)?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_chunking(&self.chunking)?;
        validate_embeddings(&self.embeddings)?;
        validate_retrieval(&self.retrieval)?;
        validate_loader(&self.loader)?;
        Ok(())
    }

    #[inline]
    pub fn set_chunking(&mut self, chunk_size: usize, chunk_overlap: usize) -> Result<(), ConfigError> {
        let chunking = ChunkingConfig {
            chunk_size,
            chunk_overlap,
        };
        validate_chunking(&chunking)?;
        self.chunking = chunking;
        Ok(())
    }

    #[inline]
    pub fn set_top_k(&mut self, top_k: usize) -> Result<(), ConfigError> {
        if !(1..=100).contains(&top_k) {
            return Err(ConfigError::InvalidTopK(top_k));
        }
        self.retrieval.top_k = top_k;
        Ok(())
    }

    #[inline]
    pub fn set_provider(&mut self, provider: ProviderKind) {
        self.embeddings.provider = provider;
    }

    #[inline]
    pub fn set_base_url(&mut self, url: &str) -> Result<(), ConfigError> {
        let parsed = parse_http_url(url)?;
        self.embeddings.base_url = Some(parsed);
        Ok(())
    }

    #[inline]
    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embeddings.model = Some(model);
        Ok(())
    }

    #[inline]
    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.embeddings.batch_size = batch_size;
        Ok(())
    }

    #[inline]
    pub fn set_max_in_flight(&mut self, max_in_flight: usize) -> Result<(), ConfigError> {
        if !(1..=256).contains(&max_in_flight) {
            return Err(ConfigError::InvalidMaxInFlight(max_in_flight));
        }
        self.embeddings.max_in_flight = max_in_flight;
        Ok(())
    }
}

fn validate_chunking(config: &ChunkingConfig) -> Result<(), ConfigError> {
    if !(2..=MAX_CHUNK_SIZE).contains(&config.chunk_size) {
        return Err(ConfigError::InvalidChunkSize(config.chunk_size));
    }
    if config.chunk_overlap == 0 {
        return Err(ConfigError::InvalidChunkOverlap(config.chunk_overlap));
    }
    if config.chunk_size <= config.chunk_overlap {
        return Err(ConfigError::ChunkSizeTooSmall(
            config.chunk_size,
            config.chunk_overlap,
        ));
    }
    Ok(())
}

fn validate_embeddings(config: &EmbeddingConfig) -> Result<(), ConfigError> {
    if let Some(url) = &config.base_url {
        parse_http_url(url.as_str())?;
    }

    if let Some(model) = config.model.as_ref().filter(|m| m.trim().is_empty()) {
        return Err(ConfigError::InvalidModel(model.clone()));
    }

    if config.batch_size == 0 || config.batch_size > 2048 {
        return Err(ConfigError::InvalidBatchSize(config.batch_size));
    }

    if !(1..=256).contains(&config.max_in_flight) {
        return Err(ConfigError::InvalidMaxInFlight(config.max_in_flight));
    }

    if !(1..=600).contains(&config.timeout_seconds) {
        return Err(ConfigError::InvalidTimeout(config.timeout_seconds));
    }

    if !(1..=10).contains(&config.retry_attempts) {
        return Err(ConfigError::InvalidRetryAttempts(config.retry_attempts));
    }

    let env_name_ok = !config.api_key_env.is_empty()
        && config
            .api_key_env
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !env_name_ok {
        return Err(ConfigError::InvalidApiKeyEnv(config.api_key_env.clone()));
    }

    Ok(())
}

fn validate_retrieval(config: &RetrievalConfig) -> Result<(), ConfigError> {
    if !(1..=100).contains(&config.top_k) {
        return Err(ConfigError::InvalidTopK(config.top_k));
    }
    Ok(())
}

fn validate_loader(config: &LoaderConfig) -> Result<(), ConfigError> {
    if config.extensions.is_empty() {
        return Err(ConfigError::NoExtensions);
    }
    for extension in &config.extensions {
        if DocumentFormat::from_extension(extension.trim_start_matches('.')).is_none() {
            return Err(ConfigError::UnsupportedExtension(extension.clone()));
        }
    }
    Ok(())
}

fn parse_http_url(url: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(parsed)
}
