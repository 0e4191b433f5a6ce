// Configuration management module
// TOML-backed settings for chunking, embeddings, retrieval and loading

pub mod settings;


use std::path::{Path, PathBuf};

use tracing::info;

pub use settings::{CONFIG_DIR_ENV, Config, ConfigError};

/// Resolve the configuration directory, preferring an explicit override
#[inline]
pub fn resolve_config_dir(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Config::default_dir(),
    }
}

/// Write a default `config.toml` into `config_dir` unless one already exists.
///
/// Returns the path of the config file and whether it was created.
#[inline]
pub fn init_config(config_dir: &Path) -> crate::Result<(PathBuf, bool)> {
    let config = Config::load(config_dir)?;
    let path = config.config_file_path();
    if path.exists() {
        return Ok((path, false));
    }

    config.save()?;
    info!("Wrote default configuration to {}", path.display());
    Ok((path, true))
}

/// Human-readable summary of the effective configuration
#[inline]
pub fn render_config(config: &Config) -> String {
    let chunking = &config.chunking;
    let embeddings = &config.embeddings;
    let retrieval = &config.retrieval;
    let loader = &config.loader;
    let base_url = embeddings
        .effective_base_url()
        .map_or_else(|e| format!("invalid ({})", e), |url| url.to_string());

    format!(
        "Chunking:
  Chunk size: {}
  Chunk overlap: {}

Embeddings:
  Provider: {:?}
  URL: {}
  Model: {}
  Batch size: {}
  Max in flight: {}
  Timeout: {}s
  Retry attempts: {}
  API key variable: {}

Retrieval:
  Top k: {}
  Context separator: {:?}

Loader:
  Extensions: {}
  Lossy decoding: {}

Config file: {}",
        chunking.chunk_size,
        chunking.chunk_overlap,
        embeddings.provider,
        base_url,
        embeddings.effective_model(),
        embeddings.batch_size,
        embeddings.max_in_flight,
        embeddings.timeout_seconds,
        embeddings.retry_attempts,
        embeddings.api_key_env,
        retrieval.top_k,
        retrieval.context_separator,
        loader.extensions.join(", "),
        loader.encoding_lossy,
        config.config_file_path().display()
    )
}
