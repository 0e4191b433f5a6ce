
pub mod pdf;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{RagError, Result};

/// Raw text content of one loaded file or upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub source: Option<PathBuf>,
}

impl Document {
    #[inline]
    pub fn new(text: impl Into<String>, source: Option<PathBuf>) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// File formats the loader knows how to turn into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Pdf,
}

impl DocumentFormat {
    #[inline]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" | "text" | "md" | "markdown" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Loader settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    /// File extensions (without the dot) picked up from files and directories
    pub extensions: Vec<String>,
    /// Replace invalid UTF-8 in text files instead of rejecting the file
    pub encoding_lossy: bool,
}

impl Default for LoaderConfig {
    #[inline]
    fn default() -> Self {
        Self {
            extensions: vec!["txt".to_string(), "pdf".to_string()],
            encoding_lossy: false,
        }
    }
}

/// Result of scanning a directory: everything that loaded, and everything that didn't
#[derive(Debug, Default)]
pub struct DirectoryLoad {
    pub documents: Vec<Document>,
    pub failures: Vec<(PathBuf, RagError)>,
}

/// Reads text and PDF files into [`Document`]s
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    extensions: Vec<String>,
    encoding_lossy: bool,
}

impl Default for DocumentLoader {
    #[inline]
    fn default() -> Self {
        Self::from_config(&LoaderConfig::default())
    }
}

impl DocumentLoader {
    #[inline]
    pub fn new<S: AsRef<str>>(extensions: &[S], encoding_lossy: bool) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            encoding_lossy,
        }
    }

    #[inline]
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::new(&config.extensions, config.encoding_lossy)
    }

    /// Whether a path has one of the configured extensions and a known format
    #[inline]
    pub fn is_supported(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let extension = extension.to_ascii_lowercase();

        self.extensions.contains(&extension) && DocumentFormat::from_extension(&extension).is_some()
    }

    /// Load a single supported file, or every supported file under a directory.
    ///
    /// Files inside a directory that fail to load are logged and skipped.
    #[inline]
    pub fn load(&self, path: &Path) -> Result<Vec<Document>> {
        if path.is_dir() {
            let DirectoryLoad {
                documents,
                failures,
            } = self.load_directory(path)?;

            for (failed_path, error) in &failures {
                warn!("Skipped {}: {}", failed_path.display(), error);
            }
            return Ok(documents);
        }

        if path.is_file() && self.is_supported(path) {
            return Ok(vec![self.load_file(path)?]);
        }

        Err(RagError::invalid_source(
            path,
            "path is neither a directory nor a supported file",
        ))
    }

    /// Recursively load every supported file under `dir`.
    ///
    /// Traversal order follows the platform's directory listing and is not stable.
    #[inline]
    pub fn load_directory(&self, dir: &Path) -> Result<DirectoryLoad> {
        if !dir.is_dir() {
            return Err(RagError::invalid_source(dir, "not a directory"));
        }

        let mut result = DirectoryLoad::default();

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let failed_path = e.path().unwrap_or(dir).to_path_buf();
                    let reason = e.to_string();
                    result
                        .failures
                        .push((failed_path.clone(), RagError::invalid_source(failed_path, reason)));
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.is_supported(entry.path()) {
                continue;
            }

            match self.load_file(entry.path()) {
                Ok(document) => result.documents.push(document),
                Err(e) => result.failures.push((entry.path().to_path_buf(), e)),
            }
        }

        info!(
            "Loaded {} documents from {} ({} failed)",
            result.documents.len(),
            dir.display(),
            result.failures.len()
        );

        Ok(result)
    }

    /// Load one file, choosing the reader from its extension
    #[inline]
    pub fn load_file(&self, path: &Path) -> Result<Document> {
        let format = DocumentFormat::from_path(path)
            .ok_or_else(|| RagError::invalid_source(path, "unsupported file extension"))?;

        let bytes = fs::read(path)
            .map_err(|e| RagError::invalid_source(path, format!("failed to read file: {}", e)))?;

        let document = self.load_bytes(&bytes, format, Some(path.to_path_buf()))?;
        debug!(
            "Loaded {} ({} characters)",
            path.display(),
            document.text.chars().count()
        );
        Ok(document)
    }

    /// Turn in-memory file content into a document
    #[inline]
    pub fn load_bytes(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
        source: Option<PathBuf>,
    ) -> Result<Document> {
        let display_source = || source.clone().unwrap_or_else(|| PathBuf::from("<upload>"));

        let text = match format {
            DocumentFormat::Text => self.decode_text(bytes).map_err(|reason| {
                RagError::invalid_source(display_source(), reason)
            })?,
            DocumentFormat::Pdf => pdf::extract_text(bytes)
                .map_err(|reason| RagError::invalid_source(display_source(), reason))?,
        };

        Ok(Document::new(text, source))
    }

    /// Async wrapper around [`Self::load`] that keeps file and PDF parsing off the runtime threads
    #[inline]
    pub async fn load_async(&self, path: PathBuf) -> Result<Vec<Document>> {
        let loader = self.clone();
        tokio::task::spawn_blocking(move || loader.load(&path))
            .await
            .map_err(|e| RagError::Other(anyhow::anyhow!("Loader task failed: {}", e)))?
    }

    fn decode_text(&self, bytes: &[u8]) -> std::result::Result<String, String> {
        if self.encoding_lossy {
            return Ok(String::from_utf8_lossy(bytes).into_owned());
        }
        String::from_utf8(bytes.to_vec()).map_err(|e| format!("file is not valid UTF-8: {}", e))
    }
}
