use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid source {}: {reason}", path.display())]
    InvalidSource { path: PathBuf, reason: String },

    #[error("Dimension mismatch: store holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    #[inline]
    pub fn invalid_source(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod loader;
pub mod pipeline;
pub mod store;

pub use chunking::{CharacterTextSplitter, Chunk};
pub use config::Config;
pub use embeddings::EmbeddingProvider;
pub use loader::{Document, DocumentFormat, DocumentLoader};
pub use pipeline::{IngestResult, PipelineStatus, RetrievalPipeline, SharedStore};
pub use store::{SearchHit, SimilarityMeasure, VectorStore};
