// Retrieval pipeline
// Load -> chunk -> embed -> store on ingest; embed -> search -> join on query


use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chunking::{CharacterTextSplitter, Chunk};
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::loader::{Document, DocumentFormat, DocumentLoader};
use crate::store::build::{self, BuildOptions, BuildReport, ChunkFailure};
use crate::store::{ChunkMetadata, SearchHit, SimilarityMeasure, VectorStore};
use crate::{RagError, Result};

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_CONTEXT_SEPARATOR: &str = "\n\n";

/// Vector store handle shared between one writer (ingest) and many readers (queries)
pub type SharedStore = Arc<RwLock<VectorStore>>;

/// Query-side settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved when the caller doesn't ask for a specific count
    pub top_k: usize,
    /// Joins retrieved chunks into a grounding context
    pub context_separator: String,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            context_separator: DEFAULT_CONTEXT_SEPARATOR.to_string(),
        }
    }
}

/// Outcome of one ingest call
#[derive(Debug, Default)]
pub struct IngestResult {
    pub documents_loaded: usize,
    pub chunks_created: usize,
    /// Distinct chunk texts written to the store
    pub chunks_inserted: usize,
    pub failed: Vec<ChunkFailure>,
    pub cancelled: bool,
    /// Sources that could not be loaded; the remaining sources were still ingested
    pub source_failures: Vec<(PathBuf, RagError)>,
}

impl IngestResult {
    fn from_report(documents_loaded: usize, chunks_created: usize, report: BuildReport) -> Self {
        Self {
            documents_loaded,
            chunks_created,
            chunks_inserted: report.inserted,
            failed: report.failed,
            cancelled: report.cancelled,
            source_failures: Vec::new(),
        }
    }
}

/// Snapshot of what the store currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub document_loaded: bool,
    pub chunks_count: usize,
    pub dimension: Option<usize>,
}

/// Ties the loader, splitter, embedder and store together.
///
/// Ingest embeds without holding the store lock and takes the write lock for
/// one insert at a time, so queries interleave with a running ingest and see
/// a growing but always consistent store.
pub struct RetrievalPipeline {
    loader: DocumentLoader,
    splitter: CharacterTextSplitter,
    retrieval: RetrievalConfig,
    max_in_flight: usize,
    embedder: Arc<dyn EmbeddingProvider>,
    store: SharedStore,
}

impl std::fmt::Debug for RetrievalPipeline {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("splitter", &self.splitter)
            .field("retrieval", &self.retrieval)
            .field("max_in_flight", &self.max_in_flight)
            .field("model", &self.embedder.model_name())
            .finish_non_exhaustive()
    }
}

impl RetrievalPipeline {
    #[inline]
    pub fn new(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let splitter = CharacterTextSplitter::from_config(&config.chunking)?;
        if config.retrieval.top_k == 0 {
            return Err(RagError::InvalidConfiguration(
                "top_k must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            loader: DocumentLoader::from_config(&config.loader),
            splitter,
            retrieval: config.retrieval.clone(),
            max_in_flight: config.embeddings.max_in_flight.max(1),
            embedder,
            store: SharedStore::default(),
        })
    }

    /// Use an existing store handle instead of a fresh one
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = store;
        self
    }

    #[inline]
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    #[inline]
    pub const fn splitter(&self) -> &CharacterTextSplitter {
        &self.splitter
    }

    #[inline]
    pub const fn top_k(&self) -> usize {
        self.retrieval.top_k
    }

    /// Load, chunk and embed every source into the store.
    ///
    /// A source that fails to load is recorded in the result and the others
    /// are still ingested. Fails only when no source could be loaded.
    #[inline]
    pub async fn ingest(&self, sources: &[PathBuf]) -> Result<IngestResult> {
        self.ingest_inner(sources, None).await
    }

    /// Like [`Self::ingest`], stopping new embedding calls once `cancel` fires
    #[inline]
    pub async fn ingest_with_cancel(
        &self,
        sources: &[PathBuf],
        cancel: CancellationToken,
    ) -> Result<IngestResult> {
        self.ingest_inner(sources, Some(cancel)).await
    }

    async fn ingest_inner(
        &self,
        sources: &[PathBuf],
        cancel: Option<CancellationToken>,
    ) -> Result<IngestResult> {
        let mut documents = Vec::new();
        let mut source_failures = Vec::new();
        let mut loaded_sources = 0;
        for source in sources {
            match self.loader.load_async(source.clone()).await {
                Ok(loaded) => {
                    loaded_sources += 1;
                    documents.extend(loaded);
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", source.display(), e);
                    source_failures.push((source.clone(), e));
                }
            }
        }
        debug!(
            "Loaded {} documents from {} of {} sources",
            documents.len(),
            loaded_sources,
            sources.len()
        );

        if loaded_sources == 0 && !source_failures.is_empty() {
            let (_, error) = source_failures.swap_remove(0);
            return Err(error);
        }

        let mut result = self.ingest_chunked(&documents, cancel).await;
        result.source_failures = source_failures;
        Ok(result)
    }

    /// Chunk and embed already-loaded documents into the store
    #[inline]
    pub async fn ingest_documents(&self, documents: &[Document]) -> IngestResult {
        self.ingest_chunked(documents, None).await
    }

    /// Ingest one in-memory upload alongside whatever the store already holds
    #[inline]
    pub async fn ingest_bytes(
        &self,
        bytes: Vec<u8>,
        format: DocumentFormat,
        name: Option<PathBuf>,
    ) -> Result<IngestResult> {
        let document = self.parse_upload(bytes, format, name).await?;
        Ok(self.ingest_chunked(&[document], None).await)
    }

    /// Replace the store's contents with a single upload.
    ///
    /// The new store is built on the side and swapped in under the write lock,
    /// so readers see either the previous document or the new one. When no
    /// chunk of the upload could be embedded the previous contents are kept
    /// and a provider error is returned.
    #[inline]
    pub async fn replace_with_bytes(
        &self,
        bytes: Vec<u8>,
        format: DocumentFormat,
        name: Option<PathBuf>,
    ) -> Result<IngestResult> {
        let document = self.parse_upload(bytes, format, name).await?;
        let chunks = self.splitter.split_documents(std::slice::from_ref(&document));

        let mut fresh = VectorStore::new();
        let report = fresh
            .build_from_chunks(&chunks, self.embedder.as_ref(), &self.build_options(None))
            .await;

        if report.inserted == 0 && !chunks.is_empty() {
            warn!(
                "No chunk of the upload could be embedded ({} failed), keeping previous contents",
                report.failed.len()
            );
            let reason = report
                .failed
                .into_iter()
                .next()
                .map_or_else(|| "embedding was cancelled".to_string(), |f| f.error.to_string());
            return Err(RagError::Provider(format!(
                "no chunk of the upload could be embedded: {}",
                reason
            )));
        }

        *self.store.write().await = fresh;
        info!(
            "Replaced store contents: {} chunks, {} inserted",
            chunks.len(),
            report.inserted
        );

        Ok(IngestResult::from_report(1, chunks.len(), report))
    }

    async fn parse_upload(
        &self,
        bytes: Vec<u8>,
        format: DocumentFormat,
        name: Option<PathBuf>,
    ) -> Result<Document> {
        let loader = self.loader.clone();
        tokio::task::spawn_blocking(move || loader.load_bytes(&bytes, format, name))
            .await
            .map_err(|e| RagError::Other(anyhow::anyhow!("Upload parsing task failed: {}", e)))?
    }

    async fn ingest_chunked(
        &self,
        documents: &[Document],
        cancel: Option<CancellationToken>,
    ) -> IngestResult {
        let chunks = self.splitter.split_documents(documents);
        let report = self.insert_chunks(&chunks, cancel).await;
        let result = IngestResult::from_report(documents.len(), chunks.len(), report);

        info!(
            "Ingested {} documents: {} chunks, {} inserted, {} failed{}",
            result.documents_loaded,
            result.chunks_created,
            result.chunks_inserted,
            result.failed.len(),
            if result.cancelled { " (cancelled)" } else { "" }
        );
        result
    }

    async fn insert_chunks(&self, chunks: &[Chunk], cancel: Option<CancellationToken>) -> BuildReport {
        let pending = build::dedupe(
            chunks
                .iter()
                .map(|chunk| (chunk.text.clone(), Some(ChunkMetadata::from(chunk)))),
        );
        let options = self.build_options(cancel);
        let store = &self.store;

        build::drain(&pending, self.embedder.as_ref(), &options, |record, vector| async move {
            store.write().await.insert_pending(record, vector)
        })
        .await
    }

    fn build_options(&self, cancel: Option<CancellationToken>) -> BuildOptions {
        let options = BuildOptions::default().with_max_in_flight(self.max_in_flight);
        match cancel {
            Some(token) => options.with_cancel(token),
            None => options,
        }
    }

    /// The `k` chunk texts most similar to `query`, best first
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .retrieve_scored(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.key)
            .collect())
    }

    /// The `k` chunks most similar to `query` with their cosine scores
    #[inline]
    pub async fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.store.read().await.is_empty() {
            return Ok(Vec::new());
        }

        // No lock is held while the provider call is in flight
        let vector = self.embedder.embed(query).await?;
        let hits = self
            .store
            .read()
            .await
            .search(&vector, k, SimilarityMeasure::Cosine)?;

        debug!("Retrieved {} chunks for query", hits.len());
        Ok(hits)
    }

    /// Retrieved chunks joined into a grounding context, or `None` when nothing matched
    #[inline]
    pub async fn build_context(&self, query: &str, k: usize) -> Result<Option<String>> {
        let chunks = self.retrieve(query, k).await?;
        if chunks.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunks.join(&self.retrieval.context_separator)))
    }

    #[inline]
    pub async fn status(&self) -> PipelineStatus {
        let store = self.store.read().await;
        PipelineStatus {
            document_loaded: !store.is_empty(),
            chunks_count: store.len(),
            dimension: store.dimension(),
        }
    }

    #[inline]
    pub async fn clear(&self) {
        self.store.write().await.clear();
        info!("Cleared vector store");
    }
}
