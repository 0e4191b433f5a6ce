// In-memory vector store
// Exact similarity search over chunk embeddings, no persistence


pub mod build;
pub mod similarity;
pub mod strategy;

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::chunking::Chunk;
use crate::embeddings::EmbeddingProvider;
use crate::{RagError, Result};

pub use build::{BuildOptions, BuildReport, ChunkFailure, DEFAULT_MAX_IN_FLIGHT};
pub use similarity::{SimilarityMeasure, cosine_similarity, dot_product, euclidean_distance};
pub use strategy::{LinearScan, SearchStrategy};

/// Where a stored chunk came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source: Option<PathBuf>,
    pub document_index: usize,
    pub chunk_index: usize,
}

impl From<&Chunk> for ChunkMetadata {
    #[inline]
    fn from(chunk: &Chunk) -> Self {
        Self {
            source: chunk.source.clone(),
            document_index: chunk.document_index,
            chunk_index: chunk.index,
        }
    }
}

/// A stored key and its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub key: String,
    pub vector: Vec<f32>,
    pub metadata: Option<ChunkMetadata>,
}

/// One search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: String,
    pub score: f32,
    pub metadata: Option<ChunkMetadata>,
}

/// Mapping from chunk text to embedding vector.
///
/// Keys are unique: inserting an existing key replaces its vector in place, so
/// the record keeps the position of its first insertion. All vectors share the
/// dimension of the first one inserted.
///
/// The store is not internally synchronized. Share it across tasks through
/// [`crate::pipeline::SharedStore`], which serializes writers behind a read-write lock.
#[derive(Debug, Clone)]
pub struct VectorStore<S = LinearScan> {
    records: Vec<VectorRecord>,
    positions: HashMap<String, usize>,
    dimension: Option<usize>,
    strategy: S,
}

impl Default for VectorStore<LinearScan> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl VectorStore<LinearScan> {
    #[inline]
    pub fn new() -> Self {
        Self::with_strategy(LinearScan)
    }
}

impl<S: SearchStrategy> VectorStore<S> {
    #[inline]
    pub fn with_strategy(strategy: S) -> Self {
        Self {
            records: Vec::new(),
            positions: HashMap::new(),
            dimension: None,
            strategy,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dimension shared by every stored vector, once the first one is inserted
    #[inline]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.record(key).map(|record| record.vector.as_slice())
    }

    #[inline]
    pub fn record(&self, key: &str) -> Option<&VectorRecord> {
        self.positions
            .get(key)
            .and_then(|&position| self.records.get(position))
    }

    /// Keys in first-insertion order
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.key.as_str())
    }

    #[inline]
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    /// Add a record, or replace the vector of an existing key
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, vector: Vec<f32>) -> Result<()> {
        self.upsert(key.into(), vector, None)
    }

    /// Like [`Self::insert`], also replacing the record's provenance
    #[inline]
    pub fn insert_with_metadata(
        &mut self,
        key: impl Into<String>,
        vector: Vec<f32>,
        metadata: ChunkMetadata,
    ) -> Result<()> {
        self.upsert(key.into(), vector, Some(metadata))
    }

    fn upsert(
        &mut self,
        key: String,
        vector: Vec<f32>,
        metadata: Option<ChunkMetadata>,
    ) -> Result<()> {
        self.check_dimension(vector.len())?;
        self.dimension = Some(vector.len());

        if let Some(&position) = self.positions.get(&key) {
            let record = &mut self.records[position];
            record.vector = vector;
            if metadata.is_some() {
                record.metadata = metadata;
            }
            return Ok(());
        }

        self.positions.insert(key.clone(), self.records.len());
        self.records.push(VectorRecord {
            key,
            vector,
            metadata,
        });
        Ok(())
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(RagError::DimensionMismatch { expected, actual })
            }
            None if actual == 0 => Err(RagError::DimensionMismatch {
                expected: 1,
                actual,
            }),
            _ => Ok(()),
        }
    }

    /// Remove a record, keeping the remaining records in insertion order
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<VectorRecord> {
        let position = self.positions.remove(key)?;
        let record = self.records.remove(position);

        for later in &self.records[position..] {
            if let Some(slot) = self.positions.get_mut(&later.key) {
                *slot -= 1;
            }
        }
        if self.records.is_empty() {
            self.dimension = None;
        }
        Some(record)
    }

    /// Drop every record and forget the established dimension
    #[inline]
    pub fn clear(&mut self) {
        self.records.clear();
        self.positions.clear();
        self.dimension = None;
    }

    /// The `k` records closest to `query`, best first.
    ///
    /// An empty store yields no results rather than an error.
    #[inline]
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        measure: SimilarityMeasure,
    ) -> Result<Vec<SearchHit>> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query.len())?;

        let hits: Vec<SearchHit> = self
            .strategy
            .search(&self.records, query, k, measure)
            .into_iter()
            .filter_map(|(position, score)| {
                self.records.get(position).map(|record| SearchHit {
                    key: record.key.clone(),
                    score,
                    metadata: record.metadata.clone(),
                })
            })
            .collect();

        debug!(
            "Search over {} records returned {} hits",
            self.records.len(),
            hits.len()
        );
        Ok(hits)
    }

    /// Embed `query_text` and return the `k` most similar chunks with their cosine scores
    #[inline]
    pub async fn search_by_text(
        &self,
        query_text: &str,
        k: usize,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<SearchHit>> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = embedder.embed(query_text).await?;
        self.search(&query, k, SimilarityMeasure::Cosine)
    }

    /// Embed `query_text` and return only the text of the `k` most similar chunks
    #[inline]
    pub async fn search_texts_by_text(
        &self,
        query_text: &str,
        k: usize,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<String>> {
        Ok(self
            .search_by_text(query_text, k, embedder)
            .await?
            .into_iter()
            .map(|hit| hit.key)
            .collect())
    }

    /// Embed every text concurrently and insert it under its own text as key
    #[inline]
    pub async fn build_from_texts<T: AsRef<str>>(
        &mut self,
        texts: &[T],
        embedder: &dyn EmbeddingProvider,
        options: &BuildOptions,
    ) -> BuildReport {
        let pending = build::dedupe(
            texts
                .iter()
                .map(|text| (text.as_ref().to_string(), None)),
        );
        self.build_pending(&pending, embedder, options).await
    }

    /// Like [`Self::build_from_texts`], recording each chunk's provenance
    #[inline]
    pub async fn build_from_chunks(
        &mut self,
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
        options: &BuildOptions,
    ) -> BuildReport {
        let pending = build::dedupe(
            chunks
                .iter()
                .map(|chunk| (chunk.text.clone(), Some(ChunkMetadata::from(chunk)))),
        );
        self.build_pending(&pending, embedder, options).await
    }

    async fn build_pending(
        &mut self,
        pending: &[build::PendingRecord],
        embedder: &dyn EmbeddingProvider,
        options: &BuildOptions,
    ) -> BuildReport {
        let report = build::drain(pending, embedder, options, |record, vector| {
            std::future::ready(self.insert_pending(record, vector))
        })
        .await;

        info!(
            "Built vector store: {} inserted, {} failed, {} total records",
            report.inserted,
            report.failed.len(),
            self.records.len()
        );

        report
    }

    pub(crate) fn insert_pending(
        &mut self,
        record: &build::PendingRecord,
        vector: Vec<f32>,
    ) -> Result<()> {
        self.upsert(record.key.clone(), vector, record.metadata.clone())
    }
}
