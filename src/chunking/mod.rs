
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loader::Document;
use crate::{RagError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Configuration for character-window chunking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Width of each chunk window, in characters
    pub chunk_size: usize,
    /// Number of characters shared by adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A chunk of a document together with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text
    pub text: String,
    /// Index of this chunk within its source document
    pub index: usize,
    /// Position of the source document in the ingest batch
    pub document_index: usize,
    /// Path or upload name of the source document, if known
    pub source: Option<PathBuf>,
    /// Offset of the first character of the chunk within the document
    pub char_offset: usize,
}

/// Splits text into fixed-size, overlapping character windows.
///
/// Windows start at `0, step, 2 * step, ...` where `step = chunk_size - chunk_overlap`
/// and stop with the first window that reaches the end of the text. That final
/// window is truncated rather than padded. Sizes and offsets count
/// `char`s, so a chunk never splits a UTF-8 sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CharacterTextSplitter {
    /// Create a splitter, rejecting configurations where `chunk_size > chunk_overlap > 0`
    /// does not hold.
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_overlap == 0 {
            return Err(RagError::InvalidConfiguration(
                "chunk overlap must be greater than zero".to_string(),
            ));
        }
        if chunk_size <= chunk_overlap {
            return Err(RagError::InvalidConfiguration(format!(
                "chunk size ({}) must be greater than chunk overlap ({})",
                chunk_size, chunk_overlap
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    #[inline]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance between the starts of consecutive chunks
    #[inline]
    pub const fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Character ranges `(start, end)` of the chunks for a text of `len` characters
    #[inline]
    pub fn chunk_offsets(&self, len: usize) -> Vec<(usize, usize)> {
        let mut offsets = Vec::with_capacity(len / self.step() + 1);
        let mut start = 0;

        while start < len {
            let end = (start + self.chunk_size).min(len);
            offsets.push((start, end));
            // A later window would sit entirely inside this one's overlap
            if end == len {
                break;
            }
            start += self.step();
        }

        offsets
    }

    /// Split a single text into overlapping chunks
    #[inline]
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with_offsets(text)
            .into_iter()
            .map(|(_, chunk)| chunk)
            .collect()
    }

    /// Split each text in turn and concatenate the results in input order
    #[inline]
    pub fn split_many<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        let chunks: Vec<String> = texts
            .iter()
            .flat_map(|text| self.split(text.as_ref()))
            .collect();

        debug!("Split {} texts into {} chunks", texts.len(), chunks.len());
        chunks
    }

    /// Split documents while keeping track of which document each chunk came from
    #[inline]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for (document_index, document) in documents.iter().enumerate() {
            let pieces = self.split_with_offsets(&document.text);
            chunks.extend(
                pieces
                    .into_iter()
                    .enumerate()
                    .map(|(index, (char_offset, text))| Chunk {
                        text,
                        index,
                        document_index,
                        source: document.source.clone(),
                        char_offset,
                    }),
            );
        }

        debug!(
            "Split {} documents into {} chunks (size {}, overlap {})",
            documents.len(),
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        chunks
    }

    fn split_with_offsets(&self, text: &str) -> Vec<(usize, String)> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte position of every char boundary, including the end of the text
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        self.chunk_offsets(char_len)
            .into_iter()
            .filter_map(|(start, end)| {
                text.get(boundaries[start]..boundaries[end])
                    .map(|piece| (start, piece.to_string()))
            })
            .collect()
    }
}

impl Default for CharacterTextSplitter {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}
