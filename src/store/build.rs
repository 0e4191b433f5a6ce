use std::collections::HashSet;
use std::future::Future;

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::ChunkMetadata;
use crate::embeddings::EmbeddingProvider;
use crate::{RagError, Result};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Controls for a concurrent store build
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum number of embedding calls awaiting a response at once
    pub max_in_flight: usize,
    /// Stops new embedding calls once cancelled; finished work is kept
    pub cancel: Option<CancellationToken>,
}

impl Default for BuildOptions {
    #[inline]
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            cancel: None,
        }
    }
}

impl BuildOptions {
    #[inline]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    #[inline]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// A chunk that could not be embedded or inserted
#[derive(Debug)]
pub struct ChunkFailure {
    /// Position of the chunk in the input batch
    pub index: usize,
    pub key: String,
    pub error: RagError,
}

/// Outcome of a store build
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Number of distinct keys written to the store
    pub inserted: usize,
    pub failed: Vec<ChunkFailure>,
    /// Whether cancellation stopped the build before every chunk was embedded
    pub cancelled: bool,
}

impl BuildReport {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// Account for one embedded-then-inserted record
    pub(crate) fn record(&mut self, pending: &PendingRecord, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.inserted += 1,
            Err(error) => {
                warn!("Failed to embed chunk {}: {}", pending.index, error);
                self.failed.push(ChunkFailure {
                    index: pending.index,
                    key: pending.key.clone(),
                    error,
                });
            }
        }
    }

    /// Close the report once the embedding stream is drained
    pub(crate) fn finish(&mut self, completed: usize, total: usize) {
        self.cancelled = completed < total;
        self.failed.sort_by_key(|failure| failure.index);

        if self.cancelled {
            warn!("Build cancelled after {} of {} chunks", completed, total);
        }
    }
}

/// A record waiting for its embedding
#[derive(Debug, Clone)]
pub(crate) struct PendingRecord {
    /// Position of the first occurrence of this key in the input batch
    pub index: usize,
    pub key: String,
    pub metadata: Option<ChunkMetadata>,
}

/// Keep the first occurrence of each key; identical texts share one embedding call
pub(crate) fn dedupe<I>(entries: I) -> Vec<PendingRecord>
where
    I: IntoIterator<Item = (String, Option<ChunkMetadata>)>,
{
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, (key, metadata))| {
            seen.insert(key.clone()).then_some(PendingRecord {
                index,
                key,
                metadata,
            })
        })
        .collect()
}

/// Embed pending records with at most `max_in_flight` calls outstanding.
///
/// Items arrive in completion order, tagged with their position in `pending`.
/// No new call is started after the cancellation token fires.
pub(crate) fn embedding_stream<'a>(
    pending: &'a [PendingRecord],
    embedder: &'a dyn EmbeddingProvider,
    options: &BuildOptions,
) -> impl Stream<Item = (usize, Result<Vec<f32>>)> + Send + 'a {
    let cancel = options.cancel.clone();

    stream::iter(pending.iter().enumerate())
        .take_while(move |_| {
            let cancelled = cancel
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled);
            futures::future::ready(!cancelled)
        })
        .map(move |(position, record)| async move {
            (position, embedder.embed(&record.key).await)
        })
        .buffer_unordered(options.max_in_flight.max(1))
}

/// Drive `embedding_stream` to completion, handing each vector to `insert`.
///
/// The report accounts for every record whose embedding or insert failed and
/// for records never started because the build was cancelled.
pub(crate) async fn drain<'a, F, Fut>(
    pending: &'a [PendingRecord],
    embedder: &'a dyn EmbeddingProvider,
    options: &BuildOptions,
    mut insert: F,
) -> BuildReport
where
    F: FnMut(&'a PendingRecord, Vec<f32>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut report = BuildReport::default();
    let mut completed = 0;
    let mut results = std::pin::pin!(embedding_stream(pending, embedder, options));

    while let Some((position, result)) = results.next().await {
        completed += 1;
        let record = &pending[position];
        let outcome = match result {
            Ok(vector) => insert(record, vector).await,
            Err(e) => Err(e),
        };
        report.record(record, outcome);
    }
    report.finish(completed, pending.len());

    report
}
