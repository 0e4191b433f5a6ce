use super::VectorRecord;
use super::similarity::SimilarityMeasure;

/// Finds the best-scoring records for a query.
///
/// Returns `(record position, score)` pairs, best first, at most `k` long.
/// Records with equal scores must keep their relative order in `records`.
pub trait SearchStrategy: Send + Sync {
    fn search(
        &self,
        records: &[VectorRecord],
        query: &[f32],
        k: usize,
        measure: SimilarityMeasure,
    ) -> Vec<(usize, f32)>;
}

/// Exact search that scores every record, O(n·D) per query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearScan;

impl SearchStrategy for LinearScan {
    #[inline]
    fn search(
        &self,
        records: &[VectorRecord],
        query: &[f32],
        k: usize,
        measure: SimilarityMeasure,
    ) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = records
            .iter()
            .enumerate()
            .map(|(position, record)| (position, measure.score(query, &record.vector)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| measure.rank(a.1, b.1));
        scored.truncate(k);
        scored
    }
}
