use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// How two vectors are compared during search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMeasure {
    /// Normalized dot product in `[-1, 1]`, higher is closer
    #[default]
    Cosine,
    /// Raw dot product, higher is closer
    DotProduct,
    /// Straight-line distance, lower is closer
    Euclidean,
}

impl SimilarityMeasure {
    #[inline]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::DotProduct => dot_product(a, b),
            Self::Euclidean => euclidean_distance(a, b),
        }
    }

    #[inline]
    pub const fn higher_is_better(self) -> bool {
        !matches!(self, Self::Euclidean)
    }

    /// Order two scores so that the better one sorts first
    #[inline]
    pub fn rank(self, a: f32, b: f32) -> Ordering {
        let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        if self.higher_is_better() {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).fold(0.0, |acc, (x, y)| x.mul_add(*y, acc))
}

#[inline]
pub fn norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Cosine similarity, defined as 0 when either vector has zero norm
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product(a, b) / (norm_a * norm_b)
}

#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .fold(0.0_f32, |acc, (x, y)| {
            let d = x - y;
            d.mul_add(d, acc)
        })
        .sqrt()
}
