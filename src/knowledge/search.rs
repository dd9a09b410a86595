//! Cosine similarity, bounded top-K selection and MMR re-ranking

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::Serialize;

use super::filter::ChunkFilter;
use super::store::IndexSnapshot;

/// Position in the index with its similarity to the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredIndex {
    pub index: usize,
    pub score: f32,
}

/// Tuning for one vector search
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub top_k: usize,

    /// Minimum similarity to qualify
    pub threshold: f32,

    /// MMR trade-off, `None` keeps plain similarity order
    pub mmr_lambda: Option<f64>,

    /// MMR candidate pool as a multiple of `top_k`
    pub mmr_pool_factor: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.35,
            mmr_lambda: None,
            mmr_pool_factor: 4,
        }
    }
}

/// Compute cosine similarity between two vectors
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    #[allow(clippy::cast_possible_truncation)]
    let sim = (dot / denom) as f32;
    sim
}

/// Heap entry ordered so the heap top is the weakest kept candidate:
/// lowest score, and among equal scores the one seen last
#[derive(Debug, Clone, Copy)]
struct Weakest(ScoredIndex);

impl PartialEq for Weakest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Weakest {}

impl PartialOrd for Weakest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Weakest {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .score
            .total_cmp(&self.0.score)
            .then(self.0.index.cmp(&other.0.index))
    }
}

/// The `k` candidates most similar to `query` with score ≥ `threshold`
///
/// Keeps a min-heap of size `k`; a new candidate replaces the weakest only
/// when strictly better, so ties keep first-seen order. Results are sorted by
/// score descending, then index ascending.
#[must_use]
pub fn top_k(
    query: &[f32],
    vectors: &[Vec<f32>],
    candidates: impl IntoIterator<Item = usize>,
    k: usize,
    threshold: f32,
) -> Vec<ScoredIndex> {
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Weakest> = BinaryHeap::with_capacity(k + 1);
    for index in candidates {
        let Some(vector) = vectors.get(index) else {
            continue;
        };
        let score = cosine_similarity(query, vector);
        if score < threshold || score.is_nan() {
            continue;
        }

        if heap.len() < k {
            heap.push(Weakest(ScoredIndex { index, score }));
        } else if heap.peek().is_some_and(|weakest| score > weakest.0.score) {
            heap.pop();
            heap.push(Weakest(ScoredIndex { index, score }));
        }
    }

    let mut results: Vec<ScoredIndex> = heap.into_iter().map(|w| w.0).collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
    results
}

/// Apply Maximal Marginal Relevance re-ranking to scored candidates
///
/// Iteratively selects candidates that balance relevance (score) with
/// diversity (dissimilarity to already-selected items). Lambda controls the
/// trade-off: higher lambda favors relevance, lower lambda favors diversity.
#[must_use]
pub fn mmr_rerank(
    candidates: Vec<ScoredIndex>,
    vectors: &[Vec<f32>],
    limit: usize,
    lambda: f64,
) -> Vec<ScoredIndex> {
    if candidates.is_empty() || limit == 0 {
        return Vec::new();
    }

    let max_score = candidates
        .iter()
        .map(|c| f64::from(c.score))
        .fold(f64::NEG_INFINITY, f64::max);
    let min_score = candidates
        .iter()
        .map(|c| f64::from(c.score))
        .fold(f64::INFINITY, f64::min);
    let score_range = max_score - min_score;

    let mut remaining = candidates;
    let mut selected: Vec<ScoredIndex> = Vec::with_capacity(limit);

    while selected.len() < limit && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_mmr = f64::NEG_INFINITY;

        for (i, candidate) in remaining.iter().enumerate() {
            let relevance = if score_range > f64::EPSILON {
                (f64::from(candidate.score) - min_score) / score_range
            } else {
                1.0
            };

            // Max similarity to any already-selected item
            let max_sim = vectors.get(candidate.index).map_or(0.0, |emb| {
                selected
                    .iter()
                    .filter_map(|s| vectors.get(s.index))
                    .map(|sel| f64::from(cosine_similarity(emb, sel)))
                    .fold(0.0_f64, f64::max)
            });

            let mmr_score = lambda.mul_add(relevance, -(1.0 - lambda) * max_sim);
            if mmr_score > best_mmr {
                best_mmr = mmr_score;
                best_idx = i;
            }
        }

        selected.push(remaining.remove(best_idx));
    }

    selected
}

impl IndexSnapshot {
    /// Chunks most similar to the query vector that pass the filter
    #[must_use]
    pub fn search(&self, query: &[f32], filter: &ChunkFilter, params: &SearchParams) -> Vec<ScoredIndex> {
        let aligned = self.len();
        let candidates = (0..aligned).filter(|&i| filter.accepts(&self.chunks[i]));

        match params.mmr_lambda {
            Some(lambda) => {
                let pool = params.top_k.saturating_mul(params.mmr_pool_factor.max(1));
                let pooled = top_k(query, &self.vectors, candidates, pool, params.threshold);
                mmr_rerank(pooled, &self.vectors, params.top_k, lambda)
            }
            None => top_k(query, &self.vectors, candidates, params.top_k, params.threshold),
        }
    }
}
