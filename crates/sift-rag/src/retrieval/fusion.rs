//! Reciprocal Rank Fusion: score = Σ 1/(rank + k0)
//!
//! Merges the per-sub-query ranked lists into one candidate list without
//! normalizing scores across lists, so differing distance scales between
//! sub-queries cannot skew the merge. Ties resolve by best individual rank,
//! then by chunk id, making the output fully deterministic.

use std::collections::HashMap;

use super::engine::RetrievalHit;

/// A candidate after RRF fusion
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    /// ID of the fused chunk
    pub chunk_id: String,
    /// Fused RRF score (higher is more relevant)
    pub fused_score: f64,
    /// (sub-query index, rank) for every list the chunk appeared in,
    /// in sub-query order
    pub contributing_ranks: Vec<(usize, usize)>,
}

impl FusedCandidate {
    /// Best (lowest) rank across contributing lists
    pub fn best_rank(&self) -> usize {
        self.contributing_ranks
            .iter()
            .map(|&(_, rank)| rank)
            .min()
            .unwrap_or(usize::MAX)
    }
}

/// Fuse ranked hit lists with reciprocal rank fusion
///
/// `k0` is the smoothing constant (default 60): top-ranked items dominate
/// without any single list controlling the outcome. Lists a chunk does not
/// appear in contribute nothing. Fusion is commutative over input lists.
pub fn fuse(lists: &[Vec<RetrievalHit>], k0: f64) -> Vec<FusedCandidate> {
    let mut merged: HashMap<String, FusedCandidate> = HashMap::new();

    for (list_index, list) in lists.iter().enumerate() {
        for hit in list {
            let entry = merged
                .entry(hit.chunk_id.clone())
                .or_insert_with(|| FusedCandidate {
                    chunk_id: hit.chunk_id.clone(),
                    fused_score: 0.0,
                    contributing_ranks: Vec::new(),
                });
            entry.fused_score += 1.0 / (hit.rank as f64 + k0);
            entry.contributing_ranks.push((list_index, hit.rank));
        }
    }

    let mut candidates: Vec<FusedCandidate> = merged.into_values().collect();
    candidates.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.best_rank().cmp(&b.best_rank()))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    candidates
}
