//! Optional fine-grained reranking of fused candidates

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

use crate::providers::RelevanceScorer;
use crate::types::Chunk;

use super::fusion::FusedCandidate;

/// Result of the rerank stage
#[derive(Debug)]
pub struct RerankOutcome {
    /// Final candidates, truncated to min(top_k, available)
    pub candidates: Vec<FusedCandidate>,
    /// Scorer outputs aligned with `candidates`, when reranking ran
    pub rerank_scores: Option<Vec<f32>>,
    /// True when the scorer was absent or failed and fused order was kept
    pub degraded: bool,
}

/// Rescales fused candidates with an external relevance scorer
///
/// Scorer availability is a capability resolved once at construction; a
/// missing or failing scorer falls back to fused order without raising.
pub struct Reranker {
    scorer: Option<Arc<dyn RelevanceScorer>>,
}

impl Reranker {
    /// Create a reranker; `scorer` is the optional collaborator
    pub fn new(scorer: Option<Arc<dyn RelevanceScorer>>) -> Self {
        Self { scorer }
    }

    /// Whether a scorer was wired in
    pub fn is_available(&self) -> bool {
        self.scorer.is_some()
    }

    /// Reorder and truncate the fused candidate pool
    ///
    /// `candidates` is the top-N fused pool (N ≥ top_k). Output is exactly
    /// `min(top_k, candidates.len())` entries.
    pub async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<FusedCandidate>,
        chunks: &HashMap<String, Chunk>,
        top_k: usize,
    ) -> RerankOutcome {
        let Some(scorer) = &self.scorer else {
            candidates.truncate(top_k);
            return RerankOutcome {
                candidates,
                rerank_scores: None,
                degraded: true,
            };
        };

        let scoring = candidates.iter().map(|candidate| {
            let scorer = Arc::clone(scorer);
            let text = chunks
                .get(&candidate.chunk_id)
                .map(|c| c.text.clone())
                .unwrap_or_default();
            let query = query.to_string();
            async move { scorer.score(&query, &text).await }
        });

        let results = join_all(scoring).await;
        let mut scores = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(score) => scores.push(score),
                Err(e) => {
                    tracing::warn!("Relevance scorer failed, keeping fused order: {}", e);
                    candidates.truncate(top_k);
                    return RerankOutcome {
                        candidates,
                        rerank_scores: None,
                        degraded: true,
                    };
                }
            }
        }

        let mut indexed: Vec<(usize, FusedCandidate)> = candidates.into_iter().enumerate().collect();
        // Stable sort keeps fused order for equal scores.
        indexed.sort_by(|(ia, _), (ib, _)| {
            scores[*ib]
                .partial_cmp(&scores[*ia])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut reordered = Vec::with_capacity(indexed.len());
        let mut reordered_scores = Vec::with_capacity(indexed.len());
        for (original_index, candidate) in indexed {
            reordered.push(candidate);
            reordered_scores.push(scores[original_index]);
        }
        reordered.truncate(top_k);
        reordered_scores.truncate(top_k);

        RerankOutcome {
            candidates: reordered,
            rerank_scores: Some(reordered_scores),
            degraded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;

    fn candidate(id: &str, score: f64) -> FusedCandidate {
        FusedCandidate {
            chunk_id: id.to_string(),
            fused_score: score,
            contributing_ranks: vec![(0, 1)],
        }
    }

    fn chunk_map(entries: &[(&str, &str)]) -> HashMap<String, Chunk> {
        entries
            .iter()
            .map(|(id, text)| {
                (
                    id.to_string(),
                    Chunk::with_id(*id, *text, "doc.md", 0, vec![1.0]),
                )
            })
            .collect()
    }

    /// Scores by text length
    struct LengthScorer;

    #[async_trait]
    impl RelevanceScorer for LengthScorer {
        async fn score(&self, _query: &str, chunk_text: &str) -> Result<f32> {
            Ok(chunk_text.len() as f32)
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    /// Always fails
    struct BrokenScorer;

    #[async_trait]
    impl RelevanceScorer for BrokenScorer {
        async fn score(&self, _query: &str, _chunk_text: &str) -> Result<f32> {
            Err(Error::store("scorer offline"))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_missing_scorer_keeps_fused_order() {
        let reranker = Reranker::new(None);
        let candidates = vec![candidate("a", 0.9), candidate("b", 0.8), candidate("c", 0.7)];
        let outcome = reranker
            .rerank("q", candidates, &chunk_map(&[]), 2)
            .await;

        assert!(outcome.degraded);
        assert!(outcome.rerank_scores.is_none());
        let ids: Vec<&str> = outcome.candidates.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_scorer_reorders_candidates() {
        let reranker = Reranker::new(Some(Arc::new(LengthScorer)));
        let candidates = vec![candidate("a", 0.9), candidate("b", 0.8)];
        let chunks = chunk_map(&[("a", "short"), ("b", "a much longer chunk of text")]);
        let outcome = reranker.rerank("q", candidates, &chunks, 2).await;

        assert!(!outcome.degraded);
        let ids: Vec<&str> = outcome.candidates.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        let scores = outcome.rerank_scores.unwrap();
        assert!(scores[0] > scores[1]);
    }

    #[tokio::test]
    async fn test_failing_scorer_degrades_to_fused_order() {
        let reranker = Reranker::new(Some(Arc::new(BrokenScorer)));
        let candidates = vec![candidate("a", 0.9), candidate("b", 0.8), candidate("c", 0.7)];
        let chunks = chunk_map(&[("a", "x"), ("b", "y"), ("c", "z")]);
        let outcome = reranker.rerank("q", candidates, &chunks, 2).await;

        assert!(outcome.degraded);
        let ids: Vec<&str> = outcome.candidates.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_output_bounded_by_available() {
        let reranker = Reranker::new(None);
        let outcome = reranker
            .rerank("q", vec![candidate("a", 0.5)], &chunk_map(&[]), 5)
            .await;
        assert_eq!(outcome.candidates.len(), 1);
    }
}
