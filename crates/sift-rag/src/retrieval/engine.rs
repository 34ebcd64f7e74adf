//! Per-sub-query embedding and nearest-neighbor fan-out

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

use crate::providers::EmbeddingProvider;
use crate::storage::VectorStore;
use crate::types::{Chunk, SubQuery};

/// One search match within a sub-query's ranked list
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    /// ID of the matched chunk
    pub chunk_id: String,
    /// 1-based rank within this sub-query's list
    pub rank: usize,
    /// Distance under the store's metric
    pub distance: f32,
}

/// Fan-out result: one ranked hit list per sub-query, plus the chunks seen
#[derive(Debug, Default)]
pub struct RetrievedSet {
    /// Ranked hit lists, index-aligned with the input sub-queries
    pub lists: Vec<Vec<RetrievalHit>>,
    /// Every distinct chunk encountered, by ID
    pub chunks: HashMap<String, Chunk>,
}

impl RetrievedSet {
    /// True when no sub-query produced any hit
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(|l| l.is_empty())
    }

    /// Total hits across all sub-query lists
    pub fn total_hits(&self) -> usize {
        self.lists.iter().map(|l| l.len()).sum()
    }
}

/// Embeds sub-queries and searches the store with a fan-out wider than the
/// final top_k, to give fusion material to work with
pub struct RetrievalEngine {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    fan_out_multiplier: usize,
}

impl RetrievalEngine {
    /// Create an engine over a store and embedding collaborator
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        fan_out_multiplier: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            fan_out_multiplier: fan_out_multiplier.max(1),
        }
    }

    /// Fan-out k for a requested top_k
    pub fn fan_out(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.fan_out_multiplier).max(top_k)
    }

    /// Retrieve ranked hit lists for every sub-query concurrently
    ///
    /// Sub-queries are independent; each runs as its own task. An embedding
    /// or search failure degrades that sub-query to an empty list rather
    /// than aborting the query.
    pub async fn retrieve(&self, subqueries: &[SubQuery], top_k: usize) -> RetrievedSet {
        let fan_out = self.fan_out(top_k);

        let searches = subqueries.iter().map(|subquery| {
            let store = Arc::clone(&self.store);
            let embedder = Arc::clone(&self.embedder);
            let text = subquery.text.clone();
            async move {
                let embedding = match embedder.embed(&text).await {
                    Ok(embedding) => embedding,
                    Err(e) => {
                        tracing::warn!("Embedding failed for sub-query \"{}\": {}", text, e);
                        return Vec::new();
                    }
                };
                match store.search(&embedding, fan_out) {
                    Ok(hits) => hits,
                    Err(e) => {
                        tracing::warn!("Search failed for sub-query \"{}\": {}", text, e);
                        Vec::new()
                    }
                }
            }
        });

        let results = join_all(searches).await;

        let mut set = RetrievedSet::default();
        for hits in results {
            let ranked = hits
                .iter()
                .enumerate()
                .map(|(i, hit)| RetrievalHit {
                    chunk_id: hit.chunk.id.clone(),
                    rank: i + 1,
                    distance: hit.distance,
                })
                .collect();
            for hit in hits {
                set.chunks.entry(hit.chunk.id.clone()).or_insert(hit.chunk);
            }
            set.lists.push(ranked);
        }

        tracing::debug!(
            "Retrieved {} hits across {} sub-queries (fan-out {})",
            set.total_hits(),
            subqueries.len(),
            fan_out
        );
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::storage::DistanceMetric;
    use crate::types::{RewriteStrategy, SubQuery};
    use async_trait::async_trait;

    /// Maps known texts to fixed embeddings; unknown texts fail
    struct FixtureEmbedder {
        dims: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixtureEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut embedding = vec![0.0; self.dims];
            match text {
                "alpha" => embedding[0] = 1.0,
                "beta" => embedding[1] = 1.0,
                _ => return Err(Error::embedding("unknown text")),
            }
            Ok(embedding)
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        fn name(&self) -> &str {
            "fixture"
        }
    }

    fn seeded_store() -> Arc<VectorStore> {
        let store = VectorStore::in_memory(DistanceMetric::Cosine).unwrap();
        let mut a = vec![0.0; 3];
        a[0] = 1.0;
        let mut b = vec![0.0; 3];
        b[1] = 1.0;
        store
            .add(&[
                Chunk::with_id("a", "alpha text", "a.md", 0, a),
                Chunk::with_id("b", "beta text", "b.md", 0, b),
            ])
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_retrieve_preserves_rank_order() {
        let engine = RetrievalEngine::new(
            seeded_store(),
            Arc::new(FixtureEmbedder { dims: 3 }),
            3,
        );
        let subqueries = vec![SubQuery::new("alpha", RewriteStrategy::Original)];
        let set = engine.retrieve(&subqueries, 2).await;

        assert_eq!(set.lists.len(), 1);
        let list = &set.lists[0];
        assert_eq!(list[0].chunk_id, "a");
        assert_eq!(list[0].rank, 1);
        assert_eq!(list[1].rank, 2);
        assert!(list[0].distance <= list[1].distance);
        assert!(set.chunks.contains_key("a"));
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_subquery() {
        let engine = RetrievalEngine::new(
            seeded_store(),
            Arc::new(FixtureEmbedder { dims: 3 }),
            3,
        );
        let subqueries = vec![
            SubQuery::new("alpha", RewriteStrategy::Original),
            SubQuery::new("unmapped", RewriteStrategy::Keywords),
        ];
        let set = engine.retrieve(&subqueries, 2).await;

        assert_eq!(set.lists.len(), 2);
        assert!(!set.lists[0].is_empty());
        assert!(set.lists[1].is_empty());
        assert!(!set.is_empty());
    }

    #[test]
    fn test_fan_out_never_below_top_k() {
        let engine = RetrievalEngine::new(
            seeded_store(),
            Arc::new(FixtureEmbedder { dims: 3 }),
            1,
        );
        assert_eq!(engine.fan_out(5), 5);
    }
}
