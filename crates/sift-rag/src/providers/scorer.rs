//! Optional fine-grained relevance scorer trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for scoring a (query, chunk) pair with a finer signal than the
/// store's distance function
///
/// The scorer is an optional collaborator: when absent or failing, the
/// reranker falls back to fused order and the response is marked degraded.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Relevance of `chunk_text` to `query`; higher is more relevant
    async fn score(&self, query: &str, chunk_text: &str) -> Result<f32>;

    /// Scorer name for logging
    fn name(&self) -> &str;
}
