//! Pipeline orchestrator
//!
//! Runs one query through the fixed stage order
//! Received → Rewritten → Retrieved → Fused → Reranked → ContextBuilt →
//! Generated → Scored → Done. Every collaborator is injected at
//! construction; optional capabilities (relevance scorer, answer cache)
//! are resolved once here, not per call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::confidence::{ConfidenceInputs, ConfidenceScorer};
use crate::context::{ContextBlock, ContextRepacker};
use crate::error::{Error, Result};
use crate::generation::{GenerationCache, PromptBuilder};
use crate::learning::AnswerCache;
use crate::providers::{
    EmbeddingProvider, GenerationOptions, OllamaEmbedder, OllamaGenerator, RelevanceScorer,
};
use crate::retrieval::{fuse, RetrievalEngine, Reranker, RetrievedSet};
use crate::rewrite::QueryRewriter;
use crate::storage::VectorStore;
use crate::types::{PipelineStage, Query, QueryResponse, StageTrace};

/// Sequences the query pipeline and returns the final response
pub struct QueryOrchestrator {
    store: Arc<VectorStore>,
    rewriter: QueryRewriter,
    engine: RetrievalEngine,
    reranker: Reranker,
    repacker: ContextRepacker,
    generation: GenerationCache,
    confidence: ConfidenceScorer,
    answer_cache: Option<AnswerCache>,
    config: RagConfig,
}

impl QueryOrchestrator {
    /// Wire an orchestrator from injected collaborators
    pub fn new(
        config: RagConfig,
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generation: GenerationCache,
        scorer: Option<Arc<dyn RelevanceScorer>>,
    ) -> Self {
        let reranker = Reranker::new(scorer);
        tracing::info!(
            "Orchestrator ready (embedder: {}, reranker: {})",
            embedder.name(),
            if reranker.is_available() { "enabled" } else { "fused order" },
        );

        let answer_cache = config
            .cache
            .enabled
            .then(|| AnswerCache::new(config.cache.max_entries, config.cache.ttl_seconds));

        Self {
            engine: RetrievalEngine::new(
                Arc::clone(&store),
                embedder,
                config.retrieval.fan_out_multiplier,
            ),
            repacker: ContextRepacker::new(
                config.context.budget_chars,
                config.context.overlap_threshold,
            ),
            confidence: ConfidenceScorer::new(config.retrieval.rrf_k0),
            rewriter: QueryRewriter::new(),
            store,
            reranker,
            generation,
            answer_cache,
            config,
        }
    }

    /// Wire an orchestrator against a local Ollama server from configuration
    pub fn from_config(config: RagConfig, embedding_dimensions: usize) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(VectorStore::open(&config.store)?);
        let embedder = Arc::new(OllamaEmbedder::new(&config.llm, embedding_dimensions));
        let llm_config = config.llm.clone();
        let generation = GenerationCache::new(
            move || Ok(Arc::new(OllamaGenerator::new(&llm_config)) as _),
            config.llm.max_retries,
        );
        Ok(Self::new(config, store, embedder, generation, None))
    }

    /// The store backing this orchestrator
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Release the generation backend handle
    pub async fn shutdown(&self) {
        self.generation.shutdown().await;
    }

    /// Answer a query with default options
    pub async fn ask(&self, text: &str) -> Result<QueryResponse> {
        self.query(Query::new(text)).await
    }

    /// Run one query through the pipeline
    ///
    /// Callers always receive either a structured response or a single
    /// typed error; a generation failure (after its bounded retry) is the
    /// only error a valid query can surface once the pipeline has started.
    pub async fn query(&self, query: Query) -> Result<QueryResponse> {
        if query.text.trim().is_empty() {
            return Err(Error::validation("query text is empty"));
        }
        if query.top_k == 0 {
            return Err(Error::validation("top_k must be > 0"));
        }

        let mut trace = query.verbose.then(Vec::new);
        record(
            &mut trace,
            PipelineStage::Received,
            format!("query \"{}\" (top_k {})", query.text.trim(), query.top_k),
        );

        let normalized = self.rewriter.normalize(&query.text);
        if let Some(cache) = &self.answer_cache {
            if let Some(cached) = cache.get(&normalized, query.top_k, self.store.generation()) {
                tracing::info!("Answer cache hit for \"{}\"", normalized);
                return Ok(cached);
            }
        }

        // Rewritten
        let subqueries = self
            .rewriter
            .expand(&query.text, self.config.retrieval.max_subqueries);
        record(
            &mut trace,
            PipelineStage::Rewritten,
            format!("{} sub-queries", subqueries.len()),
        );

        if !self.store.exists()? {
            tracing::info!("Store is empty, returning no-information response");
            return Ok(self.empty_response(trace, "store empty"));
        }

        // Retrieved
        let retrieved = match self.config.timeouts.retrieval_ms {
            Some(ms) => {
                match tokio::time::timeout(
                    Duration::from_millis(ms),
                    self.engine.retrieve(&subqueries, query.top_k),
                )
                .await
                {
                    Ok(set) => set,
                    Err(_) => {
                        tracing::warn!("Retrieval timed out after {}ms", ms);
                        RetrievedSet::default()
                    }
                }
            }
            None => self.engine.retrieve(&subqueries, query.top_k).await,
        };
        record(
            &mut trace,
            PipelineStage::Retrieved,
            format!(
                "{} hits across {} lists",
                retrieved.total_hits(),
                retrieved.lists.len()
            ),
        );

        if retrieved.is_empty() {
            tracing::info!("No hits for any sub-query");
            return Ok(self.empty_response(trace, "no hits"));
        }

        // Fused
        let fused = fuse(&retrieved.lists, self.config.retrieval.rrf_k0);
        record(
            &mut trace,
            PipelineStage::Fused,
            format!("{} candidates", fused.len()),
        );

        let fused_scores: HashMap<String, f64> = fused
            .iter()
            .map(|c| (c.chunk_id.clone(), c.fused_score))
            .collect();

        // Reranked
        let pool_size = query.top_k.max(self.config.retrieval.rerank_pool);
        let mut pool = fused;
        pool.truncate(pool_size);
        let outcome = self
            .reranker
            .rerank(&normalized, pool, &retrieved.chunks, query.top_k)
            .await;
        record(
            &mut trace,
            PipelineStage::Reranked,
            format!(
                "{} candidates ({})",
                outcome.candidates.len(),
                if outcome.degraded { "fused order" } else { "reranked" },
            ),
        );

        // ContextBuilt
        let ordered_chunks: Vec<_> = outcome
            .candidates
            .iter()
            .filter_map(|c| retrieved.chunks.get(&c.chunk_id))
            .collect();
        let block = self.repacker.repack(ordered_chunks.iter().copied());
        record(
            &mut trace,
            PipelineStage::ContextBuilt,
            format!("{} chunks, {} chars", block.entries.len(), block.total_chars),
        );

        if block.is_empty() {
            return Ok(self.empty_response(trace, "empty context"));
        }

        // Generated: the one stage whose failure terminates the pipeline.
        let answer = self.generate(&normalized, &block).await?;
        record(
            &mut trace,
            PipelineStage::Generated,
            format!("{} chars", answer.len()),
        );

        // Scored
        let admitted_scores: Vec<f64> = block
            .entries
            .iter()
            .filter_map(|e| fused_scores.get(&e.chunk_id).copied())
            .collect();
        let context_text = block
            .entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let confidence = self.confidence.score(&ConfidenceInputs {
            fused_scores: &admitted_scores,
            num_lists: subqueries.len(),
            answer: Some(&answer),
            context_text: Some(&context_text),
        });
        record(
            &mut trace,
            PipelineStage::Scored,
            format!("confidence {:.1}", confidence),
        );
        record(&mut trace, PipelineStage::Done, "complete");

        let response = QueryResponse {
            answer,
            confidence,
            sources: block.sources(),
            degraded: outcome.degraded,
            trace,
        };

        if let Some(cache) = &self.answer_cache {
            cache.put(
                &normalized,
                query.top_k,
                response.clone(),
                self.store.generation(),
            );
        }

        tracing::info!(
            "Query complete: {} sources, confidence {:.1}",
            response.sources.len(),
            response.confidence
        );
        Ok(response)
    }

    async fn generate(&self, question: &str, block: &ContextBlock) -> Result<String> {
        let prompt = PromptBuilder::build_rag_prompt(question, block);
        let options = GenerationOptions {
            temperature: self.config.llm.temperature,
        };

        match self.config.timeouts.generation_ms {
            Some(ms) => tokio::time::timeout(
                Duration::from_millis(ms),
                self.generation.generate(&prompt, &options),
            )
            .await
            .map_err(|_| Error::generation(format!("generation timed out after {}ms", ms)))?,
            None => self.generation.generate(&prompt, &options).await,
        }
    }

    fn empty_response(&self, mut trace: Option<Vec<StageTrace>>, reason: &str) -> QueryResponse {
        record(&mut trace, PipelineStage::Done, format!("no result: {}", reason));
        QueryResponse::no_information(trace)
    }
}

fn record(trace: &mut Option<Vec<StageTrace>>, stage: PipelineStage, detail: impl Into<String>) {
    if let Some(snapshots) = trace {
        snapshots.push(StageTrace::new(stage, detail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DistanceMetric;
    use async_trait::async_trait;

    /// Embeds by keyword lookup against a fixed vocabulary
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            let mut embedding = vec![0.0; 3];
            if lower.contains("alpha") {
                embedding[0] = 1.0;
            }
            if lower.contains("beta") {
                embedding[1] = 1.0;
            }
            if lower.contains("gamma") {
                embedding[2] = 1.0;
            }
            Ok(embedding)
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    struct EchoBackend;

    #[async_trait]
    impl crate::providers::GenerationBackend for EchoBackend {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
            Ok("alpha concerns the first axis".to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn orchestrator(store: Arc<VectorStore>) -> QueryOrchestrator {
        QueryOrchestrator::new(
            RagConfig::default(),
            store,
            Arc::new(KeywordEmbedder),
            GenerationCache::with_backend(Arc::new(EchoBackend), 0),
            None,
        )
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let store = Arc::new(VectorStore::in_memory(DistanceMetric::Cosine).unwrap());
        let result = orchestrator(store).ask("   ").await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_zero_top_k_is_rejected() {
        let store = Arc::new(VectorStore::in_memory(DistanceMetric::Cosine).unwrap());
        let result = orchestrator(store)
            .query(Query::new("alpha").with_top_k(0))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_empty_store_short_circuits() {
        let store = Arc::new(VectorStore::in_memory(DistanceMetric::Cosine).unwrap());
        let response = orchestrator(store).ask("what is alpha").await.unwrap();

        assert_eq!(response.confidence, 0.0);
        assert!(response.sources.is_empty());
        assert!(response.degraded);
        assert!(response.answer.to_lowercase().contains("no information"));
    }
}
