//! Collaborator abstractions for embeddings, generation, and relevance scoring
//!
//! Trait-based boundaries so the pipeline can be wired against Ollama or
//! any other backend by dependency injection.

pub mod embedding;
pub mod generation;
pub mod ollama;
pub mod scorer;

pub use embedding::EmbeddingProvider;
pub use generation::{GenerationBackend, GenerationOptions};
pub use ollama::{OllamaEmbedder, OllamaGenerator};
pub use scorer::RelevanceScorer;
