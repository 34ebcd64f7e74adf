//! sift-rag: grounded question answering over a vector-indexed document store
//!
//! This crate implements the query side of a RAG system: a natural-language
//! query is rewritten into sub-queries, each sub-query is embedded and
//! searched against the chunk store, the ranked lists are merged with
//! reciprocal rank fusion, optionally reranked, repacked into a budgeted
//! context, and answered by a cached generation backend with cited sources
//! and a bounded confidence score.
//!
//! Document ingestion, chunking, and the embedding/generation models
//! themselves are external collaborators reached through the traits in
//! [`providers`].

pub mod config;
pub mod confidence;
pub mod context;
pub mod error;
pub mod generation;
pub mod learning;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod rewrite;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::QueryOrchestrator;
pub use storage::{DistanceMetric, VectorStore};
pub use types::{Chunk, MetadataValue, Query, QueryResponse, SourceRef};
