//! Response types for pipeline queries

use serde::{Deserialize, Serialize};

/// Pipeline stages, in strict execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Rewritten,
    Retrieved,
    Fused,
    Reranked,
    ContextBuilt,
    Generated,
    Scored,
    Done,
}

/// Snapshot of one stage transition, captured when the query is verbose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTrace {
    /// Stage that completed
    pub stage: PipelineStage,
    /// Summary of the stage's inputs and outputs
    pub detail: String,
}

impl StageTrace {
    /// Create a trace snapshot
    pub fn new(stage: PipelineStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
        }
    }
}

/// Reference to a source chunk cited by the answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Path of the source file
    pub source_path: String,
    /// ID of the cited chunk
    pub chunk_id: String,
}

/// Response from a pipeline query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Generated answer
    pub answer: String,
    /// Confidence score in [0, 100]
    pub confidence: f32,
    /// Cited sources, in context order
    pub sources: Vec<SourceRef>,
    /// True when an optional stage was unavailable or yielded nothing
    pub degraded: bool,
    /// Ordered stage snapshots, present when the query was verbose
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<StageTrace>>,
}

impl QueryResponse {
    /// Explicit empty-result response for queries with no retrievable context
    pub fn no_information(trace: Option<Vec<StageTrace>>) -> Self {
        Self {
            answer: "No information found in the indexed documents for this query.".to_string(),
            confidence: 0.0,
            sources: Vec::new(),
            degraded: true,
            trace,
        }
    }
}
