//! Query request types

use serde::{Deserialize, Serialize};

/// A query against the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// The question to answer
    pub text: String,

    /// Number of chunks to retrieve (default: 5)
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Capture per-stage trace snapshots in the response (default: false)
    #[serde(default)]
    pub verbose: bool,
}

fn default_top_k() -> usize {
    5
}

impl Query {
    /// Create a new query with defaults
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: default_top_k(),
            verbose: false,
        }
    }

    /// Set the number of final context chunks
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Enable stage tracing
    pub fn with_verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

/// Rewrite strategy that produced a sub-query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteStrategy {
    /// The normalized original query
    Original,
    /// Content keywords with stopwords removed
    Keywords,
    /// Question phrasing rewritten as a statement
    Statement,
    /// Definition-seeking facet of the query
    Definition,
}

/// A derived query text, tagged with its originating rewrite strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuery {
    /// Sub-query text
    pub text: String,
    /// Strategy that produced it
    pub strategy: RewriteStrategy,
}

impl SubQuery {
    /// Create a sub-query
    pub fn new(text: impl Into<String>, strategy: RewriteStrategy) -> Self {
        Self {
            text: text.into(),
            strategy,
        }
    }
}
