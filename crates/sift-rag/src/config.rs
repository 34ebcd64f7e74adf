//! Configuration for the query pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::DistanceMetric;

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Vector store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Retrieval and fusion configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,
    /// Generation backend (Ollama) configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Answer cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Stage timeout configuration
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| Error::config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.fan_out_multiplier == 0 {
            return Err(Error::config("retrieval.fan_out_multiplier must be > 0"));
        }
        if self.retrieval.rrf_k0 <= 0.0 {
            return Err(Error::config("retrieval.rrf_k0 must be > 0"));
        }
        if self.retrieval.max_subqueries == 0 {
            return Err(Error::config("retrieval.max_subqueries must be > 0"));
        }
        if self.context.budget_chars == 0 {
            return Err(Error::config("context.budget_chars must be > 0"));
        }
        self.store.validate_table_name()
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite database backing the store
    pub path: PathBuf,
    /// Table (collection) name chunks are stored under
    #[serde(default = "default_table")]
    pub table: String,
    /// Distance metric for similarity search
    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_table() -> String {
    "documents".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sift-rag")
            .join("store.db");

        Self {
            path,
            table: default_table(),
            metric: DistanceMetric::default(),
        }
    }
}

impl StoreConfig {
    /// Reject table names that cannot be spliced into SQL safely
    pub fn validate_table_name(&self) -> Result<()> {
        let valid = !self.table.is_empty()
            && self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(Error::config(format!(
                "invalid table name '{}': expected [A-Za-z0-9_]+",
                self.table
            )))
        }
    }
}

/// Retrieval, fusion, and reranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Per-sub-query fan-out as a multiple of the requested top_k
    pub fan_out_multiplier: usize,
    /// RRF smoothing constant
    pub rrf_k0: f64,
    /// Maximum number of sub-queries produced by rewriting (original included)
    pub max_subqueries: usize,
    /// Minimum fused-candidate pool handed to the reranker
    pub rerank_pool: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fan_out_multiplier: 3,
            rrf_k0: 60.0,
            max_subqueries: 4,
            rerank_pool: 20,
        }
    }
}

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Character budget for the assembled context block
    pub budget_chars: usize,
    /// Word-overlap ratio above which two chunks are collapsed as near-duplicates
    pub overlap_threshold: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget_chars: 8000,
            overlap_threshold: 0.8,
        }
    }
}

/// Generation backend (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Bounded retries for failed generation calls
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "phi3".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 1,
        }
    }
}

/// Answer cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable the answer cache
    pub enabled: bool,
    /// Maximum cached answers
    pub max_entries: usize,
    /// TTL for cache entries in seconds
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: 1000,
            ttl_seconds: 3600,
        }
    }
}

/// Optional wall-clock bounds for the retrieval and generation stages
///
/// A retrieval timeout maps to the empty-result response path; a generation
/// timeout maps to a generation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Budget for the whole retrieval fan-out, in milliseconds
    #[serde(default)]
    pub retrieval_ms: Option<u64>,
    /// Budget for the generation call, in milliseconds
    #[serde(default)]
    pub generation_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.table, "documents");
        assert_eq!(config.retrieval.fan_out_multiplier, 3);
        assert_eq!(config.retrieval.rrf_k0, 60.0);
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let mut config = RagConfig::default();
        config.store.table = "documents; DROP TABLE".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parses_partial_toml() {
        let raw = r#"
            [retrieval]
            fan_out_multiplier = 5
            rrf_k0 = 30.0
            max_subqueries = 2
            rerank_pool = 10

            [store]
            path = "/tmp/store.db"
        "#;
        let config: RagConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.retrieval.fan_out_multiplier, 5);
        assert_eq!(config.store.table, "documents");
        assert_eq!(config.context.budget_chars, 8000);
    }
}
