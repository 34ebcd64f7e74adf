//! Chunk types with provenance for citations

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A metadata value attached to a chunk
///
/// The set of permitted kinds is closed so serialization and equality stay
/// well-defined across store round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// String value
    Str(String),
    /// Numeric value
    Num(f64),
    /// Boolean value
    Bool(bool),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A unit of indexed text with its embedding and provenance
///
/// Chunks are produced by ingestion (external) and are read-only to the
/// query pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID within a store
    pub id: String,
    /// Text content
    pub text: String,
    /// Path of the source file this chunk came from
    pub source_path: String,
    /// Chunk index within the source file
    pub chunk_index: u32,
    /// Embedding vector; dimensionality is fixed per store
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
}

impl Chunk {
    /// Create a chunk with a freshly minted ID
    pub fn new(
        text: impl Into<String>,
        source_path: impl Into<String>,
        chunk_index: u32,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            source_path: source_path.into(),
            chunk_index,
            embedding,
            metadata: HashMap::new(),
        }
    }

    /// Create a chunk with a caller-supplied ID
    pub fn with_id(
        id: impl Into<String>,
        text: impl Into<String>,
        source_path: impl Into<String>,
        chunk_index: u32,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_path: source_path.into(),
            chunk_index,
            embedding,
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
