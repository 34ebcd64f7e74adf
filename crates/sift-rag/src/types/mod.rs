//! Core data types shared across the pipeline

pub mod chunk;
pub mod query;
pub mod response;

pub use chunk::{Chunk, MetadataValue};
pub use query::{Query, RewriteStrategy, SubQuery};
pub use response::{PipelineStage, QueryResponse, SourceRef, StageTrace};
