//! Response caching keyed by normalized query

pub mod answer_cache;

pub use answer_cache::{AnswerCache, CacheStats};
