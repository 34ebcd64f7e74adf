//! Answer caching with store-based invalidation
//!
//! Caches full query responses and invalidates them when the backing store
//! gains chunks, so a cached answer never outlives the corpus it was
//! grounded in.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::types::QueryResponse;

/// Cached response with invalidation metadata
#[derive(Debug, Clone)]
struct CachedAnswer {
    response: QueryResponse,
    /// Store generation at cache time
    store_generation: u64,
    cached_at: DateTime<Utc>,
    hit_count: u32,
}

/// Answer cache with TTL, capacity eviction, and store invalidation
pub struct AnswerCache {
    cache: RwLock<HashMap<String, CachedAnswer>>,
    max_entries: usize,
    ttl_seconds: u64,
}

impl AnswerCache {
    /// Create a cache with the given capacity and TTL
    pub fn new(max_entries: usize, ttl_seconds: u64) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            max_entries,
            ttl_seconds,
        }
    }

    /// Hash a normalized question and top_k into a cache key
    fn key(question: &str, top_k: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(question.to_lowercase().trim().as_bytes());
        hasher.update(top_k.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get a cached response if still valid
    ///
    /// Returns None when the entry is missing, past its TTL, or was cached
    /// against an older store generation.
    pub fn get(&self, question: &str, top_k: usize, store_generation: u64) -> Option<QueryResponse> {
        let key = Self::key(question, top_k);
        let mut cache = self.cache.write();

        if let Some(entry) = cache.get_mut(&key) {
            let age = Utc::now().signed_duration_since(entry.cached_at);
            if age.num_seconds() as u64 > self.ttl_seconds {
                tracing::debug!("Answer cache miss (TTL expired): {}", &key[..12]);
                cache.remove(&key);
                return None;
            }
            if entry.store_generation != store_generation {
                tracing::debug!("Answer cache miss (store changed): {}", &key[..12]);
                cache.remove(&key);
                return None;
            }
            entry.hit_count += 1;
            tracing::debug!("Answer cache hit: {} (hits: {})", &key[..12], entry.hit_count);
            return Some(entry.response.clone());
        }

        None
    }

    /// Store a response
    pub fn put(&self, question: &str, top_k: usize, response: QueryResponse, store_generation: u64) {
        let key = Self::key(question, top_k);
        let mut cache = self.cache.write();

        if cache.len() >= self.max_entries {
            if let Some(oldest_key) = cache
                .iter()
                .min_by_key(|(_, v)| v.cached_at)
                .map(|(k, _)| k.clone())
            {
                cache.remove(&oldest_key);
            }
        }

        cache.insert(
            key,
            CachedAnswer {
                response,
                store_generation,
                cached_at: Utc::now(),
                hit_count: 0,
            },
        );
    }

    /// Drop every cached answer
    pub fn clear(&self) {
        self.cache.write().clear();
        tracing::info!("Answer cache cleared");
    }

    /// Cache statistics
    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.read();
        CacheStats {
            entries: cache.len(),
            total_hits: cache.values().map(|e| e.hit_count).sum(),
            max_entries: self.max_entries,
            ttl_seconds: self.ttl_seconds,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_hits: u32,
    pub max_entries: usize,
    pub ttl_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(answer: &str) -> QueryResponse {
        QueryResponse {
            answer: answer.to_string(),
            confidence: 50.0,
            sources: Vec::new(),
            degraded: false,
            trace: None,
        }
    }

    #[test]
    fn test_cache_hit() {
        let cache = AnswerCache::new(10, 3600);
        cache.put("what is fusion", 5, response("fusion is..."), 1);

        let hit = cache.get("what is fusion", 5, 1);
        assert_eq!(hit.unwrap().answer, "fusion is...");
        assert_eq!(cache.stats().total_hits, 1);
    }

    #[test]
    fn test_miss_on_different_top_k() {
        let cache = AnswerCache::new(10, 3600);
        cache.put("what is fusion", 5, response("fusion is..."), 1);
        assert!(cache.get("what is fusion", 3, 1).is_none());
    }

    #[test]
    fn test_invalidated_when_store_changes() {
        let cache = AnswerCache::new(10, 3600);
        cache.put("what is fusion", 5, response("fusion is..."), 1);

        assert!(cache.get("what is fusion", 5, 2).is_none());
        // The stale entry was evicted, not just skipped.
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = AnswerCache::new(2, 3600);
        cache.put("q1", 5, response("a1"), 1);
        cache.put("q2", 5, response("a2"), 1);
        cache.put("q3", 5, response("a3"), 1);
        assert_eq!(cache.stats().entries, 2);
    }
}
