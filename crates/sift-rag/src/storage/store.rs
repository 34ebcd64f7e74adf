//! SQLite-backed chunk store with brute-force similarity scan
//!
//! Records persist in a single table (default `documents`); an in-memory
//! copy is kept for search so reads never touch the connection. Exact scan
//! is adequate at the scale this pipeline targets, and the search interface
//! does not expose the scan, so an approximate index can replace it without
//! changing callers.

use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, MetadataValue};

use super::DistanceMetric;

/// A search match with its distance to the query embedding
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched chunk
    pub chunk: Chunk,
    /// Distance under the store's metric (lower is closer)
    pub distance: f32,
}

/// Store-level counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Total chunks stored
    pub total_chunks: usize,
    /// Distinct source files represented
    pub unique_sources: usize,
}

/// Persisted vector store
///
/// `add` calls are serialized through the connection lock (single-writer);
/// searches read the in-memory cache concurrently.
pub struct VectorStore {
    conn: Mutex<Connection>,
    table: String,
    metric: DistanceMetric,
    /// In-memory records in insertion order
    cache: RwLock<Vec<Chunk>>,
    /// Embedding dimensionality, pinned by the first added chunk
    dimensions: RwLock<Option<usize>>,
    /// Bumped on every successful add, for cache invalidation
    generation: RwLock<u64>,
}

impl VectorStore {
    /// Create or open a store at the configured path
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate_table_name()?;
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&config.path)?;
        Self::from_connection(conn, &config.table, config.metric)
    }

    /// Create an in-memory store (primarily for tests)
    pub fn in_memory(metric: DistanceMetric) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, "documents", metric)
    }

    fn from_connection(conn: Connection, table: &str, metric: DistanceMetric) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
        "#,
        )?;

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                chunk_text TEXT NOT NULL,
                file_path TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_file_path ON {table}(file_path);
        "#,
        ))?;

        let store = Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
            metric,
            cache: RwLock::new(Vec::new()),
            dimensions: RwLock::new(None),
            generation: RwLock::new(0),
        };
        store.load_cache()?;
        Ok(store)
    }

    /// Load all persisted records into the scan cache, in creation order
    fn load_cache(&self) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, chunk_text, file_path, chunk_index, embedding, metadata \
             FROM {} ORDER BY rowid",
            self.table
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Vec<u8>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (id, text, source_path, chunk_index, blob, metadata_json) = row?;
            let metadata: HashMap<String, MetadataValue> = match metadata_json {
                Some(raw) => serde_json::from_str(&raw)?,
                None => HashMap::new(),
            };
            chunks.push(Chunk {
                id,
                text,
                source_path,
                chunk_index: chunk_index as u32,
                embedding: decode_embedding(&blob),
                metadata,
            });
        }
        drop(stmt);
        drop(conn);

        if let Some(first) = chunks.first() {
            *self.dimensions.write() = Some(first.embedding.len());
        }
        let count = chunks.len();
        *self.cache.write() = chunks;
        if count > 0 {
            tracing::info!("Loaded {} chunks from table '{}'", count, self.table);
        }
        Ok(())
    }

    /// Append chunk records
    ///
    /// Empty input is a no-op. The first non-empty add pins the store's
    /// embedding dimensionality; any chunk that disagrees fails the whole
    /// call before a single row is written.
    pub fn add(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let expected = {
            let pinned = self.dimensions.read();
            pinned.unwrap_or_else(|| chunks[0].embedding.len())
        };
        for chunk in chunks {
            if chunk.embedding.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: chunk.embedding.len(),
                });
            }
        }

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO {} (id, chunk_text, file_path, chunk_index, embedding, metadata) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    self.table
                ))?;
                for chunk in chunks {
                    let metadata_json = if chunk.metadata.is_empty() {
                        None
                    } else {
                        Some(serde_json::to_string(&chunk.metadata)?)
                    };
                    stmt.execute(params![
                        chunk.id,
                        chunk.text,
                        chunk.source_path,
                        chunk.chunk_index as i64,
                        encode_embedding(&chunk.embedding),
                        metadata_json,
                    ])
                    .map_err(|e| {
                        Error::store(format!("failed to insert chunk '{}': {}", chunk.id, e))
                    })?;
                }
            }
            tx.commit()?;
        }

        *self.dimensions.write() = Some(expected);
        self.cache.write().extend_from_slice(chunks);
        *self.generation.write() += 1;

        tracing::debug!("Added {} chunks to table '{}'", chunks.len(), self.table);
        Ok(())
    }

    /// Exact nearest-neighbor search
    ///
    /// Returns up to `k` hits ordered by ascending distance; ties break by
    /// insertion order. A store with no data yields an empty result.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let cache = self.cache.read();
        if cache.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = *self.dimensions.read() {
            if query_embedding.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: query_embedding.len(),
                });
            }
        }

        let mut hits: Vec<SearchHit> = cache
            .iter()
            .map(|chunk| SearchHit {
                chunk: chunk.clone(),
                distance: self.metric.distance(query_embedding, &chunk.embedding),
            })
            .collect();

        // Stable sort keeps insertion order for equal distances.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Page through chunk records in stable creation order
    pub fn page(&self, limit: usize, offset: usize) -> Result<Vec<Chunk>> {
        let cache = self.cache.read();
        Ok(cache.iter().skip(offset).take(limit).cloned().collect())
    }

    /// Store-level counts
    pub fn stats(&self) -> Result<StoreStats> {
        let cache = self.cache.read();
        let unique_sources = cache
            .iter()
            .map(|c| c.source_path.as_str())
            .collect::<HashSet<_>>()
            .len();
        Ok(StoreStats {
            total_chunks: cache.len(),
            unique_sources,
        })
    }

    /// Whether any backing data exists
    pub fn exists(&self) -> Result<bool> {
        Ok(!self.cache.read().is_empty())
    }

    /// Monotonic counter bumped on every successful add
    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    /// Embedding dimensionality, once pinned by the first add
    pub fn dimensions(&self) -> Option<usize> {
        *self.dimensions.read()
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
