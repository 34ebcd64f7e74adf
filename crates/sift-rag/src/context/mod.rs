//! Context assembly: dedup, near-duplicate collapse, and budgeting

use std::collections::HashSet;

use crate::types::{Chunk, SourceRef};

/// One chunk admitted into the context
#[derive(Debug, Clone)]
pub struct ContextEntry {
    /// ID of the admitted chunk
    pub chunk_id: String,
    /// Source file path, for citations
    pub source_path: String,
    /// Chunk index within its source file
    pub chunk_index: u32,
    /// Chunk text
    pub text: String,
}

/// Ordered, deduplicated context bounded by a character budget
#[derive(Debug, Clone, Default)]
pub struct ContextBlock {
    /// Admitted entries, in relevance order
    pub entries: Vec<ContextEntry>,
    /// Total characters across admitted texts
    pub total_chars: usize,
}

impl ContextBlock {
    /// True when nothing was admitted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source references for the admitted chunks, in context order
    pub fn sources(&self) -> Vec<SourceRef> {
        self.entries
            .iter()
            .map(|e| SourceRef {
                source_path: e.source_path.clone(),
                chunk_id: e.chunk_id.clone(),
            })
            .collect()
    }
}

/// Packs candidate chunks into a budgeted context block
///
/// Candidates arrive in relevance order and are admitted greedily until the
/// budget would be exceeded. The first candidate is always admitted so a
/// single oversized chunk cannot empty the context. Near-duplicates of
/// already-admitted chunks (adjacent chunk of the same file, or high word
/// overlap) are skipped to keep the context non-redundant.
pub struct ContextRepacker {
    budget_chars: usize,
    overlap_threshold: f32,
}

impl ContextRepacker {
    /// Create a repacker with a character budget and overlap threshold
    pub fn new(budget_chars: usize, overlap_threshold: f32) -> Self {
        Self {
            budget_chars,
            overlap_threshold,
        }
    }

    /// Assemble a context block from relevance-ordered chunks
    pub fn repack<'a, I>(&self, candidates: I) -> ContextBlock
    where
        I: IntoIterator<Item = &'a Chunk>,
    {
        let mut block = ContextBlock::default();
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for chunk in candidates {
            if !seen_ids.insert(&chunk.id) {
                continue;
            }
            if self.is_near_duplicate(chunk, &block.entries) {
                tracing::debug!("Skipping near-duplicate chunk '{}'", chunk.id);
                continue;
            }

            let size = chunk.text.chars().count();
            if !block.entries.is_empty() && block.total_chars + size > self.budget_chars {
                break;
            }

            block.total_chars += size;
            block.entries.push(ContextEntry {
                chunk_id: chunk.id.clone(),
                source_path: chunk.source_path.clone(),
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
            });
        }

        block
    }

    /// Adjacent chunk of the same file, or word overlap above threshold
    fn is_near_duplicate(&self, chunk: &Chunk, admitted: &[ContextEntry]) -> bool {
        for entry in admitted {
            if entry.source_path == chunk.source_path
                && entry.chunk_index.abs_diff(chunk.chunk_index) <= 1
            {
                return true;
            }
            if word_overlap(&chunk.text, &entry.text) >= self.overlap_threshold {
                return true;
            }
        }
        false
    }
}

/// Jaccard overlap of lowercased word sets
fn word_overlap(a: &str, b: &str) -> f32 {
    let words_a: HashSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let words_b: HashSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str, source: &str, index: u32) -> Chunk {
        Chunk::with_id(id, text, source, index, vec![1.0])
    }

    #[test]
    fn test_budget_never_exceeded() {
        let repacker = ContextRepacker::new(20, 0.8);
        let chunks = vec![
            chunk("a", "alpha beta", "a.md", 0),
            chunk("b", "gamma delt", "b.md", 0),
            chunk("c", "epsilon zz", "c.md", 0),
        ];
        let block = repacker.repack(chunks.iter());
        assert_eq!(block.entries.len(), 2);
        assert!(block.total_chars <= 20);
    }

    #[test]
    fn test_first_chunk_always_included() {
        let repacker = ContextRepacker::new(5, 0.8);
        let chunks = vec![chunk("big", "this text alone exceeds the budget", "a.md", 0)];
        let block = repacker.repack(chunks.iter());
        assert_eq!(block.entries.len(), 1);
        assert_eq!(block.entries[0].chunk_id, "big");
    }

    #[test]
    fn test_dedup_by_chunk_id() {
        let repacker = ContextRepacker::new(1000, 0.8);
        let a = chunk("a", "unique text", "a.md", 0);
        let block = repacker.repack([&a, &a]);
        assert_eq!(block.entries.len(), 1);
    }

    #[test]
    fn test_adjacent_chunks_collapse() {
        let repacker = ContextRepacker::new(1000, 0.8);
        let chunks = vec![
            chunk("a", "first window of a paragraph", "doc.md", 3),
            chunk("b", "second overlapping window entirely different words", "doc.md", 4),
            chunk("c", "unrelated content from elsewhere", "other.md", 0),
        ];
        let block = repacker.repack(chunks.iter());
        let ids: Vec<&str> = block.entries.iter().map(|e| e.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_high_overlap_collapses() {
        let repacker = ContextRepacker::new(1000, 0.8);
        let chunks = vec![
            chunk("a", "the quick brown fox jumps over the lazy dog", "a.md", 0),
            chunk("b", "the quick brown fox jumps over the lazy dog", "b.md", 7),
        ];
        let block = repacker.repack(chunks.iter());
        assert_eq!(block.entries.len(), 1);
    }

    #[test]
    fn test_empty_candidates_yield_empty_block() {
        let repacker = ContextRepacker::new(1000, 0.8);
        let block = repacker.repack(std::iter::empty());
        assert!(block.is_empty());
        assert!(block.sources().is_empty());
    }

    #[test]
    fn test_sources_preserve_order() {
        let repacker = ContextRepacker::new(1000, 0.8);
        let chunks = vec![
            chunk("z", "completely distinct alpha words", "z.md", 0),
            chunk("a", "different beta vocabulary here", "a.md", 0),
        ];
        let block = repacker.repack(chunks.iter());
        let sources = block.sources();
        assert_eq!(sources[0].chunk_id, "z");
        assert_eq!(sources[1].chunk_id, "a");
    }
}
