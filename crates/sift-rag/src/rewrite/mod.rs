//! Query normalization and deterministic sub-query expansion
//!
//! Expansion is rule-based: fixed strategies rephrase the query to widen
//! recall without any model call, so the sub-query set is reproducible for
//! a given input. Expansion never fails the pipeline; any degenerate
//! outcome collapses to the original query alone.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::types::{RewriteStrategy, SubQuery};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "do", "does", "did",
        "have", "has", "had", "will", "would", "can", "could", "should", "shall", "may", "might",
        "i", "you", "he", "she", "it", "we", "they", "me", "my", "your", "our", "their", "of",
        "in", "on", "at", "to", "for", "from", "with", "by", "about", "as", "into", "and", "or",
        "but", "not", "no", "if", "then", "than", "that", "this", "these", "those", "there",
        "what", "which", "who", "whom", "whose", "when", "where", "why", "how", "tell", "explain",
        "describe", "please",
    ]
    .into_iter()
    .collect()
});

/// Leading interrogative phrases stripped by the statement strategy
const QUESTION_PREFIXES: &[&str] = &[
    "what is the",
    "what are the",
    "what is",
    "what are",
    "how do i",
    "how do you",
    "how does the",
    "how does",
    "how do",
    "how to",
    "why does",
    "why is",
    "why do",
    "when does",
    "when is",
    "where is",
    "where does",
    "who is",
    "which",
    "can you explain",
    "explain",
    "describe",
    "tell me about",
];

/// Rewrites a raw query into a normalized form and a bounded set of
/// sub-queries capturing different facets of the intent
#[derive(Debug, Clone, Default)]
pub struct QueryRewriter;

impl QueryRewriter {
    /// Create a rewriter
    pub fn new() -> Self {
        Self
    }

    /// Trim and canonicalize query text
    pub fn normalize(&self, text: &str) -> String {
        WHITESPACE.replace_all(text.trim(), " ").to_string()
    }

    /// Produce at most `n` sub-queries, the normalized original always first
    pub fn expand(&self, text: &str, n: usize) -> Vec<SubQuery> {
        let original = self.normalize(text);
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(original.to_lowercase());
        let mut subqueries = vec![SubQuery::new(original.clone(), RewriteStrategy::Original)];
        if n <= 1 {
            subqueries.truncate(n.max(1));
            return subqueries;
        }

        let candidates = [
            (RewriteStrategy::Statement, self.as_statement(&original)),
            (RewriteStrategy::Keywords, self.keywords(&original)),
            (RewriteStrategy::Definition, self.definition_facet(&original)),
        ];

        for (strategy, candidate) in candidates {
            if subqueries.len() >= n {
                break;
            }
            let Some(candidate) = candidate else { continue };
            if seen.insert(candidate.to_lowercase()) {
                subqueries.push(SubQuery::new(candidate, strategy));
            }
        }

        tracing::debug!(
            "Expanded query into {} sub-queries: {:?}",
            subqueries.len(),
            subqueries.iter().map(|s| s.strategy).collect::<Vec<_>>()
        );
        subqueries
    }

    /// Strip interrogative framing, leaving the statement core
    fn as_statement(&self, normalized: &str) -> Option<String> {
        let lower = normalized.to_lowercase();
        let without_mark = lower.trim_end_matches('?').trim_end();

        for prefix in QUESTION_PREFIXES {
            if let Some(rest) = without_mark.strip_prefix(prefix) {
                let rest = rest.trim();
                let has_content = rest.split_whitespace().any(|w| !STOPWORDS.contains(w));
                if has_content {
                    return Some(rest.to_string());
                }
            }
        }
        None
    }

    /// Content keywords with stopwords removed
    fn keywords(&self, normalized: &str) -> Option<String> {
        let lower = normalized.to_lowercase();
        let words: Vec<&str> = lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty() && !STOPWORDS.contains(*w))
            .collect();
        if words.is_empty() {
            return None;
        }
        Some(words.join(" "))
    }

    /// Definition-seeking phrasing of the query's core terms
    fn definition_facet(&self, normalized: &str) -> Option<String> {
        self.keywords(normalized)
            .map(|core| format!("definition and overview of {}", core))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        let rewriter = QueryRewriter::new();
        assert_eq!(
            rewriter.normalize("  what   is\tRRF  \n"),
            "what is RRF"
        );
    }

    #[test]
    fn test_original_is_always_first() {
        let rewriter = QueryRewriter::new();
        let subqueries = rewriter.expand("What is reciprocal rank fusion?", 4);
        assert_eq!(subqueries[0].strategy, RewriteStrategy::Original);
        assert_eq!(subqueries[0].text, "What is reciprocal rank fusion?");
        assert!(subqueries.len() > 1);
        assert!(subqueries.len() <= 4);
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let rewriter = QueryRewriter::new();
        let a = rewriter.expand("How does the vector store handle ties?", 4);
        let b = rewriter.expand("How does the vector store handle ties?", 4);
        let texts_a: Vec<&str> = a.iter().map(|s| s.text.as_str()).collect();
        let texts_b: Vec<&str> = b.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts_a, texts_b);
    }

    #[test]
    fn test_statement_strategy_strips_question_framing() {
        let rewriter = QueryRewriter::new();
        let subqueries = rewriter.expand("What is reciprocal rank fusion?", 4);
        let statement = subqueries
            .iter()
            .find(|s| s.strategy == RewriteStrategy::Statement)
            .unwrap();
        assert_eq!(statement.text, "reciprocal rank fusion");
    }

    #[test]
    fn test_all_stopword_query_degrades_to_original() {
        let rewriter = QueryRewriter::new();
        let subqueries = rewriter.expand("what is the", 4);
        assert_eq!(subqueries.len(), 1);
        assert_eq!(subqueries[0].strategy, RewriteStrategy::Original);
    }

    #[test]
    fn test_expansion_respects_bound() {
        let rewriter = QueryRewriter::new();
        let subqueries = rewriter.expand("What is reciprocal rank fusion?", 2);
        assert_eq!(subqueries.len(), 2);
        assert_eq!(subqueries[0].strategy, RewriteStrategy::Original);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let rewriter = QueryRewriter::new();
        // "fusion" survives every strategy as the same single keyword.
        let subqueries = rewriter.expand("fusion", 4);
        let mut texts: Vec<String> = subqueries.iter().map(|s| s.text.to_lowercase()).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), subqueries.len());
    }
}
