//! Bounded confidence scoring from retrieval and generation signals
//!
//! The score is a fixed weighted combination, deterministic for identical
//! inputs:
//!
//! - retrieval signal (60%): mean fused score of the chosen context chunks
//!   normalized against the per-chunk maximum `num_lists / (1 + k0)`,
//!   blended 70/30 with a concentration term (top score over sum), so high
//!   and concentrated scores raise confidence;
//! - groundedness signal (40%): fraction of distinct answer content-words
//!   that appear in the retrieved context.
//!
//! Without an answer the retrieval signal stands alone. Output is always
//! clamped to [0, 100]; an empty candidate set scores exactly 0.

use std::collections::HashSet;

/// Inputs to a confidence computation
#[derive(Debug, Default)]
pub struct ConfidenceInputs<'a> {
    /// Fused scores of the chunks admitted into the context, relevance order
    pub fused_scores: &'a [f64],
    /// Number of sub-query lists that fed fusion
    pub num_lists: usize,
    /// Generated answer, when generation ran
    pub answer: Option<&'a str>,
    /// Assembled context text, for the groundedness heuristic
    pub context_text: Option<&'a str>,
}

/// Derives a bounded confidence value in [0, 100]
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    rrf_k0: f64,
}

const RETRIEVAL_WEIGHT: f64 = 0.6;
const GROUNDEDNESS_WEIGHT: f64 = 0.4;
const MEAN_WEIGHT: f64 = 0.7;
const CONCENTRATION_WEIGHT: f64 = 0.3;

impl ConfidenceScorer {
    /// Create a scorer calibrated to the fusion smoothing constant
    pub fn new(rrf_k0: f64) -> Self {
        Self { rrf_k0 }
    }

    /// Compute the confidence score
    pub fn score(&self, inputs: &ConfidenceInputs) -> f32 {
        if inputs.fused_scores.is_empty() || inputs.num_lists == 0 {
            return 0.0;
        }

        let retrieval = self.retrieval_signal(inputs.fused_scores, inputs.num_lists);

        let combined = match (inputs.answer, inputs.context_text) {
            (Some(answer), Some(context)) => {
                let groundedness = groundedness(answer, context);
                RETRIEVAL_WEIGHT * retrieval + GROUNDEDNESS_WEIGHT * groundedness
            }
            _ => retrieval,
        };

        (combined * 100.0).clamp(0.0, 100.0) as f32
    }

    fn retrieval_signal(&self, fused_scores: &[f64], num_lists: usize) -> f64 {
        // A chunk ranked first in every list scores num_lists / (1 + k0).
        let max_per_chunk = num_lists as f64 / (1.0 + self.rrf_k0);
        if max_per_chunk <= 0.0 {
            return 0.0;
        }

        let sum: f64 = fused_scores.iter().sum();
        let mean = sum / fused_scores.len() as f64;
        let mean_norm = (mean / max_per_chunk).clamp(0.0, 1.0);

        let top = fused_scores
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max)
            .max(0.0);
        let concentration = if sum > 0.0 { (top / sum).clamp(0.0, 1.0) } else { 0.0 };

        MEAN_WEIGHT * mean_norm + CONCENTRATION_WEIGHT * concentration
    }
}

/// Fraction of distinct answer content-words present in the context
fn groundedness(answer: &str, context: &str) -> f64 {
    let context_words: HashSet<String> = content_words(context).collect();
    let answer_words: HashSet<String> = content_words(answer).collect();
    if answer_words.is_empty() {
        return 0.0;
    }
    let grounded = answer_words
        .iter()
        .filter(|w| context_words.contains(*w))
        .count();
    grounded as f64 / answer_words.len() as f64
}

fn content_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.len() > 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs_score_zero() {
        let scorer = ConfidenceScorer::new(60.0);
        assert_eq!(scorer.score(&ConfidenceInputs::default()), 0.0);
    }

    #[test]
    fn test_score_is_bounded() {
        let scorer = ConfidenceScorer::new(60.0);
        let max_score = 3.0 / 61.0;
        let inputs = ConfidenceInputs {
            fused_scores: &[max_score, max_score],
            num_lists: 3,
            answer: Some("fusion merges ranked lists deterministically"),
            context_text: Some("fusion merges ranked lists deterministically"),
        };
        let score = scorer.score(&inputs);
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn test_concentrated_scores_beat_scattered() {
        let scorer = ConfidenceScorer::new(60.0);
        let strong = ConfidenceInputs {
            fused_scores: &[3.0 / 61.0],
            num_lists: 3,
            ..Default::default()
        };
        let weak = ConfidenceInputs {
            fused_scores: &[1.0 / 100.0, 1.0 / 110.0, 1.0 / 120.0],
            num_lists: 3,
            ..Default::default()
        };
        assert!(scorer.score(&strong) > scorer.score(&weak));
    }

    #[test]
    fn test_grounded_answer_raises_confidence() {
        let scorer = ConfidenceScorer::new(60.0);
        let context = "reciprocal rank fusion merges ranked candidate lists";
        let fused = [1.0 / 61.0];

        let grounded = ConfidenceInputs {
            fused_scores: &fused,
            num_lists: 1,
            answer: Some("fusion merges ranked candidate lists"),
            context_text: Some(context),
        };
        let ungrounded = ConfidenceInputs {
            fused_scores: &fused,
            num_lists: 1,
            answer: Some("unrelated hallucinated statement entirely"),
            context_text: Some(context),
        };
        assert!(scorer.score(&grounded) > scorer.score(&ungrounded));
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let scorer = ConfidenceScorer::new(60.0);
        let fused = [1.0 / 61.0, 1.0 / 63.0];
        let inputs = || ConfidenceInputs {
            fused_scores: &fused,
            num_lists: 2,
            answer: Some("an answer about fusion"),
            context_text: Some("context about fusion"),
        };
        assert_eq!(scorer.score(&inputs()), scorer.score(&inputs()));
    }
}
