//! Passage refinement.
//!
//! Turns ordered raw text segments into token-bounded, overlapping,
//! deduplicated passages ready for embedding. Refinement is deterministic:
//! identical input and parameters always yield an identical passage list.

use crate::error::{LesaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::debug;

/// A bounded-length unit of document text produced by refinement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// Id encoding source segment and global sequence, for deterministic replay.
    pub id: String,
    /// Index of the raw segment this passage came from.
    pub source_index: usize,
    /// Global order of this passage in the document.
    pub order: usize,
    /// Whitespace-normalized, non-empty text.
    pub text: String,
    /// Token count at flush time.
    pub token_count: usize,
}

/// Configuration for passage refinement.
#[derive(Debug, Clone, Copy)]
pub struct RefinerConfig {
    /// Maximum tokens per passage.
    pub max_tokens: usize,
    /// Number of trailing buffer units carried into the next passage.
    pub overlap: usize,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            overlap: 3,
        }
    }
}

/// Refines raw text segments into passages.
pub struct ChunkRefiner {
    bpe: CoreBPE,
    config: RefinerConfig,
}

impl ChunkRefiner {
    /// Create a refiner with the given configuration.
    pub fn new(config: RefinerConfig) -> Result<Self> {
        let bpe = cl100k_base()
            .map_err(|e| LesaError::Config(format!("Failed to load tokenizer: {}", e)))?;
        Ok(Self { bpe, config })
    }

    /// Count tokens in a piece of text.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Refine ordered raw segments into an ordered, deduplicated passage list.
    ///
    /// Sentences are accumulated greedily up to the token budget; each flushed
    /// passage seeds the next with its trailing `overlap` units so context is
    /// preserved across passage boundaries. Exact duplicate text is emitted
    /// only once per call.
    pub fn refine(&self, segments: &[String]) -> Vec<Passage> {
        let mut refined: Vec<Passage> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut order = 0usize;

        for (source_index, segment) in segments.iter().enumerate() {
            let clean = normalize_whitespace(segment);
            if clean.is_empty() {
                continue;
            }

            let mut buffer: Vec<String> = Vec::new();
            let mut buffer_tokens = 0usize;

            for sentence in split_sentences(&clean) {
                let sentence_tokens = self.count_tokens(&sentence);

                // A sentence that alone exceeds the budget becomes its own
                // passage, with no overlap carried in or out.
                if sentence_tokens > self.config.max_tokens {
                    flush(
                        &mut buffer,
                        &mut buffer_tokens,
                        source_index,
                        &mut order,
                        &mut seen,
                        &mut refined,
                    );
                    emit(
                        sentence,
                        sentence_tokens,
                        source_index,
                        &mut order,
                        &mut seen,
                        &mut refined,
                    );
                    continue;
                }

                if buffer_tokens + sentence_tokens > self.config.max_tokens && !buffer.is_empty() {
                    let flushed = buffer.clone();
                    flush(
                        &mut buffer,
                        &mut buffer_tokens,
                        source_index,
                        &mut order,
                        &mut seen,
                        &mut refined,
                    );

                    // Seed the next buffer with the trailing overlap units.
                    let overlap_start = flushed.len().saturating_sub(self.config.overlap);
                    let overlap_text = flushed[overlap_start..].join(" ");
                    buffer = if overlap_text.is_empty() {
                        vec![sentence]
                    } else {
                        vec![overlap_text, sentence]
                    };
                    buffer_tokens = self.count_tokens(&buffer.join(" "));
                } else {
                    buffer.push(sentence);
                    buffer_tokens += sentence_tokens;
                }
            }

            flush(
                &mut buffer,
                &mut buffer_tokens,
                source_index,
                &mut order,
                &mut seen,
                &mut refined,
            );
        }

        debug!(
            segments = segments.len(),
            passages = refined.len(),
            total_tokens = refined.iter().map(|p| p.token_count).sum::<usize>(),
            "refinement complete"
        );

        refined
    }
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into sentences on terminal punctuation boundaries.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '?' | '!') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            chars.next();
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

fn flush(
    buffer: &mut Vec<String>,
    buffer_tokens: &mut usize,
    source_index: usize,
    order: &mut usize,
    seen: &mut HashSet<String>,
    refined: &mut Vec<Passage>,
) {
    if buffer.is_empty() {
        return;
    }
    let text = buffer.join(" ").trim().to_string();
    let tokens = *buffer_tokens;
    buffer.clear();
    *buffer_tokens = 0;
    if text.is_empty() {
        return;
    }
    emit(text, tokens, source_index, order, seen, refined);
}

fn emit(
    text: String,
    token_count: usize,
    source_index: usize,
    order: &mut usize,
    seen: &mut HashSet<String>,
    refined: &mut Vec<Passage>,
) {
    // Exact duplicates are silently dropped.
    if seen.contains(&text) {
        return;
    }
    seen.insert(text.clone());
    refined.push(Passage {
        id: format!("passage-{}-{}", source_index, *order),
        source_index,
        order: *order,
        text,
        token_count,
    });
    *order += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refiner(max_tokens: usize, overlap: usize) -> ChunkRefiner {
        ChunkRefiner::new(RefinerConfig {
            max_tokens,
            overlap,
        })
        .unwrap()
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("One fish. Two fish? Red fish! Blue fish");
        assert_eq!(sentences, vec!["One fish.", "Two fish?", "Red fish!", "Blue fish"]);
    }

    #[test]
    fn test_split_sentences_no_split_inside_ellipsis() {
        let sentences = split_sentences("Wait... there is more.");
        assert_eq!(sentences, vec!["Wait...", "there is more."]);
    }

    #[test]
    fn test_whitespace_only_segments_produce_nothing() {
        let refiner = refiner(200, 3);
        let passages = refiner.refine(&["".to_string(), "   \t\n ".to_string()]);
        assert!(passages.is_empty());
    }

    #[test]
    fn test_normalizes_whitespace() {
        let refiner = refiner(200, 3);
        let passages = refiner.refine(&["some   text\n\twith  gaps.".to_string()]);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "some text with gaps.");
    }

    #[test]
    fn test_duplicate_text_emitted_once() {
        let refiner = refiner(200, 3);
        let segment = "The same passage text.".to_string();
        let passages = refiner.refine(&[segment.clone(), segment]);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].order, 0);
    }

    #[test]
    fn test_idempotent() {
        let refiner = refiner(30, 2);
        let segments = vec![
            "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. Nu xi omicron pi."
                .to_string(),
            "Rho sigma tau upsilon. Phi chi psi omega.".to_string(),
        ];
        let first = refiner.refine(&segments);
        let second = refiner.refine(&segments);
        assert_eq!(first, second);
    }

    #[test]
    fn test_budget_forces_multiple_passages_with_overlap() {
        let refiner = refiner(20, 1);
        let segments = vec![
            "First sentence about storage engines. Second sentence about query planners. \
             Third sentence about vector search. Fourth sentence about ranking heuristics."
                .to_string(),
        ];
        let passages = refiner.refine(&segments);
        assert!(passages.len() >= 2);

        // Every passage except the first shares its leading sentence with the
        // tail of the previous one.
        for pair in passages.windows(2) {
            let first_unit = pair[1].text.split(". ").next().unwrap();
            assert!(
                pair[0].text.contains(first_unit),
                "expected overlap between {:?} and {:?}",
                pair[0].text,
                pair[1].text
            );
        }
    }

    #[test]
    fn test_oversized_sentence_becomes_own_passage() {
        let refiner = refiner(10, 2);
        let long_sentence = "word ".repeat(50).trim().to_string() + ".";
        let segments = vec![format!("Short intro. {} Short outro.", long_sentence)];
        let passages = refiner.refine(&segments);

        assert_eq!(passages.len(), 3);
        assert_eq!(passages[0].text, "Short intro.");
        assert_eq!(passages[1].text, long_sentence);
        assert!(passages[1].token_count > 10);
        // No overlap seeded out of the oversized passage.
        assert_eq!(passages[2].text, "Short outro.");
    }

    #[test]
    fn test_ids_encode_segment_and_sequence() {
        let refiner = refiner(200, 3);
        let passages = refiner.refine(&[
            "Passage from segment zero.".to_string(),
            "Passage from segment one.".to_string(),
        ]);
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].id, "passage-0-0");
        assert_eq!(passages[1].id, "passage-1-1");
        assert_eq!(passages[1].source_index, 1);
        assert_eq!(passages[1].order, 1);
    }

    #[test]
    fn test_token_counts_are_positive() {
        let refiner = refiner(200, 3);
        let passages = refiner.refine(&["Counting tokens is not free.".to_string()]);
        assert_eq!(passages.len(), 1);
        assert!(passages[0].token_count > 0);
    }
}
