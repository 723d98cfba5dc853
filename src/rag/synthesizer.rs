//! Answer synthesis.
//!
//! The synthesizer answers document-level intent questions straight from
//! metadata, grounds the generative provider in retrieved context, and
//! collapses inconsistent model hedging into one canonical fallback.

use super::context::{build_context, safe_snippet};
use crate::config::Prompts;
use crate::error::{LesaError, Result};
use crate::generation::Generator;
use crate::retrieval::{Retrieval, ScoredPassage};
use crate::store::{DocumentMetadata, VectorRecord};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument, warn};

/// Canonical user-facing answer when the document does not contain one.
pub const FALLBACK_ANSWER: &str = "I couldn't find that information in the uploaded document. \
     Could you try rephrasing your question or check a different document?";

/// Hedging phrases that get replaced by the canonical contract.
const HEDGING_PHRASES: &[&str] = &[
    "i don't know",
    "i do not know",
    "i'm not sure",
    "sorry, i don't know",
    "i cannot find",
];

/// Character cap per passage sampled into a summary prompt.
const SUMMARY_SNIPPET_CHARS: usize = 1000;

/// A final answer with the context that grounded it.
#[derive(Debug, Clone)]
pub struct SynthesizedAnswer {
    pub answer: String,
    pub context: Vec<ScoredPassage>,
}

/// Generates grounded answers and summaries.
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    prompts: Prompts,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>, prompts: Prompts) -> Self {
        Self { generator, prompts }
    }

    /// Answer document-level intent questions (title, author, TOC) directly
    /// from metadata, with no retrieval or generation.
    pub fn metadata_answer(
        query: &str,
        metadata: &DocumentMetadata,
    ) -> Option<SynthesizedAnswer> {
        static AUTHOR_RE: OnceLock<Regex> = OnceLock::new();
        static TITLE_RE: OnceLock<Regex> = OnceLock::new();
        static TOC_RE: OnceLock<Regex> = OnceLock::new();

        let author_re = AUTHOR_RE.get_or_init(|| {
            Regex::new(r"(?i)\b(author|who wrote|written by|who is the author|author name|writer)\b")
                .unwrap()
        });
        let title_re = TITLE_RE
            .get_or_init(|| Regex::new(r"(?i)\b(title|what is the title|book title)\b").unwrap());
        let toc_re = TOC_RE.get_or_init(|| {
            Regex::new(r"(?i)\b(chapter|chapters|table of contents|contents|list chapters)\b")
                .unwrap()
        });

        if let Some(author) = &metadata.author {
            if author_re.is_match(query) {
                return Some(SynthesizedAnswer {
                    answer: author.clone(),
                    context: vec![ScoredPassage {
                        text: format!("Author: {}", author),
                        score: 1.0,
                    }],
                });
            }
        }

        if let Some(title) = &metadata.title {
            if title_re.is_match(query) {
                return Some(SynthesizedAnswer {
                    answer: title.clone(),
                    context: vec![ScoredPassage {
                        text: format!("Title: {}", title),
                        score: 1.0,
                    }],
                });
            }
        }

        if !metadata.toc.is_empty() && toc_re.is_match(query) {
            let toc_text = metadata.toc.join("\n");
            return Some(SynthesizedAnswer {
                answer: format!("Chapters / TOC (extracted):\n{}", toc_text),
                context: vec![ScoredPassage {
                    text: toc_text,
                    score: 1.0,
                }],
            });
        }

        None
    }

    /// Produce a grounded answer for a question given its retrieval result.
    ///
    /// When retrieval confidence is low, a short summary is synthesized once
    /// from passages spread across the document, added to the context, and
    /// kept as a possible final-answer substitute. Never returns a raw
    /// "no answer" error: provider failure resolves to the canonical
    /// fallback text.
    #[instrument(skip_all, fields(question = %question))]
    pub async fn answer(
        &self,
        question: &str,
        retrieval: &Retrieval,
        records: &[VectorRecord],
        metadata: Option<&DocumentMetadata>,
        summary_hint: Option<&str>,
    ) -> Result<SynthesizedAnswer> {
        let mut synthesized: Option<String> = None;
        if retrieval.is_low_confidence() && !records.is_empty() {
            debug!(
                top_score = retrieval.diagnostics.top_score,
                "low retrieval confidence, synthesizing summary"
            );
            match self.summarize(records).await {
                Ok(summary) => synthesized = Some(summary),
                Err(e) => warn!("Low-confidence summarization failed: {}", e),
            }
        }

        let context_text = build_context(
            summary_hint,
            synthesized.as_deref(),
            &retrieval.passages,
            metadata,
        );

        let mut vars = HashMap::new();
        vars.insert("fallback".to_string(), FALLBACK_ANSWER.to_string());
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context_text.clone());

        let (system_template, user_template) = if context_text.is_empty() {
            (&self.prompts.rag.system_no_context, &self.prompts.rag.user_no_context)
        } else {
            (&self.prompts.rag.system, &self.prompts.rag.user)
        };

        let system = self.prompts.render_with_custom(system_template, &vars);
        let user = self.prompts.render_with_custom(user_template, &vars);

        let answer = match self.generator.generate(&system, &user).await {
            Ok(raw) => normalize_answer(&raw, synthesized.as_deref()),
            Err(e) => {
                warn!("Answer generation failed, falling back: {}", e);
                synthesized.unwrap_or_else(|| FALLBACK_ANSWER.to_string())
            }
        };

        info!("Answered with {} context passages", retrieval.passages.len());

        Ok(SynthesizedAnswer {
            answer,
            context: retrieval.passages.clone(),
        })
    }

    /// Generate a short factual summary from passages sampled across the
    /// document (first, ~1/3, ~2/3, last).
    pub async fn summarize(&self, records: &[VectorRecord]) -> Result<String> {
        if records.is_empty() {
            return Err(LesaError::InvalidInput(
                "No indexed passages to summarize".to_string(),
            ));
        }

        let context: String = spread_indices(records.len())
            .into_iter()
            .map(|i| safe_snippet(&records[i].text, SUMMARY_SNIPPET_CHARS))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut vars = HashMap::new();
        vars.insert("context".to_string(), context);

        let system = self
            .prompts
            .render_with_custom(&self.prompts.summary.system, &HashMap::new());
        let user = self
            .prompts
            .render_with_custom(&self.prompts.summary.user, &vars);

        self.generator.generate(&system, &user).await
    }
}

/// Replace hedging answers with the synthesized summary when one exists,
/// otherwise with the canonical fallback text.
pub fn normalize_answer(answer: &str, synthesized_summary: Option<&str>) -> String {
    let lower = answer.to_lowercase();
    if HEDGING_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return match synthesized_summary {
            Some(summary) => summary.to_string(),
            None => FALLBACK_ANSWER.to_string(),
        };
    }
    answer.to_string()
}

/// Indices sampling a document at its start, thirds, and end.
fn spread_indices(len: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut indices = vec![0, len / 3, (2 * len) / 3, len - 1];
    indices.sort_unstable();
    indices.dedup();
    indices
}
