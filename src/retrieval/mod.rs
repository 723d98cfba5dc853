//! Multi-pass retrieval and ranking.
//!
//! Scores a document's passages against a query. The primary pass uses
//! vector similarity with the expanded retrieval query; a backoff pass
//! repeats with the plain query when confidence is low; lexical token
//! matching covers every case where vector scoring cannot run at all
//! (dimension mismatch, empty index, provider failure). Provider failures
//! degrade through the pass hierarchy rather than failing the request.

pub mod rules;

use crate::embedding::Embedder;
use crate::store::{cosine_similarity, VectorRecord};
use regex::Regex;
use rules::{apply_rules, RuleContext, ScoreRule};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};

/// Scores below this are treated as low-confidence retrieval.
pub const LOW_CONFIDENCE_SCORE: f32 = 0.55;

/// Ranked lists from different passes are merged on this text prefix.
const MERGE_KEY_CHARS: usize = 200;

/// Minimum character length of a lexical query token.
const LEXICAL_MIN_TOKEN_CHARS: usize = 4;

/// Maximum number of lexical query tokens considered.
const LEXICAL_MAX_TOKENS: usize = 12;

/// A passage scored against a query. Ephemeral, produced per query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub text: String,
    pub score: f32,
}

/// What the engine observed while ranking, for the caller to act on.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalDiagnostics {
    /// Best score in the final ranking, 0.0 when empty.
    pub top_score: f32,
    /// Dimensionality of the index, 0 if empty.
    pub index_dimension: usize,
    /// Dimensionality of the query embedding, 0 if none was obtained.
    pub query_dimension: usize,
    /// Whether vector scoring was skipped because dimensions differed.
    pub dimension_mismatch: bool,
}

/// Result of a retrieval run.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub passages: Vec<ScoredPassage>,
    pub diagnostics: RetrievalDiagnostics,
}

impl Retrieval {
    /// Whether the caller should consider synthesizing a summary instead of
    /// relying on the retrieved passages alone.
    pub fn is_low_confidence(&self) -> bool {
        self.passages.is_empty() || self.diagnostics.top_score < LOW_CONFIDENCE_SCORE
    }
}

/// Scores and ranks passages against a query.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    rules: Vec<ScoreRule>,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            rules: rules::default_rules(),
        }
    }

    /// Replace the heuristic rule list.
    pub fn with_rules(mut self, rules: Vec<ScoreRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Rank the document's records against the query, returning at most
    /// `top_k` passages plus diagnostics.
    #[instrument(skip(self, records, query, retrieval_query), fields(records = records.len()))]
    pub async fn retrieve(
        &self,
        records: &[VectorRecord],
        query: &str,
        retrieval_query: &str,
        top_k: usize,
    ) -> Retrieval {
        let index_dimension = records.first().map(|r| r.embedding.len()).unwrap_or(0);
        let mut query_dimension = 0usize;
        let mut dimension_mismatch = false;
        let mut vector_ran = false;
        let mut ranked: Vec<ScoredPassage> = Vec::new();

        if index_dimension != 0 {
            // Primary pass: the expanded retrieval query.
            match self.embedder.embed(retrieval_query).await {
                Ok(query_vec) => {
                    query_dimension = query_vec.len();
                    if query_dimension == index_dimension {
                        vector_ran = true;
                        ranked = self.rank_by_similarity(records, &query_vec, query, top_k);
                    } else {
                        dimension_mismatch = true;
                        debug!(
                            index_dimension,
                            query_dimension, "dimension mismatch, skipping vector scoring"
                        );
                    }
                }
                Err(e) => warn!("Primary retrieval embedding failed: {}", e),
            }

            // Backoff pass: the plain query, when confidence is low.
            let top = ranked.first().map(|p| p.score).unwrap_or(0.0);
            if !dimension_mismatch
                && (ranked.is_empty() || top < LOW_CONFIDENCE_SCORE)
                && query != retrieval_query
            {
                match self.embedder.embed(query).await {
                    Ok(query_vec) if query_vec.len() == index_dimension => {
                        vector_ran = true;
                        let second = self.rank_by_similarity(records, &query_vec, query, top_k);
                        ranked = merge_ranked(ranked, second, top_k);
                    }
                    Ok(_) => debug!("Backoff query embedding dimension mismatch, keeping primary ranking"),
                    Err(e) => warn!("Backoff retrieval embedding failed: {}", e),
                }
            }
        }

        // Lexical fallback whenever vector scoring could not run at all.
        if !vector_ran {
            ranked = self.rank_lexically(records, query, top_k);
        }

        let top_score = ranked.first().map(|p| p.score).unwrap_or(0.0);
        Retrieval {
            passages: ranked,
            diagnostics: RetrievalDiagnostics {
                top_score,
                index_dimension,
                query_dimension,
                dimension_mismatch,
            },
        }
    }

    /// Score every record by similarity plus heuristic deltas; stable-sort
    /// descending and truncate.
    fn rank_by_similarity(
        &self,
        records: &[VectorRecord],
        query_vec: &[f32],
        query: &str,
        top_k: usize,
    ) -> Vec<ScoredPassage> {
        let total = records.len();
        let mut scored: Vec<ScoredPassage> = records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                let base = cosine_similarity(query_vec, &record.embedding);
                let delta = apply_rules(
                    &self.rules,
                    &RuleContext {
                        query,
                        text: &record.text,
                        position,
                        total,
                    },
                );
                ScoredPassage {
                    text: record.text.clone(),
                    score: base + delta,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// Token-count scoring for when no query embedding is usable.
    fn rank_lexically(
        &self,
        records: &[VectorRecord],
        query: &str,
        top_k: usize,
    ) -> Vec<ScoredPassage> {
        let tokens = lexical_tokens(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let total = records.len();
        let mut hits: Vec<ScoredPassage> = records
            .iter()
            .enumerate()
            .filter_map(|(position, record)| {
                let text = record.text.to_lowercase();
                let count = tokens.iter().filter(|t| text.contains(t.as_str())).count();
                if count == 0 {
                    return None;
                }
                let delta = apply_rules(
                    &self.rules,
                    &RuleContext {
                        query,
                        text: &record.text,
                        position,
                        total,
                    },
                );
                Some(ScoredPassage {
                    text: record.text.clone(),
                    score: count as f32 + delta,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        hits
    }
}

/// Deduplicated, length-filtered, capped token set from a query.
fn lexical_tokens(query: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\b\w+\b").unwrap());

    let lowered = query.to_lowercase();
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for m in re.find_iter(&lowered) {
        let token = m.as_str();
        if token.chars().count() < LEXICAL_MIN_TOKEN_CHARS {
            continue;
        }
        if seen.insert(token.to_string()) {
            tokens.push(token.to_string());
            if tokens.len() >= LEXICAL_MAX_TOKENS {
                break;
            }
        }
    }

    tokens
}

/// Merge two ranked lists keyed by a fixed-length text prefix, keeping the
/// higher score per duplicate key.
fn merge_ranked(
    first: Vec<ScoredPassage>,
    second: Vec<ScoredPassage>,
    top_k: usize,
) -> Vec<ScoredPassage> {
    let mut merged: Vec<ScoredPassage> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for passage in first.into_iter().chain(second) {
        let key: String = passage.text.chars().take(MERGE_KEY_CHARS).collect();
        match by_key.get(&key) {
            Some(&i) => {
                if passage.score > merged[i].score {
                    merged[i].score = passage.score;
                }
            }
            None => {
                by_key.insert(key, merged.len());
                merged.push(passage);
            }
        }
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(top_k);
    merged
}

/// Expand a query with domain hint terms keyed off its apparent intent.
///
/// The original phrasing is kept; hint terms are appended so the retrieval
/// query stays usable as an embedding input.
pub fn expand_query(query: &str) -> String {
    static TITLE_OF_RE: OnceLock<Regex> = OnceLock::new();
    static BARE_TITLE_RE: OnceLock<Regex> = OnceLock::new();
    let title_of_re = TITLE_OF_RE
        .get_or_init(|| Regex::new(r"\bwhat('s| is)? the (title|name) of\b").unwrap());
    let bare_title_re = BARE_TITLE_RE.get_or_init(|| Regex::new(r"^\s*title\s*[?!]*\s*$").unwrap());

    let s = query.to_lowercase();
    let mut additions: Vec<&str> = Vec::new();

    // title / name
    if s.contains("title")
        || s.contains("name of the")
        || title_of_re.is_match(&s)
        || bare_title_re.is_match(&s)
    {
        additions.push(
            "title document title paper title front page heading name of paper heading title page",
        );
    }

    // authors / byline
    if s.contains("author")
        || s.contains("who wrote")
        || s.contains("written by")
        || s.contains("byline")
    {
        additions.push("author authors byline writer creator contributors affiliation");
    }

    // abstract / summary / what is this about
    if s.contains("abstract")
        || s.contains("summary")
        || s.contains("what is this about")
        || s.contains("what is this document about")
        || s.contains("purpose")
        || s.contains("objective")
        || s.contains("aim")
    {
        additions.push("abstract summary overview main takeaways key points");
    }

    // keywords
    if s.contains("keyword") {
        additions.push("keywords key words index terms subject headings");
    }

    // references / citations / bibliography
    if s.contains("reference") || s.contains("bibliography") || s.contains("citations") {
        additions.push("references bibliography citations works cited DOI list of references");
    }

    // requirements
    if s.contains("requirement") {
        additions.push("requirements functional requirements security requirements FR SR");
    }

    // small generic boost if nothing matched
    if additions.is_empty() {
        additions.push("summary key points details clauses title authors keywords references");
    }

    format!("{} {}", query, additions.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LesaError, Result};
    use async_trait::async_trait;

    /// Embedder returning canned vectors per input text.
    struct CannedEmbedder {
        responses: HashMap<String, Vec<f32>>,
        fail: bool,
    }

    impl CannedEmbedder {
        fn new(responses: Vec<(&str, Vec<f32>)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                responses: HashMap::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Embedder for CannedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail {
                return Err(LesaError::OpenAI("embedding provider down".to_string()));
            }
            self.responses
                .get(text)
                .cloned()
                .ok_or_else(|| LesaError::Embedding(format!("no canned vector for {:?}", text)))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    fn record(text: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: format!("id-{}", text.len()),
            text: text.to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_top_one_is_best_match() {
        let records = vec![
            record("about cats", vec![1.0, 0.0, 0.0]),
            record("about dogs", vec![0.0, 1.0, 0.0]),
            record("about fish", vec![0.0, 0.0, 1.0]),
        ];
        let embedder = CannedEmbedder::new(vec![("dogs", vec![0.0, 1.0, 0.0])]);
        let engine = RetrievalEngine::new(Arc::new(embedder));

        let result = engine.retrieve(&records, "dogs", "dogs", 1).await;
        assert_eq!(result.passages.len(), 1);
        assert_eq!(result.passages[0].text, "about dogs");
        assert!((result.diagnostics.top_score - 1.0).abs() < 1e-5);
        assert!(!result.diagnostics.dimension_mismatch);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_falls_back_to_lexical() {
        let records = vec![
            record("the mitochondria is the powerhouse", vec![1.0, 0.0, 0.0]),
            record("unrelated passage", vec![0.0, 1.0, 0.0]),
        ];
        // Query embedding has 2 dims against a 3-dim index.
        let embedder = CannedEmbedder::new(vec![("mitochondria powerhouse", vec![1.0, 0.0])]);
        let engine = RetrievalEngine::new(Arc::new(embedder));

        let result = engine
            .retrieve(
                &records,
                "mitochondria powerhouse",
                "mitochondria powerhouse",
                5,
            )
            .await;

        assert!(result.diagnostics.dimension_mismatch);
        assert_eq!(result.diagnostics.index_dimension, 3);
        assert_eq!(result.diagnostics.query_dimension, 2);
        // Lexical scoring found the matching passage only.
        assert_eq!(result.passages.len(), 1);
        assert_eq!(result.passages[0].text, "the mitochondria is the powerhouse");
        assert_eq!(result.passages[0].score, 2.0);
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_lexical() {
        let records = vec![record("retrieval engines score passages", vec![1.0, 0.0, 0.0])];
        let engine = RetrievalEngine::new(Arc::new(CannedEmbedder::failing()));

        let result = engine
            .retrieve(&records, "score passages", "score passages", 5)
            .await;

        assert_eq!(result.passages.len(), 1);
        assert!(result.passages[0].score >= 2.0);
    }

    #[tokio::test]
    async fn test_empty_index_yields_empty_result() {
        let engine = RetrievalEngine::new(Arc::new(CannedEmbedder::failing()));
        let result = engine.retrieve(&[], "anything", "anything", 5).await;
        assert!(result.passages.is_empty());
        assert_eq!(result.diagnostics.index_dimension, 0);
        assert_eq!(result.diagnostics.top_score, 0.0);
    }

    #[tokio::test]
    async fn test_backoff_pass_improves_low_confidence() {
        let records = vec![
            record("passage one", vec![1.0, 0.0, 0.0]),
            record("passage two", vec![0.0, 1.0, 0.0]),
        ];
        // The expanded query lands between clusters (low confidence); the
        // plain query nails passage two.
        let embedder = CannedEmbedder::new(vec![
            ("plain query expanded hints", vec![0.3, 0.3, 0.9]),
            ("plain query", vec![0.0, 1.0, 0.0]),
        ]);
        let engine = RetrievalEngine::new(Arc::new(embedder));

        let result = engine
            .retrieve(&records, "plain query", "plain query expanded hints", 2)
            .await;

        assert_eq!(result.passages[0].text, "passage two");
        assert!((result.diagnostics.top_score - 1.0).abs() < 1e-5);
        // Each passage appears exactly once after the merge.
        assert_eq!(result.passages.len(), 2);
    }

    #[test]
    fn test_merge_keeps_higher_score_per_key() {
        let first = vec![
            ScoredPassage {
                text: "shared passage".to_string(),
                score: 0.4,
            },
            ScoredPassage {
                text: "only in first".to_string(),
                score: 0.3,
            },
        ];
        let second = vec![ScoredPassage {
            text: "shared passage".to_string(),
            score: 0.8,
        }];

        let merged = merge_ranked(first, second, 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text, "shared passage");
        assert!((merged[0].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_lexical_tokens_filtered_and_capped() {
        let tokens = lexical_tokens("the cat sat on a mat with some longwords and more longwords");
        assert!(tokens.iter().all(|t| t.chars().count() >= 4));
        assert!(!tokens.contains(&"cat".to_string()));
        // Dedup: "longwords" appears once.
        assert_eq!(tokens.iter().filter(|t| t.as_str() == "longwords").count(), 1);

        let many = lexical_tokens(
            "alpha1 bravo2 charlie3 delta4 echo5 foxtrot6 golf7 hotel8 india9 juliet10 kilo11 lima12 mike13 november14",
        );
        assert_eq!(many.len(), LEXICAL_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_ties_preserve_record_order() {
        let records = vec![
            record("first tied", vec![0.0, 0.0, 1.0]),
            record("second tied", vec![0.0, 0.0, 1.0]),
            record("third tied", vec![0.0, 0.0, 1.0]),
        ];
        let embedder = CannedEmbedder::new(vec![("tie", vec![0.0, 0.0, 1.0])]);
        let engine = RetrievalEngine::new(Arc::new(embedder));

        let result = engine.retrieve(&records, "tie", "tie", 3).await;
        let texts: Vec<&str> = result.passages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["first tied", "second tied", "third tied"]);
    }

    #[test]
    fn test_expand_query_title_intent() {
        let expanded = expand_query("What is the title of this paper?");
        assert!(expanded.starts_with("What is the title of this paper?"));
        assert!(expanded.contains("front page heading"));
    }

    #[test]
    fn test_expand_query_generic_hint() {
        let expanded = expand_query("how does backpropagation work");
        assert!(expanded.contains("summary key points details"));
    }
}
