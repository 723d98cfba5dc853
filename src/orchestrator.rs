//! Pipeline orchestrator for Lesa.
//!
//! Coordinates the entire process from text extraction to indexing, and
//! serves queries against the resulting per-document indexes.

use crate::chunking::{ChunkRefiner, RefinerConfig};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{LesaError, Result};
use crate::extract::{split_segments, PlainTextExtractor, TextExtractor};
use crate::generation::{Generator, OpenAIGenerator};
use crate::pipeline::{EmbeddingJob, EmbeddingPipeline};
use crate::rag::{AnswerSynthesizer, SynthesizedAnswer};
use crate::retrieval::{expand_query, Retrieval, RetrievalEngine};
use crate::store::{
    DocumentMetadata, DocumentSummary, EmbeddingJobStatus, FileRepository, MemoryRepository,
    VectorRepository,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The main orchestrator for the Lesa pipeline.
pub struct Orchestrator {
    settings: Settings,
    extractor: Arc<dyn TextExtractor>,
    refiner: ChunkRefiner,
    repository: Arc<dyn VectorRepository>,
    pipeline: EmbeddingPipeline,
    engine: RetrievalEngine,
    synthesizer: AnswerSynthesizer,
}

impl Orchestrator {
    /// Create a new orchestrator from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));

        let generator: Arc<dyn Generator> = Arc::new(OpenAIGenerator::new(
            &settings.rag.model,
            settings.rag.max_answer_tokens,
        ));

        let repository: Arc<dyn VectorRepository> = match settings.store.provider.as_str() {
            "memory" => Arc::new(MemoryRepository::new()),
            _ => Arc::new(FileRepository::new(settings.vector_dir())?),
        };

        Self::with_components(
            settings,
            prompts,
            Arc::new(PlainTextExtractor::new()),
            embedder,
            generator,
            repository,
        )
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        repository: Arc<dyn VectorRepository>,
    ) -> Result<Self> {
        let refiner = ChunkRefiner::new(RefinerConfig {
            max_tokens: settings.chunking.max_tokens,
            overlap: settings.chunking.overlap,
        })?;

        let pipeline = EmbeddingPipeline::new(
            Arc::clone(&embedder),
            Arc::clone(&repository),
            settings.embedding.batch_size,
        );

        let engine = RetrievalEngine::new(embedder);
        let synthesizer = AnswerSynthesizer::new(generator, prompts);

        Ok(Self {
            settings,
            extractor,
            refiner,
            repository,
            pipeline,
            engine,
            synthesizer,
        })
    }

    /// Get a reference to the repository.
    pub fn repository(&self) -> Arc<dyn VectorRepository> {
        Arc::clone(&self.repository)
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ingest a document: extract text, refine into passages, store
    /// metadata, and start the embedding job as a background task.
    ///
    /// The returned job handle can be polled, awaited, or aborted. A second
    /// ingestion for the same document id while a job is running is rejected.
    #[instrument(skip(self, metadata), fields(path = %path.display()))]
    pub async fn ingest(&self, path: &Path, metadata: DocumentMetadata) -> Result<IngestResult> {
        let document_id = uuid::Uuid::new_v4().to_string();

        let Some(text) = self.extractor.extract(path)? else {
            warn!("No text extracted from {}", path.display());
            return Ok(IngestResult {
                document_id,
                passage_count: 0,
                job: None,
                warning: Some(
                    "No text extracted — the document may be scanned or image-based".to_string(),
                ),
            });
        };

        let segments = split_segments(&text, self.settings.extraction.segment_chars);
        let passages = self.refiner.refine(&segments);
        info!(
            "Refined {} segments into {} passages",
            segments.len(),
            passages.len()
        );

        if !metadata.is_empty() {
            self.repository
                .write_metadata(&document_id, &metadata)
                .await?;
        }

        let passage_count = passages.len();
        let job = self.pipeline.spawn(document_id.clone(), passages)?;

        Ok(IngestResult {
            document_id,
            passage_count,
            job: Some(job),
            warning: None,
        })
    }

    /// Answer a question from a document's content.
    #[instrument(skip(self, summary_hint), fields(document_id = %document_id, question = %question))]
    pub async fn ask(
        &self,
        document_id: &str,
        question: &str,
        top_k: usize,
        summary_hint: Option<&str>,
    ) -> Result<SynthesizedAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(LesaError::InvalidInput(
                "Question must not be empty".to_string(),
            ));
        }
        if document_id.trim().is_empty() {
            return Err(LesaError::InvalidInput(
                "Document id must not be empty".to_string(),
            ));
        }
        let top_k = top_k.max(1);

        let metadata = self.repository.read_metadata(document_id).await?;

        // Metadata fast path: document-level questions answered with no
        // retrieval or generation call.
        if let Some(meta) = &metadata {
            if let Some(answer) = AnswerSynthesizer::metadata_answer(question, meta) {
                return Ok(answer);
            }
        }

        let records = self.repository.read_all(document_id).await?;
        let retrieval_query = expand_query(question);
        let retrieval = self
            .engine
            .retrieve(&records, question, &retrieval_query, top_k)
            .await;

        self.synthesizer
            .answer(question, &retrieval, &records, metadata.as_ref(), summary_hint)
            .await
    }

    /// Rank a document's passages against a query without generating an
    /// answer.
    pub async fn search(&self, document_id: &str, query: &str, top_k: usize) -> Result<Retrieval> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LesaError::InvalidInput("Query must not be empty".to_string()));
        }

        let records = self.repository.read_all(document_id).await?;
        if records.is_empty() {
            return Err(LesaError::DocumentNotFound(format!(
                "No vectors found for document {}",
                document_id
            )));
        }

        Ok(self.engine.retrieve(&records, query, query, top_k).await)
    }

    /// Generate a 5-bullet summary of a document.
    pub async fn summarize(&self, document_id: &str) -> Result<String> {
        let records = self.repository.read_all(document_id).await?;
        if records.is_empty() {
            return Err(LesaError::DocumentNotFound(format!(
                "No vectors found for document {}",
                document_id
            )));
        }
        self.synthesizer.summarize(&records).await
    }

    /// Read a document's embedding job status.
    pub async fn status(&self, document_id: &str) -> Result<EmbeddingJobStatus> {
        match self.repository.read_status(document_id).await? {
            Some(status) => Ok(status),
            None => Err(LesaError::DocumentNotFound(format!(
                "No embedding job found for document {}",
                document_id
            ))),
        }
    }

    /// Delete all artifacts for a document. Index, status, and metadata go
    /// together. Refused while an embedding job is running.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        if self.pipeline.registry().is_active(document_id) {
            return Err(LesaError::JobInProgress(document_id.to_string()));
        }
        self.repository.delete(document_id).await
    }

    /// List all indexed documents.
    pub async fn list(&self) -> Result<Vec<DocumentSummary>> {
        self.repository.list_documents().await
    }
}

/// Result of ingesting a document.
pub struct IngestResult {
    /// Assigned document id.
    pub document_id: String,
    /// Number of refined passages queued for embedding.
    pub passage_count: usize,
    /// Handle to the background embedding job; `None` when nothing was
    /// extractable.
    pub job: Option<EmbeddingJob>,
    /// Non-fatal ingestion warning.
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JobState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embedder producing deterministic unit vectors from text length.
    struct StubEmbedder {
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self.embed_batch(&[text.to_string()]).await?.remove(0))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let x = (t.len() % 7) as f32 + 1.0;
                    vec![x, 1.0, 0.5]
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct StubGenerator {
        calls: AtomicUsize,
    }

    impl StubGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate(&self, _system: &str, user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("stub answer for: {}", user.len()))
        }
    }

    fn test_orchestrator(
        embedder: Arc<StubEmbedder>,
        generator: Arc<StubGenerator>,
    ) -> Orchestrator {
        Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(PlainTextExtractor::new()),
            embedder,
            generator,
            Arc::new(MemoryRepository::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_and_ask_end_to_end() {
        let embedder = Arc::new(StubEmbedder::new());
        let generator = Arc::new(StubGenerator::new());
        let orchestrator = test_orchestrator(embedder.clone(), generator.clone());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(
            &path,
            "Glaciers move slowly under their own weight. Ice crystals deform and slide. \
             Meltwater lubricates the base. Crevasses open where stress exceeds strength.",
        )
        .unwrap();

        let result = orchestrator
            .ingest(&path, DocumentMetadata::default())
            .await
            .unwrap();
        assert!(result.warning.is_none());
        assert!(result.passage_count > 0);

        let indexed = result.job.unwrap().wait().await.unwrap();
        assert_eq!(indexed, result.passage_count);

        let status = orchestrator.status(&result.document_id).await.unwrap();
        assert_eq!(status.state, JobState::Done);
        assert_eq!(status.processed, status.total);

        let answer = orchestrator
            .ask(&result.document_id, "How do glaciers move?", 5, None)
            .await
            .unwrap();
        assert!(answer.answer.starts_with("stub answer"));
        assert!(!answer.context.is_empty());
    }

    #[tokio::test]
    async fn test_ask_validation() {
        let orchestrator =
            test_orchestrator(Arc::new(StubEmbedder::new()), Arc::new(StubGenerator::new()));

        let err = orchestrator.ask("doc", "   ", 5, None).await.unwrap_err();
        assert!(matches!(err, LesaError::InvalidInput(_)));

        let err = orchestrator.ask("", "question?", 5, None).await.unwrap_err();
        assert!(matches!(err, LesaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_metadata_fast_path_makes_no_provider_calls() {
        let embedder = Arc::new(StubEmbedder::new());
        let generator = Arc::new(StubGenerator::new());
        let orchestrator = test_orchestrator(embedder.clone(), generator.clone());

        orchestrator
            .repository()
            .write_metadata(
                "doc1",
                &DocumentMetadata {
                    author: Some("J. Doe".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let answer = orchestrator
            .ask("doc1", "Who is the author?", 5, None)
            .await
            .unwrap();

        assert_eq!(answer.answer, "J. Doe");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ingest_without_text_warns_and_starts_no_job() {
        let orchestrator =
            test_orchestrator(Arc::new(StubEmbedder::new()), Arc::new(StubGenerator::new()));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "   ").unwrap();

        let result = orchestrator
            .ingest(&path, DocumentMetadata::default())
            .await
            .unwrap();
        assert!(result.job.is_none());
        assert!(result.warning.is_some());
        assert_eq!(result.passage_count, 0);
    }

    #[tokio::test]
    async fn test_search_unknown_document_is_not_found() {
        let orchestrator =
            test_orchestrator(Arc::new(StubEmbedder::new()), Arc::new(StubGenerator::new()));

        let err = orchestrator.search("missing", "query", 5).await.unwrap_err();
        assert!(matches!(err, LesaError::DocumentNotFound(_)));

        let err = orchestrator.status("missing").await.unwrap_err();
        assert!(matches!(err, LesaError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let orchestrator =
            test_orchestrator(Arc::new(StubEmbedder::new()), Arc::new(StubGenerator::new()));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "Some content to index. More content follows.").unwrap();

        let result = orchestrator
            .ingest(&path, DocumentMetadata::default())
            .await
            .unwrap();
        result.job.unwrap().wait().await.unwrap();

        orchestrator.delete(&result.document_id).await.unwrap();
        let err = orchestrator.status(&result.document_id).await.unwrap_err();
        assert!(matches!(err, LesaError::DocumentNotFound(_)));
    }
}
