//! Vector repository abstraction for Lesa.
//!
//! Provides a trait-based interface over per-document vector, status, and
//! metadata artifacts, with a file-backed and an in-memory backend.

mod file;
mod memory;

pub use file::FileRepository;
pub use memory::MemoryRepository;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// A passage paired with its embedding, stored in the vector index.
///
/// Records are append-only and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Passage id.
    pub id: String,
    /// Passage text.
    pub text: String,
    /// L2-normalized embedding vector.
    pub embedding: Vec<f32>,
}

/// State of an embedding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Processing,
    Done,
    Error,
}

/// Progress of a document's embedding job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingJobStatus {
    pub document_id: String,
    /// Total passages in the job.
    pub total: usize,
    /// Passages embedded so far. Monotonically non-decreasing, never above total.
    pub processed: usize,
    pub state: JobState,
    pub error: Option<String>,
}

impl EmbeddingJobStatus {
    /// Create a fresh status at job start.
    pub fn new(document_id: impl Into<String>, total: usize) -> Self {
        Self {
            document_id: document_id.into(),
            total,
            processed: 0,
            state: JobState::Processing,
            error: None,
        }
    }

    /// Record progress. Ignored once the job is terminal; progress never
    /// moves backwards or past the total.
    pub fn set_processed(&mut self, processed: usize) {
        if self.is_terminal() {
            return;
        }
        self.processed = processed.max(self.processed).min(self.total);
    }

    /// Transition to `Done`. No-op once terminal.
    pub fn complete(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.processed = self.total;
        self.state = JobState::Done;
    }

    /// Transition to `Error` with a message. No-op once terminal.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.state = JobState::Error;
        self.error = Some(message.into());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobState::Done | JobState::Error)
    }
}

/// Externally populated document metadata. Read-only to the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub toc: Vec<String>,
}

impl DocumentMetadata {
    /// Whether any field is populated.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.toc.is_empty()
    }
}

/// Summary information about an indexed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub title: Option<String>,
    pub passage_count: usize,
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector repository implementations.
///
/// One set of artifacts (records, status, metadata) exists per document id;
/// `delete` removes them all together.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Append records for a document. Returns the number appended.
    async fn append(&self, document_id: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Read an isolated snapshot of a document's records, unaffected by
    /// subsequent appends. An unknown document yields an empty snapshot.
    async fn read_all(&self, document_id: &str) -> Result<Vec<VectorRecord>>;

    /// Read a document's job status.
    ///
    /// `None` means the job never started. An artifact that exists but cannot
    /// be read back (a writer may be mid-update) is reported as `Processing`
    /// rather than an error.
    async fn read_status(&self, document_id: &str) -> Result<Option<EmbeddingJobStatus>>;

    /// Persist a document's job status.
    async fn write_status(&self, status: &EmbeddingJobStatus) -> Result<()>;

    /// Read a document's metadata.
    async fn read_metadata(&self, document_id: &str) -> Result<Option<DocumentMetadata>>;

    /// Persist a document's metadata.
    async fn write_metadata(&self, document_id: &str, metadata: &DocumentMetadata) -> Result<()>;

    /// Remove all persisted artifacts for a document.
    async fn delete(&self, document_id: &str) -> Result<()>;

    /// List all indexed documents, most recently indexed first.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;
}

/// Per-document handle over a repository.
#[derive(Clone)]
pub struct VectorIndex {
    repository: Arc<dyn VectorRepository>,
    document_id: String,
}

impl VectorIndex {
    pub fn new(repository: Arc<dyn VectorRepository>, document_id: impl Into<String>) -> Self {
        Self {
            repository,
            document_id: document_id.into(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Append records, skipping any whose dimensionality differs from the
    /// index's established dimensionality. Returns the number appended.
    pub async fn append(&self, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let established = self.dimension().await?;
        let expected = if established != 0 {
            established
        } else {
            records[0].embedding.len()
        };

        let (keep, skipped): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| r.embedding.len() == expected && expected != 0);

        if !skipped.is_empty() {
            warn!(
                document_id = %self.document_id,
                expected,
                skipped = skipped.len(),
                "skipping records with mismatched embedding dimensions"
            );
        }

        if keep.is_empty() {
            return Ok(0);
        }

        self.repository.append(&self.document_id, &keep).await
    }

    /// Snapshot all records for this document.
    pub async fn read_all(&self) -> Result<Vec<VectorRecord>> {
        self.repository.read_all(&self.document_id).await
    }

    /// The index's established dimensionality, 0 if empty.
    pub async fn dimension(&self) -> Result<usize> {
        let records = self.read_all().await?;
        Ok(records.first().map(|r| r.embedding.len()).unwrap_or(0))
    }

    /// Remove all persisted artifacts for this document.
    pub async fn delete(&self) -> Result<()> {
        self.repository.delete(&self.document_id).await
    }
}

/// Compute cosine similarity between two vectors.
///
/// The normalized dot product; range [-1, 1]. Mismatched lengths and zero
/// vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_symmetric_and_bounded() {
        let a = vec![0.3, -0.7, 0.2, 0.9];
        let b = vec![-0.5, 0.1, 0.8, 0.4];
        let ab = cosine_similarity(&a, &b);
        let ba = cosine_similarity(&b, &a);
        assert!((ab - ba).abs() < 1e-6);
        assert!((-1.0..=1.0).contains(&ab));
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_status_transitions_are_terminal() {
        let mut status = EmbeddingJobStatus::new("doc", 10);
        status.set_processed(4);
        assert_eq!(status.processed, 4);
        assert_eq!(status.state, JobState::Processing);

        status.complete();
        assert_eq!(status.state, JobState::Done);
        assert_eq!(status.processed, 10);

        // Terminal states admit no further transitions.
        status.fail("too late");
        assert_eq!(status.state, JobState::Done);
        assert!(status.error.is_none());

        let mut failed = EmbeddingJobStatus::new("doc", 10);
        failed.fail("provider exploded");
        assert_eq!(failed.state, JobState::Error);
        failed.complete();
        assert_eq!(failed.state, JobState::Error);
    }

    #[test]
    fn test_status_processed_is_monotonic_and_capped() {
        let mut status = EmbeddingJobStatus::new("doc", 5);
        status.set_processed(3);
        status.set_processed(1);
        assert_eq!(status.processed, 3);
        status.set_processed(99);
        assert_eq!(status.processed, 5);
    }

    #[tokio::test]
    async fn test_index_dimension_guard_skips_mismatched() {
        let repo: Arc<dyn VectorRepository> = Arc::new(MemoryRepository::new());
        let index = VectorIndex::new(repo, "doc");

        let appended = index
            .append(vec![
                VectorRecord {
                    id: "a".into(),
                    text: "first".into(),
                    embedding: vec![1.0, 0.0, 0.0],
                },
                VectorRecord {
                    id: "b".into(),
                    text: "wrong dims".into(),
                    embedding: vec![1.0, 0.0],
                },
            ])
            .await
            .unwrap();
        assert_eq!(appended, 1);

        // The established dimensionality now rejects a 2-dim record outright.
        let appended = index
            .append(vec![VectorRecord {
                id: "c".into(),
                text: "still wrong".into(),
                embedding: vec![0.0, 1.0],
            }])
            .await
            .unwrap();
        assert_eq!(appended, 0);

        assert_eq!(index.dimension().await.unwrap(), 3);
        assert_eq!(index.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_index_snapshot_is_isolated() {
        let repo: Arc<dyn VectorRepository> = Arc::new(MemoryRepository::new());
        let index = VectorIndex::new(repo, "doc");

        index
            .append(vec![VectorRecord {
                id: "a".into(),
                text: "first".into(),
                embedding: vec![1.0, 0.0],
            }])
            .await
            .unwrap();

        let snapshot = index.read_all().await.unwrap();

        index
            .append(vec![VectorRecord {
                id: "b".into(),
                text: "second".into(),
                embedding: vec![0.0, 1.0],
            }])
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(index.read_all().await.unwrap().len(), 2);
    }
}
