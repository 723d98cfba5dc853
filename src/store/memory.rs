//! In-memory vector repository.
//!
//! Useful for testing and ephemeral sessions. Snapshot semantics match the
//! file backend: readers get isolated copies.

use super::{
    DocumentMetadata, DocumentSummary, EmbeddingJobStatus, VectorRecord, VectorRepository,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct DocumentEntry {
    records: Vec<VectorRecord>,
    status: Option<EmbeddingJobStatus>,
    metadata: Option<DocumentMetadata>,
    indexed_at: Option<DateTime<Utc>>,
}

/// In-memory vector repository.
pub struct MemoryRepository {
    documents: RwLock<HashMap<String, DocumentEntry>>,
}

impl MemoryRepository {
    /// Create a new in-memory repository.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorRepository for MemoryRepository {
    async fn append(&self, document_id: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut docs = self.documents.write().unwrap();
        let entry = docs.entry(document_id.to_string()).or_default();
        entry.records.extend_from_slice(records);
        entry.indexed_at = Some(Utc::now());
        Ok(records.len())
    }

    async fn read_all(&self, document_id: &str) -> Result<Vec<VectorRecord>> {
        let docs = self.documents.read().unwrap();
        Ok(docs
            .get(document_id)
            .map(|entry| entry.records.clone())
            .unwrap_or_default())
    }

    async fn read_status(&self, document_id: &str) -> Result<Option<EmbeddingJobStatus>> {
        let docs = self.documents.read().unwrap();
        Ok(docs.get(document_id).and_then(|entry| entry.status.clone()))
    }

    async fn write_status(&self, status: &EmbeddingJobStatus) -> Result<()> {
        let mut docs = self.documents.write().unwrap();
        let entry = docs.entry(status.document_id.clone()).or_default();
        entry.status = Some(status.clone());
        Ok(())
    }

    async fn read_metadata(&self, document_id: &str) -> Result<Option<DocumentMetadata>> {
        let docs = self.documents.read().unwrap();
        Ok(docs.get(document_id).and_then(|entry| entry.metadata.clone()))
    }

    async fn write_metadata(&self, document_id: &str, metadata: &DocumentMetadata) -> Result<()> {
        let mut docs = self.documents.write().unwrap();
        let entry = docs.entry(document_id.to_string()).or_default();
        entry.metadata = Some(metadata.clone());
        Ok(())
    }

    async fn delete(&self, document_id: &str) -> Result<()> {
        let mut docs = self.documents.write().unwrap();
        docs.remove(document_id);
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let docs = self.documents.read().unwrap();

        let mut summaries: Vec<DocumentSummary> = docs
            .iter()
            .filter(|(_, entry)| !entry.records.is_empty())
            .map(|(document_id, entry)| DocumentSummary {
                document_id: document_id.clone(),
                title: entry.metadata.as_ref().and_then(|m| m.title.clone()),
                passage_count: entry.records.len(),
                indexed_at: entry.indexed_at.unwrap_or_else(Utc::now),
            })
            .collect();

        summaries.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        Ok(summaries)
    }
}
