//! File-backed vector repository.
//!
//! Each document owns three JSON artifacts under the store root: records at
//! `<id>.json`, job status at `status/<id>.json`, and metadata at
//! `metadata/<id>.json`. Every update rewrites the artifact through a
//! temporary file in the same directory followed by an atomic rename, so a
//! concurrent reader observes either the previous or the new content in full,
//! never a torn write. A partially built index stays queryable while its
//! embedding job is running, and process death leaves the last published
//! state intact.

use super::{
    DocumentMetadata, DocumentSummary, EmbeddingJobStatus, VectorRecord, VectorRepository,
};
use crate::error::{LesaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const STATUS_DIR: &str = "status";
const METADATA_DIR: &str = "metadata";

/// File-backed vector repository using atomic write-replace.
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    /// Create a repository rooted at the given directory.
    #[instrument(skip_all)]
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(STATUS_DIR))?;
        std::fs::create_dir_all(root.join(METADATA_DIR))?;
        info!("Initialized file vector store at {:?}", root);
        Ok(Self { root })
    }

    fn vectors_path(&self, document_id: &str) -> Result<PathBuf> {
        Ok(self.root.join(format!("{}.json", artifact_name(document_id)?)))
    }

    fn status_path(&self, document_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(STATUS_DIR)
            .join(format!("{}.json", artifact_name(document_id)?)))
    }

    fn metadata_path(&self, document_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(METADATA_DIR)
            .join(format!("{}.json", artifact_name(document_id)?)))
    }

    /// Write bytes to a temporary file in the target's directory, then
    /// atomically publish it over the target. Same volume, so the rename is a
    /// single atomic replace.
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| LesaError::Persistence(format!("No parent dir for {:?}", path)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| LesaError::Persistence(format!("Failed to create temp file: {}", e)))?;
        tmp.write_all(bytes)
            .map_err(|e| LesaError::Persistence(format!("Failed to write temp file: {}", e)))?;
        tmp.persist(path)
            .map_err(|e| LesaError::Persistence(format!("Failed to publish {:?}: {}", path, e)))?;

        Ok(())
    }

    fn load_records(&self, document_id: &str) -> Result<Vec<VectorRecord>> {
        let path = self.vectors_path(document_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl VectorRepository for FileRepository {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn append(&self, document_id: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut all = self.load_records(document_id)?;
        all.extend_from_slice(records);

        let path = self.vectors_path(document_id)?;
        let bytes = serde_json::to_vec(&all)?;
        Self::write_atomic(&path, &bytes)?;

        debug!("Appended {} records for document {}", records.len(), document_id);
        Ok(records.len())
    }

    async fn read_all(&self, document_id: &str) -> Result<Vec<VectorRecord>> {
        self.load_records(document_id)
    }

    async fn read_status(&self, document_id: &str) -> Result<Option<EmbeddingJobStatus>> {
        let path = self.status_path(document_id)?;
        if !path.exists() {
            return Ok(None);
        }

        // An unreadable or unparsable artifact means a writer may be
        // mid-update: report the job as processing, never as missing.
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Status read failed for {}: {}", document_id, e);
                return Ok(Some(EmbeddingJobStatus::new(document_id, 0)));
            }
        };

        match serde_json::from_str(&raw) {
            Ok(status) => Ok(Some(status)),
            Err(e) => {
                debug!("Status parse failed for {}: {}", document_id, e);
                Ok(Some(EmbeddingJobStatus::new(document_id, 0)))
            }
        }
    }

    async fn write_status(&self, status: &EmbeddingJobStatus) -> Result<()> {
        let path = self.status_path(&status.document_id)?;
        let bytes = serde_json::to_vec_pretty(status)?;
        Self::write_atomic(&path, &bytes)
    }

    async fn read_metadata(&self, document_id: &str) -> Result<Option<DocumentMetadata>> {
        let path = self.metadata_path(document_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn write_metadata(&self, document_id: &str, metadata: &DocumentMetadata) -> Result<()> {
        let path = self.metadata_path(document_id)?;
        let bytes = serde_json::to_vec_pretty(metadata)?;
        Self::write_atomic(&path, &bytes)
    }

    #[instrument(skip(self))]
    async fn delete(&self, document_id: &str) -> Result<()> {
        let paths = [
            self.vectors_path(document_id)?,
            self.status_path(document_id)?,
            self.metadata_path(document_id)?,
        ];

        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!("Deleted artifacts for document {}", document_id);
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let mut summaries = Vec::new();

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(document_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let records: Vec<VectorRecord> = match std::fs::read_to_string(&path)
                .map_err(LesaError::from)
                .and_then(|raw| serde_json::from_str(&raw).map_err(LesaError::from))
            {
                Ok(records) => records,
                Err(e) => {
                    warn!("Skipping unreadable vector file {:?}: {}", path, e);
                    continue;
                }
            };

            let title = self
                .read_metadata(document_id)
                .await
                .ok()
                .flatten()
                .and_then(|m| m.title);

            let indexed_at: DateTime<Utc> = entry
                .metadata()?
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());

            summaries.push(DocumentSummary {
                document_id: document_id.to_string(),
                title,
                passage_count: records.len(),
                indexed_at,
            });
        }

        summaries.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        Ok(summaries)
    }
}

/// Validate a document id for use as an artifact file name.
fn artifact_name(document_id: &str) -> Result<&str> {
    if document_id.is_empty()
        || document_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '.')
    {
        return Err(LesaError::InvalidInput(format!(
            "Invalid document id: {:?}",
            document_id
        )));
    }
    Ok(document_id)
}
