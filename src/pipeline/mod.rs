//! Incremental, crash-safe embedding pipeline.
//!
//! Turns refined passages into vector records batch by batch. After every
//! batch the new records and an updated job status are published through the
//! repository's atomic write-replace, so the partially built index is
//! queryable while the job runs and survives a crash mid-batch. A batch
//! failure terminates the job as `Error` without discarding records already
//! persisted from earlier batches.
//!
//! Exactly one pipeline run per document id is enforced through a
//! process-wide job registry; a second concurrent request is rejected.

use crate::chunking::Passage;
use crate::embedding::{l2_normalize, Embedder};
use crate::error::{LesaError, Result};
use crate::store::{EmbeddingJobStatus, VectorIndex, VectorRecord, VectorRepository};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Tracks which documents have an embedding job in flight.
pub struct JobRegistry {
    active: Mutex<HashSet<String>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Atomically check-and-set the in-progress flag for a document.
    ///
    /// Returns a claim that releases the flag when dropped, or
    /// `JobInProgress` if another run already holds it.
    pub fn claim(self: &Arc<Self>, document_id: &str) -> Result<JobClaim> {
        let mut active = self.active.lock().unwrap();
        if !active.insert(document_id.to_string()) {
            return Err(LesaError::JobInProgress(document_id.to_string()));
        }
        Ok(JobClaim {
            registry: Arc::clone(self),
            document_id: document_id.to_string(),
        })
    }

    /// Whether a document currently has a job in flight.
    pub fn is_active(&self, document_id: &str) -> bool {
        self.active.lock().unwrap().contains(document_id)
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds a document's in-progress flag for the duration of a run.
pub struct JobClaim {
    registry: Arc<JobRegistry>,
    document_id: String,
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .unwrap()
            .remove(&self.document_id);
    }
}

/// Handle to a background embedding job.
///
/// The caller can poll progress through the persisted status, await
/// completion, or abort the task.
#[derive(Debug)]
pub struct EmbeddingJob {
    document_id: String,
    handle: JoinHandle<Result<usize>>,
}

impl EmbeddingJob {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Whether the background task has finished (successfully or not).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the background task. Records and status already published stay
    /// as they are.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the job to finish, returning the number of passages embedded.
    pub async fn wait(self) -> Result<usize> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                Err(LesaError::Embedding("Embedding job was aborted".to_string()))
            }
            Err(e) => Err(LesaError::Embedding(format!("Embedding job panicked: {}", e))),
        }
    }
}

/// Batches passages to the embedding provider and grows the vector index.
pub struct EmbeddingPipeline {
    embedder: Arc<dyn Embedder>,
    repository: Arc<dyn VectorRepository>,
    registry: Arc<JobRegistry>,
    batch_size: usize,
}

impl EmbeddingPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        repository: Arc<dyn VectorRepository>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            repository,
            registry: Arc::new(JobRegistry::new()),
            batch_size: batch_size.max(1),
        }
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    /// Start an embedding job as a background task and return its handle.
    pub fn spawn(&self, document_id: String, passages: Vec<Passage>) -> Result<EmbeddingJob> {
        let claim = self.registry.claim(&document_id)?;

        let embedder = Arc::clone(&self.embedder);
        let repository = Arc::clone(&self.repository);
        let batch_size = self.batch_size;
        let doc = document_id.clone();

        let handle = tokio::spawn(async move {
            let _claim = claim;
            run_job(embedder, repository, doc, passages, batch_size).await
        });

        Ok(EmbeddingJob {
            document_id,
            handle,
        })
    }

    /// Run an embedding job inline, holding the in-progress flag for its
    /// duration.
    pub async fn run(&self, document_id: &str, passages: Vec<Passage>) -> Result<usize> {
        let _claim = self.registry.claim(document_id)?;
        run_job(
            Arc::clone(&self.embedder),
            Arc::clone(&self.repository),
            document_id.to_string(),
            passages,
            self.batch_size,
        )
        .await
    }
}

#[instrument(skip(embedder, repository, passages), fields(total = passages.len()))]
async fn run_job(
    embedder: Arc<dyn Embedder>,
    repository: Arc<dyn VectorRepository>,
    document_id: String,
    passages: Vec<Passage>,
    batch_size: usize,
) -> Result<usize> {
    let total = passages.len();
    let mut status = EmbeddingJobStatus::new(&document_id, total);
    persist_status(&*repository, &status).await;

    let index = VectorIndex::new(Arc::clone(&repository), &document_id);
    let mut processed = 0usize;

    for batch in passages.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        let embeddings = match embedder.embed_batch(&texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                warn!("Embedding batch failed for {}: {}", document_id, e);
                status.fail(e.to_string());
                persist_status(&*repository, &status).await;
                return Err(e);
            }
        };

        if embeddings.len() != batch.len() {
            let e = LesaError::Embedding(format!(
                "Provider returned {} vectors for {} inputs",
                embeddings.len(),
                batch.len()
            ));
            status.fail(e.to_string());
            persist_status(&*repository, &status).await;
            return Err(e);
        }

        let records: Vec<VectorRecord> = batch
            .iter()
            .zip(embeddings)
            .map(|(passage, mut embedding)| {
                l2_normalize(&mut embedding);
                VectorRecord {
                    id: passage.id.clone(),
                    text: passage.text.clone(),
                    embedding,
                }
            })
            .collect();

        if let Err(e) = index.append(records).await {
            warn!("Append failed for {}: {}", document_id, e);
            status.fail(e.to_string());
            persist_status(&*repository, &status).await;
            return Err(e);
        }

        processed += batch.len();
        status.set_processed(processed);
        if processed >= total {
            status.complete();
        }
        persist_status(&*repository, &status).await;
    }

    if !status.is_terminal() {
        status.complete();
        persist_status(&*repository, &status).await;
    }

    info!(
        "Embedding job for {} complete ({} passages)",
        document_id, processed
    );
    Ok(processed)
}

/// Best-effort status persist. A failed write costs durability of this one
/// update, not the job.
async fn persist_status(repository: &dyn VectorRepository, status: &EmbeddingJobStatus) {
    if let Err(e) = repository.write_status(status).await {
        warn!(
            "Failed to persist status for {}: {}",
            status.document_id, e
        );
    }
}
