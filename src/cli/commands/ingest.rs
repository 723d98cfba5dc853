//! Ingest command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::store::DocumentMetadata;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

/// Run the ingest command.
pub async fn run_ingest(
    file: &str,
    title: Option<String>,
    author: Option<String>,
    toc: Vec<String>,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let metadata = DocumentMetadata { title, author, toc };

    Output::info(&format!("Ingesting {}", file));
    let result = orchestrator.ingest(Path::new(file), metadata).await?;

    if let Some(warning) = &result.warning {
        Output::warning(warning);
        Output::kv("Document ID", &result.document_id);
        return Ok(());
    }

    Output::info(&format!("Refined into {} passages", result.passage_count));

    let Some(job) = result.job else {
        Output::kv("Document ID", &result.document_id);
        return Ok(());
    };

    // The index grows while the job runs; poll the persisted status for
    // progress until the task finishes.
    let pb = Output::progress_bar(result.passage_count as u64, "Embedding passages");
    while !job.is_finished() {
        if let Ok(Some(status)) = orchestrator
            .repository()
            .read_status(&result.document_id)
            .await
        {
            pb.set_position(status.processed as u64);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    match job.wait().await {
        Ok(indexed) => {
            pb.finish_and_clear();
            Output::success(&format!("Indexed {} passages", indexed));
            Output::kv("Document ID", &result.document_id);
            Output::info("Ask away with: lesa ask \"<question>\" --doc <id>");
        }
        Err(e) => {
            pb.finish_and_clear();
            Output::error(&format!("Embedding job failed: {}", e));
            Output::info("Passages embedded before the failure remain queryable.");
            Output::kv("Document ID", &result.document_id);
            return Err(e.into());
        }
    }

    Ok(())
}
