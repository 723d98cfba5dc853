//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.list().await {
        Ok(documents) => {
            if documents.is_empty() {
                Output::info("No documents ingested yet. Use 'lesa ingest <file>' to add one.");
            } else {
                Output::header(&format!("Ingested Documents ({})", documents.len()));
                println!();

                for doc in &documents {
                    Output::document_info(
                        &doc.document_id,
                        doc.title.as_deref(),
                        doc.passage_count,
                        &doc.indexed_at.format("%Y-%m-%d %H:%M").to_string(),
                    );
                }

                let total_passages: usize = documents.iter().map(|d| d.passage_count).sum();
                println!();
                Output::kv("Total documents", &documents.len().to_string());
                Output::kv("Total passages", &total_passages.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list documents: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
