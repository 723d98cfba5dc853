//! Search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use tracing::debug;

/// Run the search command.
pub async fn run_search(query: &str, doc: &str, limit: usize, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let result = orchestrator.search(doc, query, limit).await;
    spinner.finish_and_clear();

    match result {
        Ok(retrieval) => {
            debug!(
                top_score = retrieval.diagnostics.top_score,
                index_dimension = retrieval.diagnostics.index_dimension,
                dimension_mismatch = retrieval.diagnostics.dimension_mismatch,
                "retrieval diagnostics"
            );

            if retrieval.passages.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", retrieval.passages.len()));
                for (i, passage) in retrieval.passages.iter().enumerate() {
                    Output::search_result(i + 1, passage.score, &passage.text);
                }

                if retrieval.diagnostics.dimension_mismatch {
                    Output::warning(
                        "Query embedding dimensions did not match the index; results are lexical.",
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
