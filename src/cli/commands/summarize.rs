//! Summarize command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the summarize command.
pub async fn run_summarize(doc: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Summarizing document...");

    match orchestrator.summarize(doc).await {
        Ok(summary) => {
            spinner.finish_and_clear();
            println!("\n{}\n", summary);
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to summarize: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
