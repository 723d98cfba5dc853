//! Delete command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the delete command.
pub async fn run_delete(doc: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.delete(doc).await {
        Ok(()) => {
            Output::success(&format!("Deleted document {}", doc));
        }
        Err(e) => {
            Output::error(&format!("Failed to delete document: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
