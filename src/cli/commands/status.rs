//! Status command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::store::JobState;
use anyhow::Result;

/// Run the status command.
pub async fn run_status(doc: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.status(doc).await {
        Ok(status) => {
            Output::header(&format!("Embedding job for {}", doc));
            let state = match status.state {
                JobState::Processing => "processing",
                JobState::Done => "done",
                JobState::Error => "error",
            };
            Output::kv("State", state);
            Output::kv(
                "Progress",
                &format!("{}/{} passages", status.processed, status.total),
            );
            if let Some(error) = &status.error {
                Output::kv("Error", error);
            }
        }
        Err(e) => {
            Output::error(&format!("{}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
