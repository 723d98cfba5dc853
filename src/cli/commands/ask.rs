//! Ask command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    doc: &str,
    top_k: usize,
    model: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(model) = model {
        settings.rag.model = model;
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching document...");

    match orchestrator.ask(doc, question, top_k, None).await {
        Ok(response) => {
            spinner.finish_and_clear();

            println!("\n{}\n", response.answer);

            if !response.context.is_empty() {
                Output::header("Sources");
                for (i, passage) in response.context.iter().enumerate().take(3) {
                    Output::search_result(i + 1, passage.score, &passage.text);
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
