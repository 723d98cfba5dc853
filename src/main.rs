//! Lesa CLI entry point.

use anyhow::Result;
use clap::Parser;
use lesa::cli::{commands, Cli, Commands};
use lesa::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("lesa={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Ingest {
            file,
            title,
            author,
            toc,
        } => {
            commands::run_ingest(file, title.clone(), author.clone(), toc.clone(), settings)
                .await?;
        }

        Commands::Ask {
            question,
            doc,
            top_k,
            model,
        } => {
            commands::run_ask(question, doc, *top_k, model.clone(), settings).await?;
        }

        Commands::Search { query, doc, limit } => {
            commands::run_search(query, doc, *limit, settings).await?;
        }

        Commands::Summarize { doc } => {
            commands::run_summarize(doc, settings).await?;
        }

        Commands::Status { doc } => {
            commands::run_status(doc, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Delete { doc } => {
            commands::run_delete(doc, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
