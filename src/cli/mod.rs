//! CLI module for Lesa.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lesa - Document Question Answering with RAG
///
/// A local-first CLI tool for asking questions about your documents.
/// The name "Lesa" comes from the Norwegian/Icelandic word for "read."
#[derive(Parser, Debug)]
#[command(name = "lesa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a document and index it for question answering
    Ingest {
        /// Path to a plain-text or markdown file
        file: String,

        /// Document title (answers "what is the title?" directly)
        #[arg(long)]
        title: Option<String>,

        /// Document author (answers "who is the author?" directly)
        #[arg(long)]
        author: Option<String>,

        /// Table of contents entry (repeatable)
        #[arg(long = "toc")]
        toc: Vec<String>,
    },

    /// Ask a question about an ingested document
    Ask {
        /// The question to ask
        question: String,

        /// Document ID to ask about
        #[arg(short, long)]
        doc: String,

        /// Maximum number of context passages to retrieve
        #[arg(short = 'k', long, default_value = "8")]
        top_k: usize,

        /// LLM model to use for answer generation
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Search a document's passages without generating an answer
    Search {
        /// Search query
        query: String,

        /// Document ID to search
        #[arg(short, long)]
        doc: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Generate a short summary of an ingested document
    Summarize {
        /// Document ID to summarize
        doc: String,
    },

    /// Show embedding job status for a document
    Status {
        /// Document ID
        doc: String,
    },

    /// List ingested documents
    List,

    /// Delete a document's index, status, and metadata
    Delete {
        /// Document ID
        doc: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
