//! Lesa - Document Question Answering with RAG
//!
//! A local-first CLI tool for asking questions about your documents.
//!
//! The name "Lesa" comes from the Norwegian/Icelandic word for "read."
//!
//! # Overview
//!
//! Lesa allows you to:
//! - Ingest plain-text and markdown documents into a searchable vector index
//! - Ask questions answered only from a document's content, with sources
//! - Watch embedding progress while a document is still being indexed
//! - Search a document's passages semantically, with a lexical fallback
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `extract` - Text extraction abstraction (plain text, markdown)
//! - `chunking` - Passage refinement (token-bounded, overlapping, deduplicated)
//! - `embedding` - Embedding generation
//! - `generation` - Grounded answer generation
//! - `store` - Vector repository abstraction and per-document index
//! - `pipeline` - Incremental, crash-safe embedding pipeline
//! - `retrieval` - Multi-pass retrieval and ranking
//! - `rag` - Answer synthesis, grounding, and fallback normalization
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use lesa::config::Settings;
//! use lesa::orchestrator::Orchestrator;
//! use lesa::store::DocumentMetadata;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     // Ingest a document and wait for the embedding job to finish
//!     let result = orchestrator
//!         .ingest(std::path::Path::new("paper.txt"), DocumentMetadata::default())
//!         .await?;
//!     if let Some(job) = result.job {
//!         let indexed = job.wait().await?;
//!         println!("Indexed {} passages", indexed);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod openai;
pub mod orchestrator;
pub mod pipeline;
pub mod rag;
pub mod retrieval;
pub mod store;

pub use error::{LesaError, Result};
