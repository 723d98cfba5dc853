//! Configuration module for Lesa.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts, SummaryPrompts};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, ExtractionSettings, GeneralSettings, PromptSettings,
    RagSettings, RetrievalSettings, Settings, StoreSettings,
};
