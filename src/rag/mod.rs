//! RAG (Retrieval-Augmented Generation) for grounded question answering.
//!
//! Assembles retrieved context, invokes the generative provider under a
//! grounding instruction, and normalizes hedging answers into one
//! user-facing contract.

pub mod context;
mod synthesizer;

pub use context::{build_context, safe_snippet, SNIPPET_MAX_CHARS};
pub use synthesizer::{AnswerSynthesizer, SynthesizedAnswer, FALLBACK_ANSWER};
