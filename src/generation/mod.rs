//! Grounded answer generation.

mod openai;

pub use openai::OpenAIGenerator;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for generative model implementations.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text from a system instruction and a user prompt.
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}
