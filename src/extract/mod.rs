//! Text extraction abstraction.
//!
//! Raw text extraction from source documents is an external collaborator:
//! the rest of the pipeline only sees ordered text segments. The bundled
//! extractor handles plain-text and markdown files; scanned or binary
//! documents yield an explicit "no text" signal rather than an error.

use crate::error::{LesaError, Result};
use std::path::Path;
use tracing::warn;

/// Trait for document text extraction implementations.
pub trait TextExtractor: Send + Sync {
    /// Extract raw text from a document.
    ///
    /// Returns `Ok(None)` when the document is readable but contains no
    /// extractable text (e.g., a scanned or image-based file).
    fn extract(&self, path: &Path) -> Result<Option<String>>;
}

/// Extractor for plain-text and markdown files.
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Err(LesaError::InvalidInput(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let bytes = std::fs::read(path)?;
        let text = match String::from_utf8(bytes) {
            Ok(t) => t,
            Err(_) => {
                warn!("{} is not valid UTF-8, treating as non-extractable", path.display());
                return Ok(None);
            }
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        Ok(Some(trimmed.to_string()))
    }
}

/// Slice raw text into fixed-size character segments for refinement.
///
/// Segment boundaries land on char boundaries, never inside a code point.
pub fn split_segments(text: &str, segment_chars: usize) -> Vec<String> {
    if text.is_empty() || segment_chars == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(segment_chars)
        .map(|c| c.iter().collect())
        .collect()
}
