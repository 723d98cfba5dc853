//! Context assembly for grounded generation.

use crate::chunking::normalize_whitespace;
use crate::retrieval::ScoredPassage;
use crate::store::DocumentMetadata;

/// Per-part character cap, bounding total context size.
pub const SNIPPET_MAX_CHARS: usize = 1200;

/// Whitespace-normalize and truncate text to a bounded character length.
pub fn safe_snippet(text: &str, max_chars: usize) -> String {
    normalize_whitespace(text).chars().take(max_chars).collect()
}

/// Concatenate context parts in priority order: an externally supplied
/// summary hint, a synthesized low-confidence summary, then the retrieved
/// passages. When nothing was retrievable, document metadata stands in.
pub fn build_context(
    summary_hint: Option<&str>,
    synthesized_summary: Option<&str>,
    passages: &[ScoredPassage],
    metadata: Option<&DocumentMetadata>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(hint) = summary_hint {
        if !hint.trim().is_empty() {
            parts.push(format!(
                "Document summary:\n{}",
                safe_snippet(hint, SNIPPET_MAX_CHARS)
            ));
        }
    }

    if let Some(summary) = synthesized_summary {
        parts.push(format!(
            "Generated summary:\n{}",
            safe_snippet(summary, SNIPPET_MAX_CHARS)
        ));
    }

    for passage in passages {
        parts.push(safe_snippet(&passage.text, SNIPPET_MAX_CHARS));
    }

    if parts.is_empty() {
        if let Some(meta) = metadata {
            let mut lines: Vec<String> = Vec::new();
            if let Some(title) = &meta.title {
                lines.push(format!("Title: {}", title));
            }
            if let Some(author) = &meta.author {
                lines.push(format!("Author: {}", author));
            }
            if !meta.toc.is_empty() {
                let toc: Vec<String> = meta.toc.iter().take(50).cloned().collect();
                lines.push(format!("TOC:\n{}", toc.join("\n")));
            }
            if !lines.is_empty() {
                parts.push(format!("Document metadata:\n{}", lines.join("\n")));
            }
        }
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str) -> ScoredPassage {
        ScoredPassage {
            text: text.to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn test_safe_snippet_normalizes_and_truncates() {
        let snippet = safe_snippet("hello   world\n\tagain", 11);
        assert_eq!(snippet, "hello world");
    }

    #[test]
    fn test_context_priority_order() {
        let context = build_context(
            Some("external summary"),
            Some("generated summary"),
            &[passage("first passage"), passage("second passage")],
            None,
        );

        let hint_pos = context.find("external summary").unwrap();
        let summary_pos = context.find("generated summary").unwrap();
        let first_pos = context.find("first passage").unwrap();
        let second_pos = context.find("second passage").unwrap();
        assert!(hint_pos < summary_pos);
        assert!(summary_pos < first_pos);
        assert!(first_pos < second_pos);
    }

    #[test]
    fn test_metadata_fallback_when_nothing_retrieved() {
        let meta = DocumentMetadata {
            title: Some("A Study of Things".into()),
            author: Some("J. Doe".into()),
            toc: vec!["Chapter 1".into(), "Chapter 2".into()],
        };

        let context = build_context(None, None, &[], Some(&meta));
        assert!(context.contains("Title: A Study of Things"));
        assert!(context.contains("Author: J. Doe"));
        assert!(context.contains("Chapter 2"));
    }

    #[test]
    fn test_metadata_ignored_when_passages_present() {
        let meta = DocumentMetadata {
            title: Some("A Study of Things".into()),
            ..Default::default()
        };

        let context = build_context(None, None, &[passage("actual content")], Some(&meta));
        assert!(context.contains("actual content"));
        assert!(!context.contains("A Study of Things"));
    }

    #[test]
    fn test_empty_everything_is_empty_context() {
        assert!(build_context(None, None, &[], None).is_empty());
    }
}
