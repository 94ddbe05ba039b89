//! Splits the knowledge corpus into retrievable sections.

use std::path::Path;

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::types::DocumentChunk;
use tracing::info;

/// Marker that starts a new section: a newline followed by a markdown heading.
const SECTION_MARKER: &str = "\n##";

/// Split a markdown corpus immediately before every `"\n##"`.
///
/// The newline stays with the section that follows it. Pieces are kept as-is
/// except that whitespace-only pieces are dropped. Ids are assigned in corpus
/// order.
pub fn split_sections(corpus: &str) -> Vec<DocumentChunk> {
    let mut boundaries: Vec<usize> = corpus
        .match_indices(SECTION_MARKER)
        .map(|(idx, _)| idx)
        .collect();
    boundaries.push(corpus.len());

    let mut chunks = Vec::new();
    let mut start = 0;
    for end in boundaries {
        let text = &corpus[start..end];
        if !text.trim().is_empty() {
            chunks.push(DocumentChunk {
                id: chunks.len(),
                text: text.to_string(),
            });
        }
        start = end;
    }
    chunks
}

/// Read and split the corpus file. An unreadable file or a corpus with no
/// non-blank sections is an error.
pub fn load_corpus(path: &Path) -> Result<Vec<DocumentChunk>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        HelpdeskError::Corpus(format!("cannot read {}: {}", path.display(), e))
    })?;
    let chunks = split_sections(&content);
    if chunks.is_empty() {
        return Err(HelpdeskError::Corpus(format!(
            "{} contains no sections",
            path.display()
        )));
    }
    info!(path = %path.display(), chunks = chunks.len(), "Corpus loaded");
    Ok(chunks)
}
