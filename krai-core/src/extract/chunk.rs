//! Chunk Extractor (stage `chunk_prep`, spec §4.2.6). Splits page text
//! into semantically-bounded chunks — preferring heading breaks, falling
//! back to paragraph boundaries — targeting `DEFAULT_CHUNK_TARGET_CHARS`
//! with `DEFAULT_CHUNK_OVERLAP_CHARS` overlap, and wires the doubly-linked
//! reading-order list the data model requires (spec §3 invariant 2).

use super::ExtractorMetrics;
use crate::types::{DEFAULT_CHUNK_OVERLAP_CHARS, DEFAULT_CHUNK_TARGET_CHARS};
use std::sync::LazyLock;
use std::time::Instant;
use uuid::Uuid;

/// A prepared chunk, not yet assigned a document id (the stage runner
/// stamps `document_id` on all chunks of one document together so it can
/// enforce the `(document_id, ordinal)` uniqueness invariant in one
/// transaction).
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChunk {
    pub id: Uuid,
    pub ordinal: u32,
    pub page_number: u32,
    pub section_hierarchy: Vec<String>,
    pub section_level: u32,
    pub text: String,
    pub previous_chunk_id: Option<Uuid>,
    pub next_chunk_id: Option<Uuid>,
}

static HEADING: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^(?:[0-9]+(?:\.[0-9]+)*\.?\s+\S|[A-Z][A-Z0-9 /&-]{3,60}$)").expect("static regex")
});

pub struct ChunkExtractor {
    target_chars: usize,
    overlap_chars: usize,
}

impl ChunkExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            target_chars: DEFAULT_CHUNK_TARGET_CHARS,
            overlap_chars: DEFAULT_CHUNK_OVERLAP_CHARS,
        }
    }

    #[must_use]
    pub fn with_sizing(target_chars: usize, overlap_chars: usize) -> Self {
        Self {
            target_chars,
            overlap_chars,
        }
    }

    /// Chunk every page of a document, producing a single reading-order
    /// doubly-linked list across all pages.
    #[must_use]
    pub fn extract(&self, pages: &[(u32, String)]) -> (Vec<PreparedChunk>, ExtractorMetrics) {
        let start = Instant::now();
        let mut hierarchy: Vec<String> = Vec::new();
        let mut raw: Vec<(u32, Vec<String>, u32, String)> = Vec::new();

        for (page_number, text) in pages {
            for (section, level, body) in split_page(text, &mut hierarchy, self.target_chars) {
                raw.push((*page_number, section, level, body));
            }
        }

        let mut chunks: Vec<PreparedChunk> = raw
            .into_iter()
            .enumerate()
            .map(|(ordinal, (page_number, section_hierarchy, section_level, text))| PreparedChunk {
                id: Uuid::new_v4(),
                ordinal: u32::try_from(ordinal).unwrap_or(u32::MAX),
                page_number,
                section_hierarchy,
                section_level,
                text,
                previous_chunk_id: None,
                next_chunk_id: None,
            })
            .collect();

        apply_overlap(&mut chunks, self.overlap_chars);
        link(&mut chunks);

        let metrics = ExtractorMetrics::from_duration(chunks.len(), 0, start.elapsed());
        (chunks, metrics)
    }
}

impl Default for ChunkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits one page's text into `(section_hierarchy, section_level, body)`
/// tuples. Heading lines update `hierarchy` (truncating to the heading's
/// depth before pushing, so a level-1 heading resets any deeper nesting);
/// everything else accumulates into paragraph-bounded bodies capped near
/// `target_chars`.
fn split_page(
    text: &str,
    hierarchy: &mut Vec<String>,
    target_chars: usize,
) -> Vec<(Vec<String>, u32, String)> {
    let mut out = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, hierarchy: &[String], out: &mut Vec<(Vec<String>, u32, String)>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            let level = u32::try_from(hierarchy.len()).unwrap_or(u32::MAX).max(1);
            out.push((hierarchy.to_vec(), level, trimmed.to_string()));
        }
        current.clear();
    };

    for paragraph in text.split("\n\n") {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            continue;
        }
        let first_line = trimmed.lines().next().unwrap_or("");
        if HEADING.is_match(first_line) && first_line.len() < 80 {
            flush(&mut current, hierarchy, &mut out);
            let depth = heading_depth(first_line);
            hierarchy.truncate(depth.saturating_sub(1));
            hierarchy.push(first_line.trim().to_string());
            let rest: String = trimmed.lines().skip(1).collect::<Vec<_>>().join("\n");
            if !rest.trim().is_empty() {
                current.push_str(&rest);
                current.push('\n');
            }
            continue;
        }

        if current.len() + trimmed.len() > target_chars && !current.is_empty() {
            flush(&mut current, hierarchy, &mut out);
        }
        current.push_str(trimmed);
        current.push('\n');
    }
    flush(&mut current, hierarchy, &mut out);
    out
}

fn heading_depth(line: &str) -> usize {
    // "1.2.3 Title" -> depth 3; all-caps headings default to depth 1.
    let numeric_prefix = line.split_whitespace().next().unwrap_or("");
    let dots = numeric_prefix.chars().filter(|c| *c == '.').count();
    if numeric_prefix.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        dots + 1
    } else {
        1
    }
}

/// Prepends up to `overlap_chars` of the previous chunk's trailing text
/// to each chunk (except the first), matching spec §4.2.6's "overlap ~200
/// chars" between adjacent chunks.
fn apply_overlap(chunks: &mut [PreparedChunk], overlap_chars: usize) {
    if overlap_chars == 0 {
        return;
    }
    for i in (1..chunks.len()).rev() {
        let tail: String = {
            let prev_text = &chunks[i - 1].text;
            let start = prev_text.len().saturating_sub(overlap_chars);
            let start = floor_char_boundary(prev_text, start);
            prev_text[start..].to_string()
        };
        if !tail.is_empty() {
            chunks[i].text = format!("{tail}\n{}", chunks[i].text);
        }
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn link(chunks: &mut [PreparedChunk]) {
    let ids: Vec<Uuid> = chunks.iter().map(|c| c.id).collect();
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.previous_chunk_id = i.checked_sub(1).map(|j| ids[j]);
        chunk.next_chunk_id = ids.get(i + 1).copied();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_form_a_contiguous_doubly_linked_list() {
        let extractor = ChunkExtractor::new();
        let long_para = "word ".repeat(500);
        let text = format!("Intro paragraph.\n\n{long_para}\n\nMore text here to split further.");
        let pages = vec![(1, text)];
        let (chunks, _) = extractor.extract(&pages);
        assert!(chunks.len() >= 2);
        for window in chunks.windows(2) {
            assert_eq!(window[0].next_chunk_id, Some(window[1].id));
            assert_eq!(window[1].previous_chunk_id, Some(window[0].id));
        }
        assert_eq!(chunks.first().unwrap().previous_chunk_id, None);
        assert_eq!(chunks.last().unwrap().next_chunk_id, None);
    }

    #[test]
    fn ordinals_are_sequential() {
        let extractor = ChunkExtractor::new();
        let pages = vec![(1, "A.\n\nB.\n\nC.".to_string())];
        let (chunks, _) = extractor.extract(&pages);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, u32::try_from(i).unwrap());
        }
    }

    #[test]
    fn heading_updates_section_hierarchy() {
        let extractor = ChunkExtractor::new();
        let text = "1 OVERVIEW\n\nSome intro text.\n\n1.1 Details\n\nMore detail text here.";
        let pages = vec![(1, text.to_string())];
        let (chunks, _) = extractor.extract(&pages);
        assert!(chunks
            .iter()
            .any(|c| c.section_hierarchy.iter().any(|h| h.contains("Details"))));
    }
}
