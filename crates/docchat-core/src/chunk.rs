//! Deterministic overlapping text chunker.
//!
//! Splits extracted document text into chunks of at most `chunk_size`
//! characters, with consecutive chunks sharing roughly `overlap`
//! characters so context is not severed at a cut.
//!
//! The split is a pure function of `(text, chunk_size, overlap)`. This is
//! what lets a citation `(source_id, ordinal)` be resolved back to its text
//! at view time by replaying extraction and chunking, instead of storing
//! chunk text or offsets in the index.
//!
//! # Algorithm
//!
//! 1. Start a window at the current position; its hard end is
//!    `start + chunk_size` characters.
//! 2. If the window reaches the end of the text, emit it and stop.
//! 3. Otherwise pick the latest break inside the window, preferring in
//!    order: after a blank line, after a newline, after a sentence end,
//!    after any whitespace. Breaks closer to the start than
//!    `max(overlap + 1, chunk_size / 2)` characters are ignored. With no
//!    candidate, cut hard at the window end.
//! 4. The next window starts `overlap` characters before the cut, nudged
//!    forward to the start of a word when one is close by.
//!
//! Chunks are exact substrings of the input (nothing is trimmed), so
//! stitching the chunks back together with the overlaps removed yields the
//! original text.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::split_text;
//!
//! let chunks = split_text("Hello world.\n\nSecond paragraph.", 1200, 200).unwrap();
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, RagResult};
use crate::models::SourceChunk;

/// Chunk size used when indexing uploaded documents.
pub const DEFAULT_CHUNK_SIZE: usize = 1200;
/// Overlap used when indexing uploaded documents.
pub const DEFAULT_OVERLAP: usize = 200;

/// Chunking parameters. Build-time and view-time chunking must use the
/// same values or citations will point at the wrong text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Approximate number of characters shared by consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> RagResult<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RagResult<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be > 0".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split `text` into overlapping chunks.
///
/// Returns an empty vector for empty text, and a single chunk equal to the
/// whole text when it is no longer than `chunk_size` characters.
///
/// # Errors
///
/// [`RagError::Config`] if `chunk_size` is zero or `overlap >= chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> RagResult<Vec<String>> {
    let config = ChunkerConfig::new(chunk_size, overlap)?;
    Ok(split_spans(text, &config)?
        .into_iter()
        .map(|span| text[span].to_string())
        .collect())
}

/// Split a source's text into addressed chunks with ordinals `0..N`.
pub fn chunk_source(
    source_id: &str,
    text: &str,
    config: &ChunkerConfig,
) -> RagResult<Vec<SourceChunk>> {
    Ok(split_spans(text, config)?
        .into_iter()
        .enumerate()
        .map(|(ordinal, span)| SourceChunk {
            source_id: source_id.to_string(),
            ordinal,
            text: text[span].to_string(),
        })
        .collect())
}

/// Compute chunk boundaries as byte ranges into `text`.
///
/// Ranges always fall on char boundaries. The first range starts at 0, the
/// last ends at `text.len()`, and each range starts at or before the end of
/// the previous one.
pub fn split_spans(text: &str, config: &ChunkerConfig) -> RagResult<Vec<Range<usize>>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = chars.len();

    let min_len = (config.overlap + 1).max(config.chunk_size / 2);
    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < n {
        let hard_end = (start + config.chunk_size).min(n);
        let end = if hard_end == n {
            n
        } else {
            find_break(&chars, start + min_len, hard_end)
        };

        spans.push(bounds[start]..bounds[end]);
        if end == n {
            break;
        }
        start = next_start(&chars, end, config.overlap);
    }

    Ok(spans)
}

/// Latest cut position in `floor..=hard_end`, by boundary preference.
fn find_break(chars: &[char], floor: usize, hard_end: usize) -> usize {
    let after_blank_line = |p: usize| p >= 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n';
    let after_newline = |p: usize| chars[p - 1] == '\n';
    let after_sentence =
        |p: usize| p >= 2 && chars[p - 1].is_whitespace() && matches!(chars[p - 2], '.' | '!' | '?');
    let after_space = |p: usize| chars[p - 1].is_whitespace();

    last_match(floor, hard_end, after_blank_line)
        .or_else(|| last_match(floor, hard_end, after_newline))
        .or_else(|| last_match(floor, hard_end, after_sentence))
        .or_else(|| last_match(floor, hard_end, after_space))
        .unwrap_or(hard_end)
}

fn last_match(floor: usize, hard_end: usize, pred: impl Fn(usize) -> bool) -> Option<usize> {
    (floor.max(1)..=hard_end).rev().find(|&p| pred(p))
}

/// Start of the chunk following a cut at `end`.
///
/// Always strictly after the previous chunk's start because every cut is
/// more than `overlap` characters past it.
fn next_start(chars: &[char], end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }
    let candidate = end - overlap;
    let window_end = (candidate + overlap / 2 + 1).min(end);
    (candidate..window_end)
        .find(|&q| q == 0 || (chars[q - 1].is_whitespace() && !chars[q].is_whitespace()))
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(text: &str, spans: &[Range<usize>]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for span in spans {
            assert!(span.start <= covered, "gap before {:?}", span);
            out.push_str(&text[covered.max(span.start)..span.end]);
            covered = span.end;
        }
        out
    }

    fn sample_text() -> String {
        (0..120)
            .map(|i| {
                if i % 7 == 6 {
                    format!("Sentence number {} ends a paragraph.\n\n", i)
                } else {
                    format!("Sentence number {} talks about something. ", i)
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_text() {
        assert!(split_text("", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hello, world!", 1200, 200).unwrap();
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_whitespace_only_text_single_chunk() {
        let chunks = split_text("   \n  ", 1200, 200).unwrap();
        assert_eq!(chunks, vec!["   \n  ".to_string()]);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        assert!(matches!(
            split_text("abc", 100, 100),
            Err(RagError::Config(_))
        ));
        assert!(matches!(
            split_text("abc", 100, 150),
            Err(RagError::Config(_))
        ));
        assert!(matches!(split_text("abc", 0, 0), Err(RagError::Config(_))));
    }

    #[test]
    fn test_chunks_respect_max_size() {
        let text = sample_text();
        for chunk in split_text(&text, 300, 50).unwrap() {
            assert!(chunk.chars().count() <= 300, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_coverage_reconstructs_text() {
        let text = sample_text();
        let config = ChunkerConfig::new(300, 50).unwrap();
        let spans = split_spans(&text, &config).unwrap();
        assert!(spans.len() > 1);
        assert_eq!(reconstruct(&text, &spans), text);
    }

    #[test]
    fn test_coverage_without_any_whitespace() {
        let text = "x".repeat(1000);
        let config = ChunkerConfig::new(128, 32).unwrap();
        let spans = split_spans(&text, &config).unwrap();
        assert_eq!(reconstruct(&text, &spans), text);
        // Hard cuts: every chunk but the last is full size.
        for span in &spans[..spans.len() - 1] {
            assert_eq!(span.len(), 128);
        }
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let text = "Grüße aus Köln — ünïcödé ".repeat(60);
        let config = ChunkerConfig::new(100, 20).unwrap();
        let spans = split_spans(&text, &config).unwrap();
        assert_eq!(reconstruct(&text, &spans), text);
        for span in &spans {
            assert!(text.is_char_boundary(span.start));
            assert!(text.is_char_boundary(span.end));
            assert!(text[span.clone()].chars().count() <= 100);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = sample_text();
        let config = ChunkerConfig::new(300, 60).unwrap();
        let spans = split_spans(&text, &config).unwrap();
        for pair in spans.windows(2) {
            let shared = text[pair[1].start..pair[0].end].chars().count();
            assert!(shared > 0 && shared <= 60, "overlap was {}", shared);
        }
    }

    #[test]
    fn test_zero_overlap_produces_disjoint_chunks() {
        let text = sample_text();
        let config = ChunkerConfig::new(250, 0).unwrap();
        let spans = split_spans(&text, &config).unwrap();
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(reconstruct(&text, &spans), text);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let para = "word ".repeat(30); // 150 chars
        let text = format!("{}\n\n{}\n\n{}", para, para, para);
        let chunks = split_text(&text, 200, 20).unwrap();
        assert!(chunks[0].ends_with("\n\n"), "first chunk: {:?}", chunks[0]);
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text();
        let c1 = split_text(&text, 400, 80).unwrap();
        let c2 = split_text(&text, 400, 80).unwrap();
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_chunk_source_assigns_contiguous_ordinals() {
        let text = sample_text();
        let chunks = chunk_source("notes.txt", &text, &ChunkerConfig::new(200, 40).unwrap()).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.ordinal, i);
            assert_eq!(c.source_id, "notes.txt");
        }
    }
}
