//! Locate a chunk inside a rendered (HTML) document and mark it.
//!
//! Rendering (docx → paragraphs, spreadsheets → tables) changes the text
//! the chunker saw, so matching is deliberately loose:
//!
//! - only the first [`MATCH_PREFIX_CHARS`] characters of the chunk are used;
//! - words are matched literally (HTML-encoded, regex-escaped) and
//!   case-insensitively;
//! - any run of whitespace, `&nbsp;` or tags may sit between two words.
//!
//! When nothing matches, the anchor is placed at the top of the document
//! and `found` is false. Navigation degrades; the view never fails.

use regex::{Regex, RegexBuilder};

/// Number of leading chunk characters used to find the chunk.
pub const MATCH_PREFIX_CHARS: usize = 300;

const WORD_GAP: &str = r"(?:\s|&nbsp;|<[^>]*>)+";
const MARK_STYLE: &str = "background:#e6f4ea;border-radius:4px;";

/// Result of [`highlight_chunk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighted {
    pub html: String,
    pub found: bool,
}

/// Fragment identifier for a chunk's anchor (`#chunk-3`).
pub fn anchor_id(ordinal: usize) -> String {
    format!("chunk-{}", ordinal)
}

/// Wrap the first occurrence of `chunk_text`'s prefix in `rendered_html`
/// with a named anchor and a `<mark>`.
pub fn highlight_chunk(rendered_html: &str, chunk_text: &str, ordinal: usize) -> Highlighted {
    let anchor = format!("<a id='{}'></a>", anchor_id(ordinal));

    let found = match_pattern(chunk_text).and_then(|re| re.find(rendered_html));
    match found {
        Some(m) => {
            let mut html = String::with_capacity(rendered_html.len() + 96);
            html.push_str(&rendered_html[..m.start()]);
            html.push_str(&anchor);
            html.push_str(&format!("<mark style='{}'>", MARK_STYLE));
            html.push_str(m.as_str());
            html.push_str("</mark>");
            html.push_str(&rendered_html[m.end()..]);
            Highlighted { html, found: true }
        }
        None => {
            tracing::debug!(ordinal, "chunk text not found in rendered document");
            Highlighted {
                html: format!("{}{}", anchor, rendered_html),
                found: false,
            }
        }
    }
}

/// Build the loose matcher for a chunk, or `None` if the chunk has no
/// visible words.
fn match_pattern(chunk_text: &str) -> Option<Regex> {
    let prefix: String = chunk_text.chars().take(MATCH_PREFIX_CHARS).collect();
    let words: Vec<String> = prefix
        .split_whitespace()
        .map(|w| regex::escape(&html_escape::encode_text(w)))
        .collect();
    if words.is_empty() {
        return None;
    }

    RegexBuilder::new(&words.join(WORD_GAP))
        .case_insensitive(true)
        .build()
        .map_err(|e| tracing::warn!(error = %e, "failed to build highlight pattern"))
        .ok()
}
