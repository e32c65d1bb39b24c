//! Grounding prompt construction and citation previews.

use crate::models::PREVIEW_MAX_CHARS;

/// Instruction block placed ahead of the retrieved context.
///
/// The generator is told to answer only from the context and to say it
/// does not know otherwise. This is a policy on generation, not a
/// guarantee: nothing verifies the answer is grounded.
pub const GROUNDING_INSTRUCTIONS: &str = "You are a helpful assistant that answers strictly using the provided context.\n\
If the answer is not in the context, say you don't know.";

/// Separator between retrieved chunk texts in the context block.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Build the prompt sent to the text generator.
///
/// # Example
///
/// ```rust
/// use docchat_core::prompt::build_prompt;
///
/// let prompt = build_prompt("Where is Paris?", &["Paris is in France."]);
/// assert!(prompt.contains("Context:\nParis is in France."));
/// assert!(prompt.ends_with("Question: Where is Paris?\n\nAnswer:"));
/// ```
pub fn build_prompt<S: AsRef<str>>(question: &str, contexts: &[S]) -> String {
    let context = contexts
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    format!(
        "{}\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
        GROUNDING_INSTRUCTIONS, context, question
    )
}

/// First [`PREVIEW_MAX_CHARS`] characters of a chunk.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_MAX_CHARS) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
