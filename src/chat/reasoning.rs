//! Removal of inline reasoning blocks from model output.
//!
//! Reasoning models prefix their answer with `<think>...</think>`. Only the
//! text after the first closing marker is shown to the user.

const OPEN_MARKER: &str = "<think>";
const CLOSE_MARKER: &str = "</think>";

/// Strip a leading reasoning block.
///
/// Applies only when the content starts (after whitespace) with the opening
/// marker and contains a closing marker; everything through the first closing
/// marker is dropped and the rest trimmed. Any other content is returned as is.
pub fn strip_reasoning(content: &str) -> &str {
    if !content.trim_start().starts_with(OPEN_MARKER) {
        return content;
    }

    match content.find(CLOSE_MARKER) {
        Some(pos) => content[pos + CLOSE_MARKER.len()..].trim(),
        None => content,
    }
}
