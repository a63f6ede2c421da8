//! Response Extraction
//!
//! Reduces a [`ConversationTrace`] to the text the model wrote for the user.

use crate::message::{ConversationTrace, ConversationTurn};

/// Model-authored answer texts, in trace order.
///
/// User turns and tool results are dropped, and so are assistant turns
/// whose text is blank (typically tool-call-only turns).
pub fn extract_answers(trace: &ConversationTrace) -> Vec<String> {
    trace
        .iter()
        .filter_map(ConversationTurn::assistant_text)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Render one answer for terminal output
pub fn format_answer(text: &str) -> String {
    format!("### AI Response:\n\n{text}\n")
}
