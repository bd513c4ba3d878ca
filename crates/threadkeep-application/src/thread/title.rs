//! Deterministic thread titles.

use threadkeep_core::history::{MessageRole, MessageTree};

const ELLIPSIS: char = '…';
const ID_PREFIX_CHARS: usize = 8;

/// Derives a title from the first user message on the current branch, or
/// from the thread id when there is none.
pub fn derive_title(thread_id: &str, history: Option<&MessageTree>, max_chars: usize) -> String {
    let from_history = history.and_then(|tree| {
        tree.current_branch()
            .into_iter()
            .find(|node| node.message.role == MessageRole::User)
            .map(|node| collapse_whitespace(&node.message.content))
            .filter(|text| !text.is_empty())
    });

    match from_history {
        Some(text) => truncate_at_word(&text, max_chars),
        None => fallback_title(thread_id),
    }
}

/// `"Thread <first 8 chars of id>"`.
pub fn fallback_title(thread_id: &str) -> String {
    let prefix: String = thread_id.chars().take(ID_PREFIX_CHARS).collect();
    format!("Thread {prefix}")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `text` to at most `max_chars` characters including the ellipsis,
/// preferring the last word boundary.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let budget = max_chars.saturating_sub(1);
    if budget == 0 {
        return ELLIPSIS.to_string();
    }

    let head: String = text.chars().take(budget).collect();
    let cut = match head.rfind(' ') {
        Some(pos) if pos > 0 => &head[..pos],
        _ => head.as_str(),
    };
    format!("{}{}", cut.trim_end(), ELLIPSIS)
}
