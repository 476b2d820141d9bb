//! Text utilities

/// Count whitespace-separated words
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// First `max_chars` characters of `text`, with an ellipsis when truncated
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
