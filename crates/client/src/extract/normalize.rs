//! Text cleanup for preview values.

/// Marker appended when a value is cut short.
pub const ELLIPSIS: &str = "\u{2026}";

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_words` words, appending [`ELLIPSIS`] when anything was dropped.
pub fn trim_words(input: &str, max_words: usize) -> String {
    let words: Vec<&str> = input.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }
    format!("{}{ELLIPSIS}", words[..max_words].join(" "))
}
