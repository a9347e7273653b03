//! String operations for the `substring`, `replace`, `length` and `count`
//! tags. Indices are Unicode code points and are clamped, never rejected.

/// Unit used by `length` and `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    #[default]
    Char,
    Word,
    Sentence,
}

impl CountMode {
    /// Parse a `mode` attribute. Unknown values fall back to `default`.
    pub fn parse(value: Option<&str>, default: CountMode) -> CountMode {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v.starts_with("char") => CountMode::Char,
            Some(v) if v.starts_with("word") => CountMode::Word,
            Some(v) if v.starts_with("sentence") => CountMode::Sentence,
            _ => default,
        }
    }
}

/// Code points `start..end` of `text`. Missing bounds default to the ends of
/// the string; negative or oversized bounds are clamped; an inverted range is
/// empty.
pub fn substring(text: &str, start: Option<i64>, end: Option<i64>) -> String {
    let len = text.chars().count() as i64;
    let start = start.unwrap_or(0).clamp(0, len);
    let end = end.unwrap_or(len).clamp(0, len);
    if start >= end {
        return String::new();
    }
    text.chars().skip(start as usize).take((end - start) as usize).collect()
}

/// Replace every occurrence of `search`. An empty `search` leaves the text alone.
pub fn replace(text: &str, search: &str, replacement: &str) -> String {
    if search.is_empty() { text.to_string() } else { text.replace(search, replacement) }
}

pub fn length(text: &str, mode: CountMode) -> usize {
    match mode {
        CountMode::Char => text.chars().count(),
        CountMode::Word => text.split_whitespace().count(),
        CountMode::Sentence => sentences(text).len(),
    }
}

/// Non-overlapping occurrences of `search` in `text`.
pub fn count_occurrences(text: &str, search: &str) -> usize {
    if search.is_empty() { 0 } else { text.matches(search).count() }
}

/// Split text into trimmed, non-empty sentences ending at `.`, `!` or `?`
/// (the terminator stays with its sentence).
pub fn sentences(text: &str) -> Vec<&str> {
    crate::regex!(r"[^.!?]+[.!?]*")
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
