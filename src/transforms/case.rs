//! Case transforms for the `uppercase`, `lowercase`, `formal`, `sentence` and
//! `word` tags. All of them keep the input's whitespace as-is.

pub fn uppercase(text: &str) -> String {
    text.to_uppercase()
}

pub fn lowercase(text: &str) -> String {
    text.to_lowercase()
}

/// Title case: each word gets an uppercase first letter, the rest lowercase.
pub fn formal(text: &str) -> String {
    map_words(text, |first, rest, out| {
        out.extend(first.to_uppercase());
        out.push_str(&rest.to_lowercase());
    })
}

/// Capitalize the first letter of each word, leaving the rest untouched.
pub fn word(text: &str) -> String {
    map_words(text, |first, rest, out| {
        out.extend(first.to_uppercase());
        out.push_str(rest);
    })
}

/// Sentence case: lowercase everything, then capitalize the first letter of
/// each sentence. A sentence starts at the beginning of the text and after
/// `.`, `!` or `?`.
pub fn sentence(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_start = true;
    for c in text.chars() {
        if at_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
            at_start = false;
        } else {
            out.extend(c.to_lowercase());
            if matches!(c, '.' | '!' | '?') {
                at_start = true;
            }
        }
    }
    out
}

fn map_words(text: &str, mut f: impl FnMut(char, &str, &mut String)) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        let ws_end = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        out.push_str(&rest[..ws_end]);
        rest = &rest[ws_end..];

        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..word_end];
        let mut chars = token.chars();
        if let Some(first) = chars.next() {
            f(first, chars.as_str(), &mut out);
        }
        rest = &rest[word_end..];
    }
    out
}
