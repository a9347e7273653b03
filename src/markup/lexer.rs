//! Tag-level lexer shared by the forgiving parser and the strict checker.
//!
//! The lexer never fails. Anything that starts with `<` but does not form a
//! complete, well-formed tag (`<` followed by a valid name, optional quoted
//! attributes and a closing `>`) comes out as a plain [`Lexeme::Text`] run, so
//! the parser's only job is nesting.
//!
//! ```text
//! "Hi <get name='x'/>!"  ->  Text("Hi ")  SelfClose(get, [name=x])  Text("!")
//! "a < b"                ->  Text("a ")  Text("<")  Text(" b")
//! ```

/// One lexical unit of template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lexeme<'a> {
    /// Raw text (entities not yet decoded).
    Text(&'a str),
    Open { name: &'a str, attributes: Vec<(String, String)>, raw: &'a str },
    Close { name: &'a str, raw: &'a str },
    SelfClose { name: &'a str, attributes: Vec<(String, String)> },
    /// `<!-- ... -->`, dropped by the parser.
    Comment,
}

pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Lexeme<'a>;

    fn next(&mut self) -> Option<Lexeme<'a>> {
        let rest = &self.src[self.pos..];
        if rest.is_empty() {
            return None;
        }

        if !rest.starts_with('<') {
            let end = rest.find('<').unwrap_or(rest.len());
            self.pos += end;
            return Some(Lexeme::Text(&rest[..end]));
        }

        if rest.starts_with("<!--") {
            if let Some(close) = rest[4..].find("-->") {
                self.pos += 4 + close + 3;
                return Some(Lexeme::Comment);
            }
            // An unterminated comment is just text.
            self.pos += rest.len();
            return Some(Lexeme::Text(rest));
        }

        match scan_tag(rest) {
            Some((lexeme, consumed)) => {
                self.pos += consumed;
                Some(lexeme)
            }
            None => {
                self.pos += 1;
                Some(Lexeme::Text(&rest[..1]))
            }
        }
    }
}

/// Is `name` acceptable as a tag or attribute name?
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
}

/// Try to read one tag at the start of `s` (which begins with `<`).
///
/// Returns the lexeme and the number of bytes consumed, or `None` when the
/// text is not a well-formed tag.
fn scan_tag(s: &str) -> Option<(Lexeme<'_>, usize)> {
    let end = find_tag_end(s)?;
    let raw = &s[..=end];
    let inner = &s[1..end];

    if let Some(name) = inner.strip_prefix('/') {
        let name = name.trim();
        if !is_valid_name(name) {
            return None;
        }
        return Some((Lexeme::Close { name, raw }, end + 1));
    }

    let trimmed = inner.trim_end();
    let (body, self_closing) = match trimmed.strip_suffix('/') {
        Some(body) => (body, true),
        None => (trimmed, false),
    };

    let name_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let name = &body[..name_end];
    if !is_valid_name(name) {
        return None;
    }
    let attributes = parse_attributes(&body[name_end..])?;

    let lexeme = if self_closing {
        Lexeme::SelfClose { name, attributes }
    } else {
        Lexeme::Open { name, attributes, raw }
    };
    Some((lexeme, end + 1))
}

/// Longest quoted attribute value, in bytes, a tag may carry.
const MAX_QUOTED_LEN: usize = 512;

/// Byte index of the `>` that closes the tag starting at `s[0]`, skipping
/// quoted attribute values. A bare `<` before the end means "not a tag", and
/// so does a quoted value that spans a line break or runs past
/// [`MAX_QUOTED_LEN`].
fn find_tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<(char, usize)> = None;
    for (idx, c) in s.char_indices().skip(1) {
        match quote {
            Some((q, _)) if c == q => quote = None,
            Some((_, start)) => {
                if c == '\n' || idx - start > MAX_QUOTED_LEN {
                    return None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some((c, idx)),
                '>' => return Some(idx),
                '<' => return None,
                _ => {}
            },
        }
    }
    None
}

fn parse_attributes(mut s: &str) -> Option<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    loop {
        s = s.trim_start();
        if s.is_empty() {
            return Some(attributes);
        }

        let name_end = s.find(|c: char| c == '=' || c.is_whitespace()).unwrap_or(s.len());
        let name = &s[..name_end];
        if !is_valid_name(name) {
            return None;
        }

        s = s[name_end..].trim_start().strip_prefix('=')?.trim_start();
        let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value_end = s[1..].find(quote)? + 1;
        let value = super::decode_entities(&s[1..value_end]).into_owned();
        attributes.push((name.to_string(), value));
        s = &s[value_end + 1..];
    }
}
