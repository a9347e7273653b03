//! Forgiving template markup parser.
//!
//! Templates are plain text with embedded tags. Learned categories come from
//! untrusted conversation content, so parsing must never fail:
//!
//! - [`parse`] is total. Anything that is not a well-formed tag is text.
//! - A closing tag closes the innermost open element with the same name.
//!   Elements opened after it and still open are *degraded*: their opening tag
//!   becomes literal text and their children move up into the parent.
//! - A closing tag with no open counterpart is literal text.
//! - Elements still open at the end of input degrade the same way.
//!
//! ```text
//! "<b>x<i>y</b>"  ->  [b: ["x<i>y"]]
//! "x</b>"         ->  ["x</b>"]
//! "<think>x"      ->  ["<think>x"]
//! ```
//!
//! Admission-time checks need the opposite behaviour, so
//! [`check_structure`] walks the same lexemes strictly and reports the first
//! nesting violation instead of repairing it.

#[path = "markup/lexer.rs"]
mod lexer;
#[path = "markup/node.rs"]
mod node;

pub use node::{Element, Node, find_all, find_first, flatten_text, render};

use lexer::{Lexeme, Lexer};
use std::borrow::Cow;
use std::collections::BTreeSet;

struct Frame {
    name: String,
    attributes: Vec<(String, String)>,
    raw: String,
    children: Vec<Node>,
}

/// Parse template text into a node list. Never fails.
pub fn parse(text: &str) -> Vec<Node> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for lexeme in Lexer::new(text) {
        match lexeme {
            Lexeme::Text(raw) => push_text(current(&mut root, &mut stack), &decode_entities(raw)),
            Lexeme::Comment => {}
            Lexeme::SelfClose { name, attributes } => {
                let element = Element::new(name, attributes, Vec::new());
                current(&mut root, &mut stack).push(Node::Tag(element));
            }
            Lexeme::Open { name, attributes, raw } => {
                stack.push(Frame { name: name.to_string(), attributes, raw: raw.to_string(), children: Vec::new() });
            }
            Lexeme::Close { name, raw } => match stack.iter().rposition(|f| f.name == name) {
                Some(pos) => {
                    while stack.len() > pos + 1 {
                        if let Some(frame) = stack.pop() {
                            degrade(frame, current(&mut root, &mut stack));
                        }
                    }
                    if let Some(frame) = stack.pop() {
                        let mut element = Element::new(frame.name, frame.attributes, frame.children);
                        element.self_closing = false;
                        current(&mut root, &mut stack).push(Node::Tag(element));
                    }
                }
                None => push_text(current(&mut root, &mut stack), raw),
            },
        }
    }

    while let Some(frame) = stack.pop() {
        degrade(frame, current(&mut root, &mut stack));
    }
    root
}

fn current<'a>(root: &'a mut Vec<Node>, stack: &'a mut [Frame]) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(frame) => &mut frame.children,
        None => root,
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn push_node(nodes: &mut Vec<Node>, node: Node) {
    match node {
        Node::Text(t) => push_text(nodes, &t),
        tag => nodes.push(tag),
    }
}

/// Turn an unclosed frame into literal opening-tag text followed by its children.
fn degrade(frame: Frame, parent: &mut Vec<Node>) {
    push_text(parent, &frame.raw);
    for child in frame.children {
        push_node(parent, child);
    }
}

/// Decode the XML entities `&lt; &gt; &amp; &quot; &apos;` and numeric
/// character references. Unknown or invalid references are kept verbatim.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &tail[1..semi];
            let c = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, semi))
        });

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Shape of a template that passed [`check_structure`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    /// Deepest element nesting (a lone `<star/>` has depth 1).
    pub max_depth: usize,
    pub element_count: usize,
    /// Every tag name used, opening and self-closing.
    pub tag_names: BTreeSet<String>,
}

/// Strict nesting check: every closing tag must close the innermost open
/// element and nothing may be left open.
pub fn check_structure(text: &str) -> Result<Structure, String> {
    let mut structure = Structure::default();
    let mut open: Vec<&str> = Vec::new();

    for lexeme in Lexer::new(text) {
        match lexeme {
            Lexeme::Text(_) | Lexeme::Comment => {}
            Lexeme::SelfClose { name, .. } => {
                structure.element_count += 1;
                structure.max_depth = structure.max_depth.max(open.len() + 1);
                structure.tag_names.insert(name.to_string());
            }
            Lexeme::Open { name, .. } => {
                open.push(name);
                structure.element_count += 1;
                structure.max_depth = structure.max_depth.max(open.len());
                structure.tag_names.insert(name.to_string());
            }
            Lexeme::Close { name, .. } => match open.pop() {
                Some(top) if top == name => {}
                Some(top) => return Err(format!("found </{name}> while <{top}> is open")),
                None => return Err(format!("found </{name}> with no open tag")),
            },
        }
    }

    match open.last() {
        Some(name) => Err(format!("<{name}> is never closed")),
        None => Ok(structure),
    }
}

#[cfg(test)]
#[path = "markup/tests.rs"]
mod tests;
