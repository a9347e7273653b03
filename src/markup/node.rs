//! Parsed template tree and tree utilities.

use crate::eval::TagKind;
use std::fmt::Write as _;

/// A node of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Tag(Element),
}

/// A tag with its attributes (in source order) and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub self_closing: bool,
    /// Evaluator dispatch key, resolved once from `name` when the element is built.
    pub kind: Option<TagKind>,
}

impl Element {
    pub fn new(name: impl Into<String>, attributes: Vec<(String, String)>, children: Vec<Node>) -> Self {
        let name = name.into();
        let kind = TagKind::from_name(&name);
        let self_closing = children.is_empty();
        Element { name, attributes, children, self_closing, kind }
    }

    /// Value of the first attribute called `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Direct children that are elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First direct child element called `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name == name)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    pub(crate) fn render_open(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, escape(value, true));
        }
        if self.self_closing {
            out.push_str("/>");
        } else {
            out.push('>');
        }
    }

    pub(crate) fn render_close(&self, out: &mut String) {
        if !self.self_closing {
            let _ = write!(out, "</{}>", self.name);
        }
    }

    fn render_into(&self, out: &mut String) {
        self.render_open(out);
        if !self.self_closing {
            for child in &self.children {
                child.render_into(out);
            }
        }
        self.render_close(out);
    }
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Tag(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t),
            Node::Tag(_) => None,
        }
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&escape(t, false)),
            Node::Tag(e) => e.render_into(out),
        }
    }
}

/// Serialize nodes back to markup. Text is escaped so that re-parsing gives a
/// structurally equal tree.
pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.render_into(&mut out);
    }
    out
}

/// All elements called `name`, depth-first in document order.
pub fn find_all<'a>(nodes: &'a [Node], name: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect(nodes, name, &mut found);
    found
}

fn collect<'a>(nodes: &'a [Node], name: &str, found: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Tag(e) = node {
            if e.name == name {
                found.push(e);
            }
            collect(&e.children, name, found);
        }
    }
}

/// First element called `name`, depth-first in document order.
pub fn find_first<'a>(nodes: &'a [Node], name: &str) -> Option<&'a Element> {
    for node in nodes {
        if let Node::Tag(e) = node {
            if e.name == name {
                return Some(e);
            }
            if let Some(found) = find_first(&e.children, name) {
                return Some(found);
            }
        }
    }
    None
}

/// Concatenate all text content, ignoring tag boundaries.
pub fn flatten_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    flatten_into(nodes, &mut out);
    out
}

fn flatten_into(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Tag(e) => flatten_into(&e.children, out),
        }
    }
}

fn escape(s: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
