//! The closed tag vocabulary.
//!
//! Tag names are resolved to a [`TagKind`] once, when the element is built by
//! the markup parser; the evaluator dispatches on the enum and never compares
//! tag-name strings per call.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Every tag the evaluator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    // Variable I/O
    Get,
    Set,
    Bot,
    // Context references
    Star,
    ThatStar,
    TopicStar,
    Input,
    Request,
    Response,
    That,
    // Control
    Condition,
    Li,
    Random,
    Think,
    // Recursive resolution and learning
    Srai,
    Sr,
    Learn,
    Unlearn,
    Eval,
    // Case transforms
    Uppercase,
    Lowercase,
    Formal,
    Sentence,
    Word,
    // Pronoun transforms
    Person,
    Person2,
    Gender,
    // String operations
    Substring,
    Replace,
    Length,
    Count,
    // Named collections
    List,
    Map,
    // Triples
    Subj,
    Pred,
    Obj,
    Uniq,
}

const ALL: &[(&str, TagKind)] = &[
    ("get", TagKind::Get),
    ("set", TagKind::Set),
    ("bot", TagKind::Bot),
    ("star", TagKind::Star),
    ("thatstar", TagKind::ThatStar),
    ("topicstar", TagKind::TopicStar),
    ("input", TagKind::Input),
    ("request", TagKind::Request),
    ("response", TagKind::Response),
    ("that", TagKind::That),
    ("condition", TagKind::Condition),
    ("li", TagKind::Li),
    ("random", TagKind::Random),
    ("think", TagKind::Think),
    ("srai", TagKind::Srai),
    ("sr", TagKind::Sr),
    ("learn", TagKind::Learn),
    ("unlearn", TagKind::Unlearn),
    ("eval", TagKind::Eval),
    ("uppercase", TagKind::Uppercase),
    ("lowercase", TagKind::Lowercase),
    ("formal", TagKind::Formal),
    ("sentence", TagKind::Sentence),
    ("word", TagKind::Word),
    ("person", TagKind::Person),
    ("person2", TagKind::Person2),
    ("gender", TagKind::Gender),
    ("substring", TagKind::Substring),
    ("replace", TagKind::Replace),
    ("length", TagKind::Length),
    ("count", TagKind::Count),
    ("list", TagKind::List),
    ("map", TagKind::Map),
    ("subj", TagKind::Subj),
    ("pred", TagKind::Pred),
    ("obj", TagKind::Obj),
    ("uniq", TagKind::Uniq),
];

static BY_NAME: Lazy<HashMap<&'static str, TagKind>> = Lazy::new(|| ALL.iter().copied().collect());

/// Element names that are not tags in their own right but are legal inside
/// templates: category structure (inside `learn`) and attributes written as
/// child elements.
pub(crate) const STRUCTURAL_NAMES: &[&str] = &[
    "category", "pattern", "template", "topic", "name", "var", "value", "index", "search", "key", "action", "mode",
    "start", "end",
];

impl TagKind {
    pub fn from_name(name: &str) -> Option<Self> {
        BY_NAME.get(name).copied()
    }

    pub fn name(self) -> &'static str {
        ALL.iter().find(|(_, kind)| *kind == self).map(|(name, _)| *name).unwrap_or("")
    }

    /// Attribute names this tag accepts. When written as child elements they
    /// are not part of the tag's content.
    pub(crate) fn attribute_names(self) -> &'static [&'static str] {
        match self {
            TagKind::Get | TagKind::Set => &["name", "var"],
            TagKind::Bot => &["name"],
            TagKind::Star
            | TagKind::ThatStar
            | TagKind::TopicStar
            | TagKind::Input
            | TagKind::Request
            | TagKind::Response
            | TagKind::That => &["index"],
            TagKind::Condition | TagKind::Li => &["name", "var", "value"],
            TagKind::Substring => &["start", "end"],
            TagKind::Replace => &["search", "replace"],
            TagKind::Length => &["mode"],
            TagKind::Count => &["mode", "search"],
            TagKind::List => &["name", "action", "index"],
            TagKind::Map => &["name", "action", "key"],
            _ => &[],
        }
    }

    /// Tags that reference wildcard bindings.
    pub(crate) fn is_wildcard_reference(self) -> bool {
        matches!(self, TagKind::Star | TagKind::ThatStar | TagKind::TopicStar | TagKind::Sr)
    }

    /// Tags that re-enter pattern matching.
    pub(crate) fn is_self_reference(self) -> bool {
        matches!(self, TagKind::Srai | TagKind::Sr)
    }
}

/// Is `name` legal inside an admitted template?
pub(crate) fn is_known_element(name: &str) -> bool {
    TagKind::from_name(name).is_some() || STRUCTURAL_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for (name, kind) in ALL {
            assert_eq!(TagKind::from_name(name), Some(*kind));
            assert_eq!(kind.name(), *name);
        }
    }

    #[test]
    fn unknown_names_are_not_tags() {
        assert_eq!(TagKind::from_name("script"), None);
        assert_eq!(TagKind::from_name("STAR"), None);
        assert!(is_known_element("category"));
        assert!(!is_known_element("blink"));
    }
}
