//! Admission checks for learned categories.
//!
//! Checks run in a fixed order and stop at the first violation:
//!
//! ```text
//! empty pattern / template
//! dangerous content           (every field)
//! pattern length, template length
//! input pattern               chars, wildcards, adjacency, groups, tokens
//! that / topic patterns       length + the same pattern checks
//! template                    tag balance, nesting, tag names, recursion caps
//! ```

use crate::config::LearningLimits;
use crate::engine::Category;
use crate::error::LearnError;
use crate::markup::{self, Node};

const INVALID_PATTERN_CHARS: &[char] = &['<', '>', '{', '}', '[', ']', '\\', ';', '"', '`', '='];

pub fn validate(category: &Category, limits: &LearningLimits) -> Result<(), LearnError> {
    if category.pattern.trim().is_empty() {
        return Err(LearnError::EmptyPattern);
    }
    if category.template.trim().is_empty() {
        return Err(LearnError::EmptyTemplate);
    }

    check_dangerous("pattern", &category.pattern)?;
    if let Some(that) = &category.that {
        check_dangerous("that", that)?;
    }
    if let Some(topic) = &category.topic {
        check_dangerous("topic", topic)?;
    }
    check_dangerous("template", &category.template)?;

    check_pattern_length("input", &category.pattern, limits)?;
    let template_len = category.template.chars().count();
    if template_len > limits.max_template_length {
        return Err(LearnError::TemplateTooLong { max: limits.max_template_length, got: template_len });
    }
    check_pattern("input", &category.pattern, limits)?;

    for (field, pattern) in [("that", &category.that), ("topic", &category.topic)] {
        if let Some(pattern) = pattern.as_deref().filter(|p| !p.trim().is_empty()) {
            check_pattern_length(field, pattern, limits)?;
            check_pattern(field, pattern, limits)?;
        }
    }

    check_template(&category.template, limits)
}

fn check_dangerous(field: &'static str, text: &str) -> Result<(), LearnError> {
    let patterns = [
        crate::regex!(r"(?i)<\s*script"),
        crate::regex!(r"(?i)\b(?:java|vb)script\s*:"),
        crate::regex!(r"(?i)\bdata\s*:\s*[a-z]+/[a-z0-9.+-]+"),
        crate::regex!(r"(?i)<[^>]*\bon[a-z]+\s*="),
    ];
    match patterns.iter().find_map(|re| re.find(text)) {
        Some(found) => Err(LearnError::DangerousContent { field, snippet: found.as_str().to_string() }),
        None => Ok(()),
    }
}

fn check_pattern_length(field: &'static str, pattern: &str, limits: &LearningLimits) -> Result<(), LearnError> {
    let len = pattern.trim().chars().count();
    if len > limits.max_pattern_length {
        return Err(LearnError::PatternTooLong { field, max: limits.max_pattern_length, got: len });
    }
    if len < limits.min_pattern_length {
        return Err(LearnError::PatternTooShort { field, min: limits.min_pattern_length, got: len });
    }
    Ok(())
}

fn is_wildcard(token: &str) -> bool {
    matches!(token, "*" | "_" | "#" | "$")
}

fn check_pattern(field: &'static str, pattern: &str, limits: &LearningLimits) -> Result<(), LearnError> {
    let mut invalid: Vec<char> = pattern.chars().filter(|c| c.is_control() || INVALID_PATTERN_CHARS.contains(c)).collect();
    if !invalid.is_empty() {
        invalid.sort_unstable();
        invalid.dedup();
        let chars = invalid.iter().map(|c| format!("{c:?}")).collect::<Vec<_>>().join(" ");
        return Err(LearnError::InvalidCharacters { field, chars });
    }

    let tokens: Vec<&str> = pattern.split_whitespace().collect();
    let wildcards = tokens.iter().filter(|t| is_wildcard(t)).count();
    if wildcards > limits.max_wildcards {
        return Err(LearnError::TooManyWildcards { field, max: limits.max_wildcards, got: wildcards });
    }
    if let Some(position) = tokens.windows(2).position(|pair| is_wildcard(pair[0]) && is_wildcard(pair[1])) {
        return Err(LearnError::ConsecutiveWildcards { field, position: position + 2 });
    }

    check_groups(field, pattern)?;

    if tokens.len() > limits.max_pattern_tokens {
        return Err(LearnError::PatternTooComplex { field, max: limits.max_pattern_tokens, got: tokens.len() });
    }
    Ok(())
}

/// Balanced parentheses, no nesting, every group a real alternation.
fn check_groups(field: &'static str, pattern: &str) -> Result<(), LearnError> {
    let mut depth: usize = 0;
    for c in pattern.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or(LearnError::UnbalancedParentheses { field })?,
            _ => {}
        }
    }
    if depth != 0 {
        return Err(LearnError::UnbalancedParentheses { field });
    }

    let mut rest = pattern;
    while let Some(open) = rest.find('(') {
        let body = &rest[open + 1..];
        let close = body.find(')').ok_or(LearnError::UnbalancedParentheses { field })?;
        let group = &body[..close];
        let options: Vec<&str> = group.split('|').map(str::trim).collect();
        if group.contains('(') || options.len() < 2 || options.iter().any(|o| o.is_empty()) {
            return Err(LearnError::BadAlternation { field, group: format!("({group})") });
        }
        rest = &body[close + 1..];
    }
    Ok(())
}

fn check_template(template: &str, limits: &LearningLimits) -> Result<(), LearnError> {
    let structure = markup::check_structure(template).map_err(|detail| LearnError::UnbalancedTags { detail })?;
    if structure.max_depth > limits.max_nesting_depth {
        return Err(LearnError::ExcessiveNesting { max: limits.max_nesting_depth, got: structure.max_depth });
    }
    if let Some(name) = structure.tag_names.iter().find(|name| !crate::eval::is_known_element(name)) {
        return Err(LearnError::UnknownTag { name: name.clone() });
    }

    let nodes = markup::parse(template);
    let self_refs = count_elements(&nodes, &|kind| kind.is_self_reference());
    if self_refs > limits.max_self_references {
        return Err(LearnError::TooManySelfReferences { max: limits.max_self_references, got: self_refs });
    }
    let wildcard_refs = count_elements(&nodes, &|kind| kind.is_wildcard_reference());
    if wildcard_refs > limits.max_wildcard_references {
        return Err(LearnError::TooManyWildcardReferences { max: limits.max_wildcard_references, got: wildcard_refs });
    }
    Ok(())
}

fn count_elements(nodes: &[Node], wanted: &dyn Fn(crate::eval::TagKind) -> bool) -> usize {
    nodes
        .iter()
        .filter_map(Node::as_element)
        .map(|e| usize::from(e.kind.is_some_and(wanted)) + count_elements(&e.children, wanted))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(pattern: &str, template: &str) -> Result<(), LearnError> {
        validate(&Category::new(pattern, template), &LearningLimits::default())
    }

    fn reason(pattern: &str, template: &str) -> &'static str {
        check(pattern, template).map_or_else(|e| e.reason(), |_| "ok")
    }

    #[test]
    fn empty_pattern_is_rejected_first() {
        let err = check("", "").unwrap_err();
        assert!(err.to_string().contains("pattern cannot be empty"));
        assert_eq!(reason("   ", "x"), "empty_pattern");
        assert_eq!(reason("HI", " "), "empty_template");
    }

    #[test]
    fn twelve_wildcards_is_too_many() {
        let err = check("* * * * * * * * * * * *", "x").unwrap_err();
        assert!(err.to_string().contains("too many wildcards"), "{err}");
    }

    #[test]
    fn rejection_reasons() {
        let long = "A ".repeat(200);
        let many_tokens = "A ".repeat(40);
        let unclosed = format!("{}x", "<think>".repeat(9));
        let huge = "x".repeat(5000);
        let stars = "<star/>".repeat(17);
        let cases: Vec<(&str, &str, &str)> = vec![
            ("HELLO", "hi there", "ok"),
            ("HELLO * FRIEND", "hi <star/>", "ok"),
            ("(HI|HELLO) _", "<srai>HI</srai>", "ok"),
            ("HELLO", "<script>alert(1)</script>", "dangerous_content"),
            ("HELLO", "<a href=\"javascript:alert(1)\">x</a>", "dangerous_content"),
            ("HELLO", "<think onload=\"x\"/>", "dangerous_content"),
            ("HELLO", "data:text/html;base64,AAAA", "dangerous_content"),
            (long.as_str(), "x", "pattern_too_long"),
            ("HELLO", huge.as_str(), "template_too_long"),
            ("HELLO; DROP", "x", "invalid_characters"),
            ("HELLO * *", "x", "consecutive_wildcards"),
            ("HELLO # $", "x", "consecutive_wildcards"),
            ("(HI|HELLO", "x", "unbalanced_parentheses"),
            ("HI) (THERE", "x", "unbalanced_parentheses"),
            ("(HI) THERE", "x", "bad_alternation"),
            ("(HI|) THERE", "x", "bad_alternation"),
            ("(HI|(A|B)) THERE", "x", "bad_alternation"),
            (many_tokens.as_str(), "x", "pattern_too_complex"),
            ("HELLO", "<think>x", "unbalanced_tags"),
            ("HELLO", unclosed.as_str(), "unbalanced_tags"),
            ("HELLO", "<b>x</b>", "unknown_tag"),
            ("HELLO", "<srai>A</srai><sr/><sr/><sr/><sr/><sr/>", "too_many_self_references"),
            ("HELLO", stars.as_str(), "too_many_wildcard_references"),
        ];
        for (pattern, template, expected) in cases {
            assert_eq!(reason(pattern, template), expected, "pattern={pattern:?} template={template:?}");
        }
    }

    #[test]
    fn nesting_limit() {
        let deep = format!("{}x{}", "<think>".repeat(9), "</think>".repeat(9));
        assert_eq!(reason("HELLO", &deep), "excessive_nesting");
        let ok = format!("{}x{}", "<think>".repeat(8), "</think>".repeat(8));
        assert_eq!(reason("HELLO", &ok), "ok");
    }

    #[test]
    fn that_and_topic_are_checked_too() {
        let limits = LearningLimits::default();
        let c = Category::new("YES", "ok").with_that("* *");
        assert_eq!(validate(&c, &limits).unwrap_err().reason(), "consecutive_wildcards");
        let c = Category::new("YES", "ok").with_topic("(A|)");
        assert_eq!(validate(&c, &limits).unwrap_err().reason(), "bad_alternation");
        let c = Category::new("YES", "ok").with_that("DO YOU LIKE *").with_topic("PETS");
        assert!(validate(&c, &limits).is_ok());
    }

    #[test]
    fn learn_markup_is_known() {
        let template = "<learn><category><pattern>A</pattern><template><eval><star/></eval></template></category></learn>";
        assert_eq!(reason("TEACH *", template), "ok");
    }
}
