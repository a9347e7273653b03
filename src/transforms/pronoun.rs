//! Pronoun substitution for the `person`, `person2` and `gender` tags.
//!
//! Substitution runs token by token. Each whitespace-separated token is split
//! into leading punctuation, a core word and trailing punctuation; only the
//! core is looked up, so `"me,"` becomes `"you,"`. The replacement takes the
//! case shape of the original (`ME` → `YOU`, `Me` → `You`), except that the
//! pronoun `I` is always written capitalized and is not itself treated as a
//! capitalized word unless it starts the text.
//!
//! A few words are ambiguous without grammar (`you` → `I` or `me`, `her` →
//! `him` or `his`, `are` → `am` only after `you`). Those are decided from the
//! neighbouring words by the small contextual rules in [`contextual`].

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Which substitution table to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pronoun {
    /// First person ↔ second person.
    Person,
    /// First person ↔ third person.
    Person2,
    /// Masculine ↔ feminine.
    Gender,
}

/// First ↔ second person, unambiguous forms.
static PERSON_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("i", "you"),
        ("me", "you"),
        ("my", "your"),
        ("mine", "yours"),
        ("myself", "yourself"),
        ("am", "are"),
        ("i'm", "you're"),
        ("i've", "you've"),
        ("i'll", "you'll"),
        ("i'd", "you'd"),
        ("your", "my"),
        ("yours", "mine"),
        ("yourself", "myself"),
        ("you're", "I'm"),
        ("you've", "I've"),
        ("you'll", "I'll"),
        ("you'd", "I'd"),
        ("us", "you"),
        ("our", "your"),
        ("ours", "yours"),
        ("ourselves", "yourselves"),
        ("yourselves", "ourselves"),
    ])
});

/// First ↔ third person, unambiguous forms.
static PERSON2_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("i", "he"),
        ("me", "him"),
        ("my", "his"),
        ("mine", "his"),
        ("myself", "himself"),
        ("am", "is"),
        ("i'm", "he's"),
        ("i've", "he's"),
        ("i'll", "he'll"),
        ("i'd", "he'd"),
        ("he", "I"),
        ("she", "I"),
        ("him", "me"),
        ("his", "my"),
        ("hers", "mine"),
        ("himself", "myself"),
        ("herself", "myself"),
        ("he's", "I'm"),
        ("she's", "I'm"),
        ("he'll", "I'll"),
        ("she'll", "I'll"),
        ("he'd", "I'd"),
        ("she'd", "I'd"),
    ])
});

/// Masculine ↔ feminine, unambiguous forms.
static GENDER_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("he", "she"),
        ("she", "he"),
        ("him", "her"),
        ("his", "her"),
        ("hers", "his"),
        ("himself", "herself"),
        ("herself", "himself"),
        ("he's", "she's"),
        ("she's", "he's"),
        ("he'll", "she'll"),
        ("she'll", "he'll"),
        ("he'd", "she'd"),
        ("she'd", "he'd"),
        ("man", "woman"),
        ("woman", "man"),
        ("men", "women"),
        ("women", "men"),
        ("boy", "girl"),
        ("girl", "boy"),
        ("boys", "girls"),
        ("girls", "boys"),
        ("mr", "ms"),
        ("ms", "mr"),
        ("mrs", "mr"),
        ("king", "queen"),
        ("queen", "king"),
        ("father", "mother"),
        ("mother", "father"),
        ("brother", "sister"),
        ("sister", "brother"),
        ("son", "daughter"),
        ("daughter", "son"),
        ("husband", "wife"),
        ("wife", "husband"),
        ("boyfriend", "girlfriend"),
        ("girlfriend", "boyfriend"),
    ])
});

/// Words after which a bare `you` is the subject of the sentence.
static SUBJECT_VERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "are", "were", "have", "had", "will", "would", "can", "could", "should", "shall", "do", "did", "don't",
        "didn't", "can't", "won't", "may", "might", "must", "need", "want", "like", "love", "hate", "know", "think",
        "feel", "see", "say", "said", "get", "go", "went", "seem", "look", "really", "also", "always", "never",
    ])
});

/// Words after which `her` is an object pronoun rather than a possessive.
static OBJECT_FOLLOWERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "and", "or", "but", "to", "at", "in", "on", "with", "for", "from", "about", "is", "was", "that", "then",
        "too", "again", "yesterday", "today", "tomorrow", "now", "back", "up", "down", "out", "off", "away",
    ])
});

/// Apply `table` to every word of `text`, keeping whitespace and punctuation.
pub fn substitute(text: &str, table: Pronoun) -> String {
    let tokens: Vec<Token<'_>> = split_tokens(text);
    let cores: Vec<String> = tokens.iter().map(|t| normalize_core(t.core)).collect();

    let mut out = String::with_capacity(text.len());
    let mut word_idx = 0;
    for (i, token) in tokens.iter().enumerate() {
        out.push_str(token.space);
        out.push_str(token.lead);
        if token.core.is_empty() {
            out.push_str(token.trail);
            continue;
        }

        let prev = i.checked_sub(1).map(|j| cores[j].as_str());
        let next = cores.get(i + 1).map(String::as_str);
        let replacement = contextual(table, &cores[i], prev, next, word_idx)
            .or_else(|| table_for(table).get(cores[i].as_str()).copied());

        match replacement {
            Some(rep) => out.push_str(&match_case(token.core, rep, word_idx == 0)),
            None => out.push_str(token.core),
        }
        out.push_str(token.trail);
        word_idx += 1;
    }
    out.push_str(trailing_space(text, &tokens));
    out
}

fn table_for(table: Pronoun) -> &'static HashMap<&'static str, &'static str> {
    match table {
        Pronoun::Person => &PERSON_MAP,
        Pronoun::Person2 => &PERSON2_MAP,
        Pronoun::Gender => &GENDER_MAP,
    }
}

/// Rules for words whose replacement depends on their neighbours.
fn contextual(
    table: Pronoun,
    core: &str,
    prev: Option<&str>,
    next: Option<&str>,
    word_idx: usize,
) -> Option<&'static str> {
    match (table, core) {
        (Pronoun::Person, "you") => {
            let subject = word_idx == 0 || next.is_some_and(|n| SUBJECT_VERBS.contains(n));
            Some(if subject { "I" } else { "me" })
        }
        (Pronoun::Person, "are") if prev == Some("you") => Some("am"),
        (Pronoun::Person, "were") if prev == Some("you") => Some("was"),
        (Pronoun::Person, "was") if prev == Some("i") => Some("were"),
        (Pronoun::Person2, "is") if matches!(prev, Some("he" | "she")) => Some("am"),
        (Pronoun::Person2, "was") if prev == Some("i") => Some("was"),
        (Pronoun::Person2, "her") => Some(if possessive_follows(next) { "my" } else { "me" }),
        (Pronoun::Gender, "her") => Some(if possessive_follows(next) { "his" } else { "him" }),
        _ => None,
    }
}

fn possessive_follows(next: Option<&str>) -> bool {
    next.is_some_and(|n| !n.is_empty() && !OBJECT_FOLLOWERS.contains(n))
}

/// Give `replacement` the case shape of `original`.
fn match_case(original: &str, replacement: &str, first_word: bool) -> String {
    if replacement.starts_with('I') && (replacement.len() == 1 || replacement[1..].starts_with('\'')) {
        // "I", "I'm", ... keep their capital I whatever the source looked like.
        if original.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase) && original.chars().count() > 1 {
            return replacement.to_uppercase();
        }
        return replacement.to_string();
    }

    let is_pronoun_i = is_first_person_singular(original);
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    let all_upper = letters.len() > 1 && letters.iter().all(|c| c.is_uppercase());

    if all_upper {
        return replacement.to_uppercase();
    }
    let capitalized = letters.first().is_some_and(|c| c.is_uppercase());
    if (capitalized && !is_pronoun_i) || (is_pronoun_i && first_word) {
        return capitalize(replacement);
    }
    replacement.to_lowercase()
}

fn is_first_person_singular(word: &str) -> bool {
    matches!(normalize_core(word).as_str(), "i" | "i'm" | "i've" | "i'll" | "i'd")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn normalize_core(core: &str) -> String {
    core.to_lowercase().replace('\u{2019}', "'")
}

struct Token<'a> {
    space: &'a str,
    lead: &'a str,
    core: &'a str,
    trail: &'a str,
}

/// Split into (whitespace, leading punctuation, word, trailing punctuation) runs.
fn split_tokens(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = text;
    loop {
        let ws_end = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        if ws_end == rest.len() {
            break;
        }
        let space = &rest[..ws_end];
        rest = &rest[ws_end..];
        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..word_end];
        rest = &rest[word_end..];

        let is_word_char = |c: char| c.is_alphanumeric() || c == '\'' || c == '\u{2019}';
        let core_start = word.find(is_word_char).unwrap_or(word.len());
        let core_end = word.rfind(is_word_char).map(|i| i + word[i..].chars().next().map_or(1, char::len_utf8));
        let core_end = core_end.unwrap_or(core_start).max(core_start);
        let core = word[core_start..core_end].trim_matches(|c| c == '\'' || c == '\u{2019}');
        let core_offset = core_start + word[core_start..core_end].find(core).unwrap_or(0);

        tokens.push(Token {
            space,
            lead: &word[..core_offset],
            core,
            trail: &word[core_offset + core.len()..],
        });
    }
    tokens
}

fn trailing_space<'a>(text: &'a str, tokens: &[Token<'_>]) -> &'a str {
    if tokens.is_empty() {
        return text;
    }
    let end = text.trim_end().len();
    &text[end..]
}
