//! Per-conversation state.
//!
//! A [`ChatSession`] is created by the caller, handed to the interpreter as
//! `&mut` for every turn, and cleared or dropped by the caller. Nothing here is
//! shared between sessions, so none of it is synchronized; the interpreter's
//! signatures make driving one session from two callers at once impossible.
//!
//! Histories are bounded and most-recent-last. Index accessors are 1-based
//! from the newest entry: `request(1)` is the latest request.

use crate::learning::{LearnedCategory, LearningStats};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Number of previous responses kept for `that` matching.
pub const THAT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_HISTORY_LIMIT: usize = 32;

#[derive(Debug, Clone)]
pub struct ChatSession {
    id: String,
    variables: HashMap<String, String>,
    request_history: VecDeque<String>,
    response_history: VecDeque<String>,
    that_history: VecDeque<String>,
    history_limit: usize,
    topic: String,
    lists: HashMap<String, Vec<String>>,
    maps: HashMap<String, BTreeMap<String, String>>,
    learned: Vec<LearnedCategory>,
    learning_stats: LearningStats,
    created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_history_limit(id, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(id: impl Into<String>, history_limit: usize) -> Self {
        let created_at = Utc::now();
        ChatSession {
            id: id.into(),
            variables: HashMap::new(),
            request_history: VecDeque::new(),
            response_history: VecDeque::new(),
            that_history: VecDeque::new(),
            history_limit: history_limit.max(1),
            topic: String::new(),
            lists: HashMap::new(),
            maps: HashMap::new(),
            learned: Vec::new(),
            learning_stats: LearningStats::starting_at(created_at),
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // --- Variables -----------------------------------------------------------

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    /// Set a session variable. Setting `topic` also changes the current topic.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if name == "topic" {
            self.topic = value.clone();
        }
        self.variables.insert(name, value);
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        let topic = topic.into();
        self.variables.insert("topic".to_string(), topic.clone());
        self.topic = topic;
    }

    // --- Histories -----------------------------------------------------------

    pub fn push_request(&mut self, request: impl Into<String>) {
        push_bounded(&mut self.request_history, request.into(), self.history_limit);
    }

    /// Record a response; it also becomes the newest `that`.
    pub fn push_response(&mut self, response: impl Into<String>) {
        let response = response.into();
        push_bounded(&mut self.that_history, response.clone(), THAT_HISTORY_LIMIT);
        push_bounded(&mut self.response_history, response, self.history_limit);
    }

    pub fn request(&self, index: usize) -> Option<&str> {
        nth_recent(&self.request_history, index)
    }

    pub fn response(&self, index: usize) -> Option<&str> {
        nth_recent(&self.response_history, index)
    }

    pub fn that(&self, index: usize) -> Option<&str> {
        nth_recent(&self.that_history, index)
    }

    /// The response the next input is answering, or `""` at the start.
    pub fn last_response(&self) -> &str {
        self.that(1).unwrap_or("")
    }

    pub fn request_history(&self) -> impl Iterator<Item = &str> {
        self.request_history.iter().map(String::as_str)
    }

    pub fn response_history(&self) -> impl Iterator<Item = &str> {
        self.response_history.iter().map(String::as_str)
    }

    pub fn that_history(&self) -> impl Iterator<Item = &str> {
        self.that_history.iter().map(String::as_str)
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    // --- Named collections ---------------------------------------------------

    pub fn list(&self, name: &str) -> &[String] {
        self.lists.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn list_add(&mut self, name: &str, value: impl Into<String>) {
        self.lists.entry(name.to_string()).or_default().push(value.into());
    }

    /// 1-based item lookup.
    pub fn list_get(&self, name: &str, index: usize) -> Option<&str> {
        index.checked_sub(1).and_then(|i| self.list(name).get(i)).map(String::as_str)
    }

    /// Replace the item at 1-based `index`. Out-of-range indices are ignored.
    pub fn list_set(&mut self, name: &str, index: usize, value: impl Into<String>) -> bool {
        match (index.checked_sub(1), self.lists.get_mut(name)) {
            (Some(i), Some(items)) if i < items.len() => {
                items[i] = value.into();
                true
            }
            _ => false,
        }
    }

    /// Remove the item at 1-based `index`.
    pub fn list_remove_at(&mut self, name: &str, index: usize) -> Option<String> {
        let items = self.lists.get_mut(name)?;
        let i = index.checked_sub(1).filter(|i| *i < items.len())?;
        Some(items.remove(i))
    }

    /// Remove the first item equal to `value`.
    pub fn list_remove_value(&mut self, name: &str, value: &str) -> bool {
        let Some(items) = self.lists.get_mut(name) else {
            return false;
        };
        match items.iter().position(|item| item == value) {
            Some(i) => {
                items.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn list_clear(&mut self, name: &str) {
        self.lists.remove(name);
    }

    pub fn map(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.maps.get(name)
    }

    pub fn map_set(&mut self, name: &str, key: impl Into<String>, value: impl Into<String>) {
        self.maps.entry(name.to_string()).or_default().insert(key.into(), value.into());
    }

    pub fn map_get(&self, name: &str, key: &str) -> Option<&str> {
        self.maps.get(name).and_then(|m| m.get(key)).map(String::as_str)
    }

    pub fn map_remove(&mut self, name: &str, key: &str) -> Option<String> {
        self.maps.get_mut(name).and_then(|m| m.remove(key))
    }

    pub fn map_clear(&mut self, name: &str) {
        self.maps.remove(name);
    }

    // --- Learning ------------------------------------------------------------

    /// Categories this session has learned, oldest first.
    pub fn learned(&self) -> &[LearnedCategory] {
        &self.learned
    }

    pub fn learning_stats(&self) -> &LearningStats {
        &self.learning_stats
    }

    pub(crate) fn learned_mut(&mut self) -> &mut Vec<LearnedCategory> {
        &mut self.learned
    }

    pub(crate) fn learning_stats_mut(&mut self) -> &mut LearningStats {
        &mut self.learning_stats
    }

    /// Forget everything except the id. Learned categories stay in the
    /// knowledge base; use unlearn to remove those.
    pub fn clear(&mut self) {
        let id = std::mem::take(&mut self.id);
        *self = ChatSession::with_history_limit(id, self.history_limit);
    }
}

fn push_bounded(history: &mut VecDeque<String>, value: String, limit: usize) {
    history.push_back(value);
    while history.len() > limit {
        history.pop_front();
    }
}

fn nth_recent(history: &VecDeque<String>, index: usize) -> Option<&str> {
    let back = index.checked_sub(1)?;
    let pos = history.len().checked_sub(back + 1)?;
    history.get(pos).map(String::as_str)
}
