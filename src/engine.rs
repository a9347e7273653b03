//! Matching engine.
//!
//! This module is the public entry point for rule storage and selection. It
//! is split into focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! ```text
//! categories ──┐
//!              │  KnowledgeBase::add_category / reload   (knowledge.rs)
//!              └──────────────┬──────────────
//!                             │ RwLock<Arc<RuleSet>>    (compiled_rules.rs)
//!                             v
//! input ── Utterance::scan ───┼─ activate rules (first word + word gating)
//!          (trigger.rs)       │
//!                             v
//!                  PatternMatcher::resolve               (matcher.rs)
//!                    - compile patterns (pattern cache)
//!                    - match input / that / topic (verdict cache)
//!                    - rank eligible candidates
//!                             │
//!                             v
//!                  MatchResult { category, bindings }
//! ```
//!
//! ## Responsibilities by module
//!
//! - `pattern.rs`: pattern syntax, compilation and backtracking match with
//!   per-word precedence weights.
//! - `trigger.rs`: input normalization and the word set used for gating.
//! - `compiled_rules.rs`: immutable indexed snapshots of the rule list.
//! - `knowledge.rs`: `Category` and the copy-on-write `KnowledgeBase`.
//! - `matcher.rs`: candidate selection, ranking and capture binding.
//! - `cache.rs`: the LRU + TTL cache shared by every cache in the crate.
//! - `metrics.rs`: counters and ranking reported by `explain`.
//!
//! ## Debugging
//!
//! Selection is logged at `debug` level on the `parley::engine` target; cache
//! evictions and per-run counters at `trace`.

#[path = "engine/cache.rs"]
mod cache;
#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/knowledge.rs"]
mod knowledge;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/pattern.rs"]
mod pattern;
#[path = "engine/trigger.rs"]
mod trigger;

pub use cache::{CacheStats, TtlLruCache};
pub use compiled_rules::{Constraints, RuleMeta, RuleSet};
pub use knowledge::{Category, KnowledgeBase};
pub use matcher::{MatchContext, MatchResult, PatternMatcher};
pub use metrics::{MatchDetails, MatchMetrics, RankedCandidate};
pub use pattern::{CompiledPattern, PatternMatch, PatternToken, Wildcard};
pub use trigger::Utterance;
