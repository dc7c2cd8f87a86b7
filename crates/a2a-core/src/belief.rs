//! Belief State and the domain/slot taxonomy consumed by the Intent/Slot
//! Engine (I, "BST" — spec.md §3 "Belief State", §4.6).
//!
//! Grounded on
//! `examples/original_source/extensions/before_main_llm_call/_10_belief_state_tracker.py`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-conversation belief state, TTL = N turns (spec.md §3/§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefState {
    pub domain: String,
    pub turn: u32,
    #[serde(default)]
    pub slots: HashMap<String, Option<Value>>,
    #[serde(default)]
    pub missing_required: Vec<String>,
    pub confidence: f32,
    #[serde(default)]
    pub clarifications_asked: u32,
}

impl BeliefState {
    pub fn new(domain: impl Into<String>, turn: u32) -> Self {
        Self {
            domain: domain.into(),
            turn,
            slots: HashMap::new(),
            missing_required: Vec::new(),
            confidence: 0.0,
            clarifications_asked: 0,
        }
    }

    /// Whether this belief is still within the given TTL, measured in turns
    /// elapsed since it was last updated.
    pub fn within_ttl(&self, current_turn: u32, ttl_turns: u32) -> bool {
        current_turn.saturating_sub(self.turn) <= ttl_turns
    }
}

/// One resolver strategy for filling a slot, tried in order until one
/// returns non-null (spec.md §4.6 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotResolver {
    KeywordMap,
    FileExtensionInference,
    LastMentionedFile,
    LastMentionedPath,
    LastMentionedEntity,
    HistoryScan,
    ContextInference,
    Default,
}

/// Definition of a single slot within a domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDef {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub resolvers: Vec<SlotResolver>,
    /// Maps surface keywords to a resolved value, consumed by
    /// [`SlotResolver::KeywordMap`].
    #[serde(default)]
    pub keyword_map: HashMap<String, Value>,
    #[serde(default)]
    pub default: Option<Value>,
    /// Clarifying question asked when this slot is missing and required
    /// (spec.md §4.6 step 5 "clarify").
    #[serde(default)]
    pub clarification_question: Option<String>,
    /// This slot is only `required` when the named slot already holds a
    /// value (spec.md §4.6 step 3 "Honor `required_when` conditional
    /// dependencies").
    #[serde(default)]
    pub required_when: Option<String>,
}

/// A single trigger phrase and its word-count weight for domain
/// classification (spec.md §4.6 step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerPhrase {
    pub phrase: String,
}

impl TriggerPhrase {
    pub fn weight(&self) -> usize {
        self.phrase.split_whitespace().count().max(1)
    }
}

/// One domain in the classification taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDef {
    pub domain: String,
    #[serde(default)]
    pub trigger_phrases: Vec<TriggerPhrase>,
    #[serde(default)]
    pub slots: Vec<SlotDef>,
    /// Confidence at/above which the engine enriches rather than clarifies
    /// (spec.md §4.6 step 5).
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_confidence_threshold() -> f32 {
    0.6
}

/// The full domain/slot taxonomy, loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotTaxonomy {
    #[serde(default)]
    pub domains: Vec<DomainDef>,
    /// Trigger phrases shorter than this many words are ignored entirely
    /// (spec.md §4.6 step 2).
    #[serde(default = "default_min_trigger_word_length")]
    pub min_trigger_word_length: usize,
    /// Cap on clarifying questions per conversation (spec.md §4.6 step 5).
    #[serde(default = "default_clarification_cap")]
    pub clarification_cap: u32,
    /// TTL, in turns, for a persisted belief state (spec.md §4.6 "expires
    /// after `belief_state_ttl_turns`").
    #[serde(default = "default_belief_state_ttl_turns")]
    pub belief_state_ttl_turns: u32,
}

fn default_min_trigger_word_length() -> usize {
    1
}
fn default_clarification_cap() -> u32 {
    2
}
fn default_belief_state_ttl_turns() -> u32 {
    5
}

impl SlotTaxonomy {
    pub fn domain(&self, name: &str) -> Option<&DomainDef> {
        self.domains.iter().find(|d| d.domain == name)
    }
}
