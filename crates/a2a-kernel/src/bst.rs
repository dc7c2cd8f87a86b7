//! Intent/Slot Engine — "BST" (spec.md §4.6).
//!
//! Grounded near-verbatim in control flow on
//! `examples/original_source/extensions/before_main_llm_call/_10_belief_state_tracker.py`
//! (`_BSTEngine`), reimplemented with typed slot values instead of `Any`.

use a2a_core::belief::{DomainDef, SlotDef, SlotResolver, SlotTaxonomy};
use a2a_core::BeliefState;
use regex::Regex;
use serde_json::Value;

const CLOSED_PRONOUNS: &[&str] = &["it", "that", "this", "them", "those"];
const UNDERSPEC_PHRASES: &[&str] = &["do it", "try again", "same thing", "continue", "keep going", "again"];
const UNDERSPEC_MAX_WORDS: usize = 5;

/// The engine's decision for this turn (spec.md §4.6 step 5).
#[derive(Debug, Clone, PartialEq)]
pub enum BstAction {
    /// Replace the last user message with `[TASK CONTEXT]...[INSTRUCTION]
    /// <preamble>...[USER MESSAGE]<original>`.
    Enrich { preamble: String },
    /// Append an agent message asking the given clarifying question.
    Clarify { question: String },
    Passthrough,
}

#[derive(Debug, Clone)]
pub struct BstOutcome {
    pub belief: BeliefState,
    pub action: BstAction,
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

fn contains_closed_pronoun(message: &str) -> bool {
    let lower = message.to_lowercase();
    CLOSED_PRONOUNS.iter().any(|p| lower.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *p))
}

fn contains_underspec_phrase(message: &str) -> bool {
    let lower = message.to_lowercase();
    UNDERSPEC_PHRASES.iter().any(|p| lower.contains(p))
}

/// Step 1: underspecification check (spec.md §4.6).
fn is_underspecified(message: &str) -> bool {
    (word_count(message) <= UNDERSPEC_MAX_WORDS && contains_closed_pronoun(message)) || contains_underspec_phrase(message)
}

/// Step 2: classify domain by trigger-phrase hit count, weighted by phrase
/// word count (spec.md §4.6).
fn classify_domain<'a>(taxonomy: &'a SlotTaxonomy, message: &str) -> (Option<&'a DomainDef>, f32) {
    let lower = message.to_lowercase();
    let mut best: Option<(&DomainDef, f32)> = None;
    for domain in &taxonomy.domains {
        let mut score = 0.0_f32;
        for trigger in &domain.trigger_phrases {
            if trigger.weight() < taxonomy.min_trigger_word_length {
                continue;
            }
            if lower.contains(&trigger.phrase.to_lowercase()) {
                score += trigger.weight() as f32;
            }
        }
        if score > 0.0 && best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
            best = Some((domain, score));
        }
    }
    match best {
        Some((domain, score)) => {
            let confidence = (score / (score + 1.0).max(3.0)).min(1.0);
            (Some(domain), confidence)
        }
        None => (None, 0.0),
    }
}

fn file_extension_language(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "rs" => Some("rust"),
        "py" => Some("python"),
        "js" | "mjs" => Some("javascript"),
        "ts" => Some("typescript"),
        "go" => Some("go"),
        "java" => Some("java"),
        "rb" => Some("ruby"),
        "c" => Some("c"),
        "cpp" | "cc" | "cxx" => Some("cpp"),
        _ => None,
    }
}

fn resolve_keyword_map(slot: &SlotDef, message: &str) -> Option<Value> {
    let lower = message.to_lowercase();
    slot.keyword_map.iter().find(|(k, _)| lower.contains(&k.to_lowercase())).map(|(_, v)| v.clone())
}

fn resolve_file_extension_inference(message: &str) -> Option<Value> {
    let re = Regex::new(r"\.([A-Za-z0-9_]+)\b").expect("static pattern");
    re.captures_iter(message)
        .find_map(|cap| file_extension_language(&cap[1]))
        .map(|lang| Value::String(lang.to_string()))
}

fn resolve_last_mentioned_file(message: &str, history: &[String]) -> Option<Value> {
    let re = Regex::new(r"[\w./-]+\.[A-Za-z0-9]{1,6}\b").expect("static pattern");
    for text in std::iter::once(&message.to_string()).chain(history.iter().rev()) {
        if let Some(m) = re.find(text) {
            return Some(Value::String(m.as_str().to_string()));
        }
    }
    None
}

fn resolve_last_mentioned_path(message: &str, history: &[String]) -> Option<Value> {
    let re = Regex::new(r"(?:/|\./|\.\./)[\w./-]+").expect("static pattern");
    for text in std::iter::once(&message.to_string()).chain(history.iter().rev()) {
        if let Some(m) = re.find(text) {
            return Some(Value::String(m.as_str().to_string()));
        }
    }
    None
}

fn resolve_last_mentioned_entity(message: &str, history: &[String]) -> Option<Value> {
    let re = Regex::new(r#""([^"]+)"|'([^']+)'"#).expect("static pattern");
    for text in std::iter::once(&message.to_string()).chain(history.iter().rev()) {
        if let Some(cap) = re.captures(text) {
            let value = cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str().to_string());
            if let Some(v) = value {
                return Some(Value::String(v));
            }
        }
    }
    None
}

fn resolve_history_scan(slot: &SlotDef, history: &[String]) -> Option<Value> {
    let name_lower = slot.name.to_lowercase();
    history.iter().rev().find(|h| h.to_lowercase().contains(&name_lower)).map(|h| Value::String(h.clone()))
}

fn resolve_context_inference(message: &str) -> Option<Value> {
    let lower = message.to_lowercase();
    if lower.split_whitespace().any(|w| w == "yes" || w == "true") {
        Some(Value::Bool(true))
    } else if lower.split_whitespace().any(|w| w == "no" || w == "false") {
        Some(Value::Bool(false))
    } else {
        None
    }
}

fn resolve_slot(slot: &SlotDef, message: &str, history: &[String]) -> Option<Value> {
    for resolver in &slot.resolvers {
        let value = match resolver {
            SlotResolver::KeywordMap => resolve_keyword_map(slot, message),
            SlotResolver::FileExtensionInference => resolve_file_extension_inference(message),
            SlotResolver::LastMentionedFile => resolve_last_mentioned_file(message, history),
            SlotResolver::LastMentionedPath => resolve_last_mentioned_path(message, history),
            SlotResolver::LastMentionedEntity => resolve_last_mentioned_entity(message, history),
            SlotResolver::HistoryScan => resolve_history_scan(slot, history),
            SlotResolver::ContextInference => resolve_context_inference(message),
            SlotResolver::Default => slot.default.clone(),
        };
        if value.is_some() {
            return value;
        }
    }
    slot.default.clone()
}

/// Runs the full pipeline for one turn (spec.md §4.6 steps 1–5).
pub fn process(
    taxonomy: &SlotTaxonomy,
    message: &str,
    history: &[String],
    persisted: Option<&BeliefState>,
    current_turn: u32,
) -> BstOutcome {
    if is_underspecified(message) {
        if let Some(prior) = persisted {
            if prior.within_ttl(current_turn, taxonomy.belief_state_ttl_turns) {
                let mut belief = prior.clone();
                belief.turn = current_turn;
                return BstOutcome {
                    belief,
                    action: BstAction::Enrich { preamble: "Continuing the previous task.".to_string() },
                };
            }
        }
    }

    let (domain, classifier_confidence) = classify_domain(taxonomy, message);
    let domain = match domain {
        Some(d) => d,
        None => {
            return BstOutcome {
                belief: BeliefState::new("conversational", current_turn),
                action: BstAction::Passthrough,
            }
        }
    };

    let mut belief = BeliefState::new(domain.domain.clone(), current_turn);
    let required_slots: Vec<&SlotDef> = domain.slots.iter().filter(|s| s.required).collect();

    for slot in &domain.slots {
        if let Some(cond) = &slot.required_when {
            let dep_present = belief.slots.get(cond).map(|v| v.is_some()).unwrap_or(false);
            if !dep_present {
                continue;
            }
        }
        let value = resolve_slot(slot, message, history);
        belief.slots.insert(slot.name.clone(), value);
    }

    let filled_required = required_slots.iter().filter(|s| belief.slots.get(&s.name).and_then(|v| v.as_ref()).is_some()).count();
    belief.missing_required = required_slots
        .iter()
        .filter(|s| belief.slots.get(&s.name).and_then(|v| v.as_ref()).is_none())
        .map(|s| s.name.clone())
        .collect();

    let filled_ratio =
        if required_slots.is_empty() { 1.0 } else { filled_required as f32 / required_slots.len() as f32 };
    belief.confidence = 0.4 * classifier_confidence + 0.6 * filled_ratio;

    let action = if belief.confidence >= domain.confidence_threshold || belief.missing_required.is_empty() {
        BstAction::Enrich { preamble: format!("Detected domain `{}`.", domain.domain) }
    } else if belief.clarifications_asked < taxonomy.clarification_cap {
        let first_missing = belief.missing_required[0].clone();
        let question = domain
            .slots
            .iter()
            .find(|s| s.name == first_missing)
            .and_then(|s| s.clarification_question.clone())
            .unwrap_or_else(|| format!("Could you clarify `{first_missing}`?"));
        belief.clarifications_asked += 1;
        BstAction::Clarify { question }
    } else {
        BstAction::Passthrough
    };

    BstOutcome { belief, action }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::belief::{SlotTaxonomy, TriggerPhrase};

    fn taxonomy() -> SlotTaxonomy {
        SlotTaxonomy {
            domains: vec![DomainDef {
                domain: "code_review".to_string(),
                trigger_phrases: vec![TriggerPhrase { phrase: "review my code".to_string() }],
                slots: vec![SlotDef {
                    name: "file".to_string(),
                    required: true,
                    resolvers: vec![SlotResolver::LastMentionedFile, SlotResolver::Default],
                    keyword_map: Default::default(),
                    default: None,
                    clarification_question: Some("Which file should I review?".to_string()),
                    required_when: None,
                }],
                confidence_threshold: 0.5,
            }],
            min_trigger_word_length: 1,
            clarification_cap: 2,
            belief_state_ttl_turns: 5,
        }
    }

    #[test]
    fn conversational_passthrough_on_zero_hits() {
        let t = taxonomy();
        let out = process(&t, "how's the weather", &[], None, 1);
        assert_eq!(out.belief.domain, "conversational");
        assert_eq!(out.action, BstAction::Passthrough);
    }

    #[test]
    fn enriches_when_slot_resolved() {
        let t = taxonomy();
        let out = process(&t, "please review my code in main.rs", &[], None, 1);
        assert_eq!(out.belief.domain, "code_review");
        assert!(matches!(out.action, BstAction::Enrich { .. }));
    }

    #[test]
    fn clarifies_when_required_slot_missing() {
        let t = taxonomy();
        let out = process(&t, "review my code", &[], None, 1);
        assert_eq!(out.belief.missing_required, vec!["file".to_string()]);
        assert!(matches!(out.action, BstAction::Clarify { .. }));
    }
}
