//! Four-axis memory classification + conflict detection/resolution
//! (spec.md §4.7).
//!
//! Grounded on `examples/original_source/extensions/monologue_end/_55_memory_classifier.py`
//! (`_classify`, `_detect_source`, `_detect_conflicts`, `_is_contradiction`,
//! `_pick_loser`), reimplemented as pure functions over [`MemoryDocument`]
//! instead of extension-hook side effects on a dynamic `agent` object.

use std::collections::HashMap;

use a2a_core::config::MaintenanceConfig;
use a2a_core::memory_doc::{Area, Classification, Lineage, MemoryDocument, OneOrMany, Relevance, Source, Utility, Validity};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::store::VectorIndex;

static RE_USES_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:uses?|using|runs?|running)\s+([\w\-]+(?:\s+[\w\-]+)?)\s+(?:version\s+)?v?(\d+(?:\.\d+)*)").unwrap());
static RE_NAME_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([\w\-]+)\s+(?:version|v)\s*(\d+(?:\.\d+)*)").unwrap());
static RE_CORRECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:actually|no,?\s+(?:the\s+)?correct|correction|wrong|not\s+\w+,?\s+but|I\s+meant|let\s+me\s+correct)").unwrap());
static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static RE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

struct NegationPair {
    negative: Regex,
    positive_template: &'static str,
}

fn negation_pairs() -> Vec<NegationPair> {
    vec![
        NegationPair { negative: Regex::new(r"(?i)\bdoes\s+not\s+use\s+([\w\-]+)").unwrap(), positive_template: r"(?i)\buses?\s+{}" },
        NegationPair { negative: Regex::new(r"(?i)\bis\s+not\s+([\w\-]+)").unwrap(), positive_template: r"(?i)\bis\s+{}" },
        NegationPair { negative: Regex::new(r"(?i)\bdon'?t\s+use\s+([\w\-]+)").unwrap(), positive_template: r"(?i)\buses?\s+{}" },
        NegationPair { negative: Regex::new(r"(?i)\bnot\s+using\s+([\w\-]+)").unwrap(), positive_template: r"(?i)\busing\s+{}" },
        NegationPair { negative: Regex::new(r"(?i)\bno\s+longer\s+uses?\s+([\w\-]+)").unwrap(), positive_template: r"(?i)\buses?\s+{}" },
    ]
}

/// Detects `source` (spec.md §4.7 bullet 1).
pub fn detect_source(text: &str, area: Area, user_msg: &str) -> Source {
    if area == Area::Solutions {
        return Source::AgentInferred;
    }
    if RE_URL.is_match(text) && RE_DATE.is_match(text) {
        return Source::ExternalRetrieved;
    }
    if !user_msg.is_empty() && text_overlaps(text, user_msg) {
        return Source::UserAsserted;
    }
    Source::AgentInferred
}

fn text_overlaps(memory_text: &str, user_msg: &str) -> bool {
    let mem = memory_text.to_lowercase();
    let msg = user_msg.to_lowercase();
    if mem.len() > 10 && msg.contains(mem.trim()) {
        return true;
    }
    let mem_words: std::collections::HashSet<&str> = mem.split_whitespace().collect();
    let msg_words: std::collections::HashSet<&str> = msg.split_whitespace().collect();
    if mem_words.is_empty() || msg_words.is_empty() {
        return false;
    }
    let overlap = mem_words.intersection(&msg_words).count();
    let smaller = mem_words.len().min(msg_words.len());
    smaller > 0 && (overlap as f32 / smaller as f32) >= 0.6
}

fn detect_utility(text: &str, keywords: &[String]) -> Utility {
    let lower = text.to_lowercase();
    if keywords.iter().any(|k| lower.contains(&k.to_lowercase())) {
        Utility::LoadBearing
    } else {
        Utility::Tactical
    }
}

/// Classifies one document on all four axes (spec.md §4.7).
pub fn classify(text: &str, area: Area, user_msg: &str, config: &MaintenanceConfig) -> Classification {
    let source = detect_source(text, area, user_msg);
    let validity = if source == Source::UserAsserted { Validity::Confirmed } else { Validity::Inferred };
    let utility = detect_utility(text, &config.load_bearing_keywords);
    Classification { validity, relevance: Relevance::Active, utility, source }
}

fn extract_entity_values(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for cap in RE_USES_VERSION.captures_iter(text) {
        out.insert(cap[1].trim().to_lowercase(), cap[2].to_string());
    }
    for cap in RE_NAME_VERSION.captures_iter(text) {
        out.entry(cap[1].trim().to_lowercase()).or_insert_with(|| cap[2].to_string());
    }
    out
}

/// Deterministic contradiction detection (spec.md §4.7 three detectors).
pub fn is_contradiction(text_a: &str, text_b: &str) -> bool {
    let a = text_a.to_lowercase();
    let b = text_b.to_lowercase();

    if RE_CORRECTION.is_match(&a) {
        let aw: std::collections::HashSet<&str> = a.split_whitespace().collect();
        let bw: std::collections::HashSet<&str> = b.split_whitespace().collect();
        if aw.intersection(&bw).count() >= 3 {
            return true;
        }
    }

    let ea = extract_entity_values(&a);
    let eb = extract_entity_values(&b);
    for (entity, value) in &ea {
        if let Some(other) = eb.get(entity) {
            if other != value {
                return true;
            }
        }
    }

    for pair in negation_pairs() {
        if let Some(cap) = pair.negative.captures(&a) {
            let target = regex::escape(&cap[1]);
            let pos = Regex::new(&pair.positive_template.replace("{}", &target)).unwrap();
            if pos.is_match(&b) {
                return true;
            }
        }
        if let Some(cap) = pair.negative.captures(&b) {
            let target = regex::escape(&cap[1]);
            let pos = Regex::new(&pair.positive_template.replace("{}", &target)).unwrap();
            if pos.is_match(&a) {
                return true;
            }
        }
    }

    false
}

/// Picks the loser of a conflicting pair (spec.md §4.7 resolution rules
/// 1–4). Returns the loser's id.
pub fn pick_loser(id_a: &str, cls_a: &Classification, ts_a: chrono::DateTime<chrono::Utc>, id_b: &str, cls_b: &Classification, ts_b: chrono::DateTime<chrono::Utc>) -> String {
    let ra = cls_a.source.rank();
    let rb = cls_b.source.rank();
    if ra != rb {
        return if ra > rb { id_b.to_string() } else { id_a.to_string() };
    }
    let va = cls_a.validity.rank();
    let vb = cls_b.validity.rank();
    if va != vb {
        return if va > vb { id_b.to_string() } else { id_a.to_string() };
    }
    let ua = cls_a.utility.rank();
    let ub = cls_b.utility.rank();
    if ua != ub {
        return if ua > ub { id_b.to_string() } else { id_a.to_string() };
    }
    if ts_a >= ts_b { id_b.to_string() } else { id_a.to_string() }
}

/// Applies the resolution: marks the loser deprecated and links both sides'
/// lineage (spec.md §4.7, `_resolve_conflict`).
pub fn resolve_conflict(loser: &mut MemoryDocument, winner_id: &str) {
    let cls = loser.classification.get_or_insert_with(|| Classification { validity: Validity::Inferred, relevance: Relevance::Active, utility: Utility::Tactical, source: Source::AgentInferred });
    cls.validity = Validity::Deprecated;
    let lineage = loser.lineage.get_or_insert_with(|| Lineage::new(None, None, 0));
    lineage.superseded_by = Some(winner_id.to_string());
}

pub fn record_supersession(winner: &mut MemoryDocument, loser_id: &str) {
    let lineage = winner.lineage.get_or_insert_with(|| Lineage::new(None, None, 0));
    lineage.supersedes = Some(match lineage.supersedes.take() {
        Some(existing) => existing.push(loser_id.to_string()),
        None => OneOrMany::One(loser_id.to_string()),
    });
}

/// Walks the store for documents that contradict `new_doc` and resolves each
/// pair via [`pick_loser`] (spec.md §4.7, `_detect_conflicts`). Mirrors
/// `maintenance::run_deduplication`'s store-walking shape: top-`conflict_top_k`
/// similarity search above 0.5, skip self/deprecated matches, then the
/// contradiction + loser-picking logic. Returns `(loser_id, winner_id)` pairs;
/// callers apply [`resolve_conflict`]/[`record_supersession`] and persist.
pub fn detect_conflicts(index: &dyn VectorIndex, new_id: &str, new_doc: &MemoryDocument, config: &MaintenanceConfig) -> Vec<(String, String)> {
    let mut conflicts = Vec::new();
    let Some(new_cls) = &new_doc.classification else { return conflicts };
    if new_doc.text.trim().len() < 10 {
        return conflicts;
    }

    let matches = index.search_similarity_threshold(&new_doc.text, config.conflict_top_k + 1, 0.5);
    for (sim_id, _score) in matches {
        if sim_id == new_id {
            continue;
        }
        let Some(sim_doc) = index.get(&sim_id) else { continue };
        let Some(sim_cls) = &sim_doc.classification else { continue };
        if sim_cls.validity == Validity::Deprecated {
            continue;
        }
        if !is_contradiction(&new_doc.text, &sim_doc.text) {
            continue;
        }
        let new_ts = new_doc.lineage.as_ref().map(|l| l.created_at).unwrap_or(new_doc.timestamp);
        let sim_ts = sim_doc.lineage.as_ref().map(|l| l.created_at).unwrap_or(sim_doc.timestamp);
        let loser_id = pick_loser(new_id, new_cls, new_ts, &sim_id, sim_cls, sim_ts);
        let winner_id = if loser_id == new_id { sim_id.clone() } else { new_id.to_string() };
        conflicts.push((loser_id, winner_id));
    }
    conflicts
}

/// Conflict-log entry kept for SALUTE/debugging visibility (spec.md §4.7,
/// `_append_conflict_log`, capped to the most recent 20 by the caller).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConflictLogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub winner_id: String,
    pub loser_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_external_when_url_and_date_present() {
        let source = detect_source("see https://example.com on 2026-01-01", Area::Main, "");
        assert_eq!(source, Source::ExternalRetrieved);
    }

    #[test]
    fn entity_value_divergence_is_contradiction() {
        assert!(is_contradiction("the project uses Python 3.11", "the project uses Python 3.9"));
    }

    #[test]
    fn negation_vs_affirmation_is_contradiction() {
        assert!(is_contradiction("the service does not use Redis", "the service uses Redis"));
    }

    #[test]
    fn user_asserted_beats_agent_inferred() {
        let a = Classification { validity: Validity::Confirmed, relevance: Relevance::Active, utility: Utility::Tactical, source: Source::UserAsserted };
        let b = Classification { validity: Validity::Inferred, relevance: Relevance::Active, utility: Utility::Tactical, source: Source::AgentInferred };
        let now = chrono::Utc::now();
        assert_eq!(pick_loser("a", &a, now, "b", &b, now), "b");
    }

    fn mk_doc(id: &str, text: &str, source: Source, validity: Validity) -> MemoryDocument {
        MemoryDocument {
            id: id.to_string(),
            text: text.to_string(),
            area: Area::Main,
            timestamp: chrono::Utc::now(),
            classification: Some(Classification { validity, relevance: Relevance::Active, utility: Utility::Tactical, source }),
            lineage: None,
            ontology: None,
        }
    }

    #[test]
    fn detect_conflicts_finds_contradicting_pair_and_picks_loser() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::store::MemoryStore::open(dir.path()).unwrap();
        let existing = mk_doc("m1", "the service uses Redis", Source::AgentInferred, Validity::Inferred);
        store.upsert(existing);

        let config = MaintenanceConfig::default();
        let incoming = mk_doc("m2", "the service does not use Redis", Source::UserAsserted, Validity::Confirmed);
        store.upsert(incoming.clone());

        let conflicts = detect_conflicts(&store, "m2", &incoming, &config);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0], ("m1".to_string(), "m2".to_string()));
    }

    #[test]
    fn detect_conflicts_skips_short_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::store::MemoryStore::open(dir.path()).unwrap();
        let config = MaintenanceConfig::default();
        let incoming = mk_doc("m2", "no", Source::UserAsserted, Validity::Confirmed);
        assert!(detect_conflicts(&store, "m2", &incoming, &config).is_empty());
    }
}
