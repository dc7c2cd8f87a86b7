//! Periodic memory maintenance: dedup, related-memory linking, cluster
//! candidate detection, dormancy flagging (spec.md §4.8).
//!
//! Grounded on `examples/original_source/extensions/monologue_end/_57_memory_maintenance.py`
//! (`_run_deduplication`, `_determine_resolution`, `_detect_cluster_candidates`).

use std::collections::{HashMap, HashSet};

use a2a_core::config::{DeduplicationConfig, MaintenanceConfig, RelatedMemoriesConfig};
use a2a_core::memory_doc::{MemoryDocument, Source, Utility, Validity};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::store::{word_overlap_similarity, VectorIndex};

/// What `determine_resolution` decided for a candidate pair.
pub enum Resolution {
    Skip,
    FlagOnly,
    Deprecate { loser_id: String, winner_id: String },
}

/// Spec.md §4.8 dedup resolution table.
pub fn determine_resolution(id_a: &str, doc_a: &MemoryDocument, id_b: &str, doc_b: &MemoryDocument, auto_deprecate_agent_inferred: bool) -> Resolution {
    let (Some(cls_a), Some(cls_b)) = (&doc_a.classification, &doc_b.classification) else { return Resolution::Skip };

    if cls_a.utility == Utility::LoadBearing || cls_b.utility == Utility::LoadBearing {
        return Resolution::FlagOnly;
    }
    if cls_a.source == Source::UserAsserted && cls_b.source == Source::UserAsserted {
        return Resolution::FlagOnly;
    }
    if cls_a.source == Source::UserAsserted && cls_b.source != Source::UserAsserted {
        return Resolution::Deprecate { loser_id: id_b.to_string(), winner_id: id_a.to_string() };
    }
    if cls_b.source == Source::UserAsserted && cls_a.source != Source::UserAsserted {
        return Resolution::Deprecate { loser_id: id_a.to_string(), winner_id: id_b.to_string() };
    }
    if cls_a.validity == Validity::Confirmed && cls_b.validity != Validity::Confirmed {
        return Resolution::Deprecate { loser_id: id_b.to_string(), winner_id: id_a.to_string() };
    }
    if cls_b.validity == Validity::Confirmed && cls_a.validity != Validity::Confirmed {
        return Resolution::Deprecate { loser_id: id_a.to_string(), winner_id: id_b.to_string() };
    }
    if cls_a.source == Source::AgentInferred && cls_b.source == Source::AgentInferred && auto_deprecate_agent_inferred {
        let ts_a = doc_a.lineage.as_ref().map(|l| l.created_at).unwrap_or(doc_a.timestamp);
        let ts_b = doc_b.lineage.as_ref().map(|l| l.created_at).unwrap_or(doc_b.timestamp);
        return if ts_a <= ts_b {
            Resolution::Deprecate { loser_id: id_a.to_string(), winner_id: id_b.to_string() }
        } else {
            Resolution::Deprecate { loser_id: id_b.to_string(), winner_id: id_a.to_string() }
        };
    }
    Resolution::Skip
}

/// Marks `loser` deprecated with `deprecated_reason = "deduplication"`
/// (spec.md §4.8 dedup phase).
pub fn deprecate_for_dedup(loser: &mut MemoryDocument, winner_id: &str) {
    if let Some(cls) = &mut loser.classification {
        cls.validity = Validity::Deprecated;
    }
    if let Some(lineage) = &mut loser.lineage {
        lineage.superseded_by = Some(winner_id.to_string());
        lineage.deprecated_at = Some(Utc::now());
        lineage.deprecated_reason = Some("deduplication".to_string());
    }
}

/// Scans non-deprecated documents for near-duplicate pairs and returns the
/// resolutions to apply, capped at `max_pairs_per_cycle` (spec.md §4.8).
pub fn run_deduplication(index: &dyn VectorIndex, config: &DeduplicationConfig) -> Vec<(String, String)> {
    let docs = index.all_docs();
    let mut processed_pairs: HashSet<(String, String)> = HashSet::new();
    let mut resolved = Vec::new();

    let mut candidates: Vec<(&String, &MemoryDocument)> = docs
        .iter()
        .filter(|(_, d)| d.classification.as_ref().map(|c| c.validity != Validity::Deprecated).unwrap_or(true))
        .filter(|(_, d)| d.text.len() >= 10)
        .collect();
    candidates.sort_by_key(|(id, _)| id.to_string());

    'outer: for (id, doc) in &candidates {
        if resolved.len() >= config.max_pairs_per_cycle as usize {
            break;
        }
        let matches = index.search_similarity_threshold(&doc.text, 6, config.similarity_threshold);
        for (sim_id, _score) in matches {
            if resolved.len() >= config.max_pairs_per_cycle as usize {
                break 'outer;
            }
            if &sim_id == *id {
                continue;
            }
            let pair_key = if **id < sim_id { ((*id).clone(), sim_id.clone()) } else { (sim_id.clone(), (*id).clone()) };
            if !processed_pairs.insert(pair_key) {
                continue;
            }
            let Some(sim_doc) = docs.get(&sim_id) else { continue };
            if sim_doc.classification.as_ref().map(|c| c.validity == Validity::Deprecated).unwrap_or(false) {
                continue;
            }
            match determine_resolution(id, doc, &sim_id, sim_doc, config.auto_deprecate_agent_inferred) {
                Resolution::Deprecate { loser_id, winner_id } => resolved.push((loser_id, winner_id)),
                Resolution::Skip | Resolution::FlagOnly => {}
            }
        }
    }
    resolved
}

/// Related-memory linking (spec.md §4.8): memories sharing ≥ `tag_overlap_threshold`
/// of `{validity, relevance, utility, source, bst_domain, area}` get cross-linked,
/// capped at `max_related_per_memory` per side.
pub fn link_related_memories(index: &dyn VectorIndex, config: &RelatedMemoriesConfig) {
    let docs = index.all_docs();
    let active: Vec<(String, MemoryDocument)> = docs
        .into_iter()
        .filter(|(_, d)| d.classification.as_ref().map(|c| c.relevance == a2a_core::memory_doc::Relevance::Active).unwrap_or(false))
        .collect();

    fn tag_set(doc: &MemoryDocument) -> HashSet<String> {
        let mut tags = HashSet::new();
        if let Some(cls) = &doc.classification {
            tags.insert(format!("validity:{:?}", cls.validity));
            tags.insert(format!("relevance:{:?}", cls.relevance));
            tags.insert(format!("utility:{:?}", cls.utility));
            tags.insert(format!("source:{:?}", cls.source));
        }
        if let Some(lineage) = &doc.lineage {
            if let Some(domain) = &lineage.bst_domain {
                tags.insert(format!("bst_domain:{domain}"));
            }
        }
        tags.insert(format!("area:{:?}", doc.area));
        tags
    }

    let tags: Vec<(String, HashSet<String>)> = active.iter().map(|(id, d)| (id.clone(), tag_set(d))).collect();
    let mut updates: HashMap<String, MemoryDocument> = HashMap::new();

    for i in 0..tags.len() {
        for j in (i + 1)..tags.len() {
            let (id_a, tags_a) = &tags[i];
            let (id_b, tags_b) = &tags[j];
            if tags_a.intersection(tags_b).count() >= config.tag_overlap_threshold as usize {
                let doc_a = updates.entry(id_a.clone()).or_insert_with(|| active.iter().find(|(id, _)| id == id_a).unwrap().1.clone());
                if let Some(lineage) = &mut doc_a.lineage {
                    if !lineage.related_memory_ids.contains(id_b) && lineage.related_memory_ids.len() < config.max_related_per_memory as usize {
                        lineage.related_memory_ids.push(id_b.clone());
                    }
                }
                let doc_b = updates.entry(id_b.clone()).or_insert_with(|| active.iter().find(|(id, _)| id == id_b).unwrap().1.clone());
                if let Some(lineage) = &mut doc_b.lineage {
                    if !lineage.related_memory_ids.contains(id_a) && lineage.related_memory_ids.len() < config.max_related_per_memory as usize {
                        lineage.related_memory_ids.push(id_a.clone());
                    }
                }
            }
        }
    }

    for (_, doc) in updates {
        index.upsert(doc);
    }
}

/// Dormancy flagging (spec.md §4.8): active, non-load-bearing memories
/// untouched since `classified_at_cycle` get `dormancy_candidate = true`.
pub fn flag_dormant(index: &dyn VectorIndex, config: &MaintenanceConfig, current_cycle: u32) {
    for (id, mut doc) in index.all_docs() {
        let Some(cls) = doc.classification.clone() else { continue };
        if cls.validity == Validity::Deprecated || cls.utility == Utility::LoadBearing {
            continue;
        }
        let Some(lineage) = &mut doc.lineage else { continue };
        let aged = current_cycle.saturating_sub(lineage.classified_at_cycle) >= config.archival_threshold_cycles;
        if lineage.access_count == 0 && aged && !lineage.dormancy_candidate {
            lineage.dormancy_candidate = true;
            index.upsert(doc.clone());
            tracing::debug!(id = %id, "memory flagged dormant");
        }
    }
}

/// One entry in the external co-retrieval log (spec.md §4.8 cluster phase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoRetrievalEntry {
    pub memory_ids: Vec<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterCandidate {
    pub memory_ids: Vec<String>,
    pub co_retrieval_count: u32,
    pub first_seen: Option<chrono::DateTime<Utc>>,
    pub last_seen: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoRetrievalLog {
    pub entries: Vec<CoRetrievalEntry>,
    pub cluster_candidates: Vec<ClusterCandidate>,
}

const CLUSTER_THRESHOLD: u32 = 5;

/// Counts unordered co-occurring id pairs and promotes those at or above
/// [`CLUSTER_THRESHOLD`] to `cluster_candidates`. Returns the count of newly
/// added candidates (spec.md §4.8 `_detect_cluster_candidates`).
pub fn detect_cluster_candidates(log: &mut CoRetrievalLog) -> usize {
    let mut counts: HashMap<(String, String), u32> = HashMap::new();
    let mut first_seen: HashMap<(String, String), chrono::DateTime<Utc>> = HashMap::new();
    let mut last_seen: HashMap<(String, String), chrono::DateTime<Utc>> = HashMap::new();

    for entry in &log.entries {
        let mut ids: Vec<&String> = entry.memory_ids.iter().collect::<HashSet<_>>().into_iter().collect();
        ids.sort();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let pair = (ids[i].clone(), ids[j].clone());
                *counts.entry(pair.clone()).or_insert(0) += 1;
                first_seen.entry(pair.clone()).or_insert(entry.timestamp);
                last_seen.insert(pair, entry.timestamp);
            }
        }
    }

    let existing: HashSet<Vec<String>> = log
        .cluster_candidates
        .iter()
        .filter(|c| c.memory_ids.len() == 2)
        .map(|c| {
            let mut ids = c.memory_ids.clone();
            ids.sort();
            ids
        })
        .collect();

    let mut new_candidates = Vec::new();
    for (pair, count) in &counts {
        let ids = vec![pair.0.clone(), pair.1.clone()];
        if *count >= CLUSTER_THRESHOLD && !existing.contains(&ids) {
            new_candidates.push(ClusterCandidate {
                memory_ids: ids,
                co_retrieval_count: *count,
                first_seen: first_seen.get(pair).copied(),
                last_seen: last_seen.get(pair).copied(),
            });
        }
    }

    for candidate in &mut log.cluster_candidates {
        let mut ids = candidate.memory_ids.clone();
        ids.sort();
        if let Some(count) = counts.get(&(ids.first().cloned().unwrap_or_default(), ids.get(1).cloned().unwrap_or_default())) {
            candidate.co_retrieval_count = *count;
        }
    }

    let added = new_candidates.len();
    log.cluster_candidates.extend(new_candidates);
    added
}

/// Used by the recall filter to exercise the same similarity function as
/// dedup without depending on the store directly.
pub fn similarity(a: &str, b: &str) -> f32 {
    word_overlap_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_bearing_is_flag_only() {
        use a2a_core::memory_doc::{Area, Classification, Relevance, Validity};
        let mk = |utility, source| MemoryDocument {
            id: "x".to_string(),
            text: "t".to_string(),
            area: Area::Main,
            timestamp: Utc::now(),
            classification: Some(Classification { validity: Validity::Inferred, relevance: Relevance::Active, utility, source }),
            lineage: None,
            ontology: None,
        };
        let a = mk(Utility::LoadBearing, Source::AgentInferred);
        let b = mk(Utility::Tactical, Source::AgentInferred);
        assert!(matches!(determine_resolution("a", &a, "b", &b, true), Resolution::FlagOnly));
    }

    #[test]
    fn cluster_candidate_promoted_at_threshold() {
        let mut log = CoRetrievalLog::default();
        for _ in 0..5 {
            log.entries.push(CoRetrievalEntry { memory_ids: vec!["m1".to_string(), "m2".to_string()], timestamp: Utc::now() });
        }
        let added = detect_cluster_candidates(&mut log);
        assert_eq!(added, 1);
        assert_eq!(log.cluster_candidates[0].co_retrieval_count, 5);
    }
}
