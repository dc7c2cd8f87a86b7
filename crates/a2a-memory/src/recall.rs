//! Role-aware recall re-ranking (spec.md §4.9 "Recall Filter (F)").
//!
//! Grounded on the recall-shaping half of `_55_memory_classifier.py`'s
//! lineage bookkeeping (`access_count`, `last_accessed`) plus the filter
//! rule described in spec.md §4.9 (no single source file covers the filter
//! itself — the distillation's own description is the grounding source).

use a2a_core::memory_doc::{Area, MemoryDocument, Validity};
use a2a_core::role::RoleProfile;
use chrono::Utc;

use crate::store::{word_overlap_similarity, VectorIndex};

/// True if `doc` should be excluded from recall for the given (possibly
/// absent) active role (spec.md §4.9 bullet 2).
fn excluded_for_role(doc: &MemoryDocument, role: Option<&RoleProfile>) -> bool {
    let Some(role) = role else { return false };
    let Some(cls) = &doc.classification else { return false };
    if cls.utility == a2a_core::memory_doc::Utility::LoadBearing {
        return false;
    }
    let Some(lineage) = &doc.lineage else { return false };
    match &lineage.bst_domain {
        Some(domain) => !role.capabilities.bst_domains.iter().any(|d| d == domain),
        // No bst_domain recorded: resolving the creator role's own domain
        // list needs a role registry lookup this pure filter doesn't have
        // access to, so we don't exclude on this branch.
        None => false,
    }
}

/// Max injected memories for a given area (spec.md §4.9: `max` for
/// main/fragments, `max/2` for solutions).
fn injection_cap(area: Area, max_injected: usize) -> usize {
    match area {
        Area::Solutions => (max_injected / 2).max(1),
        _ => max_injected,
    }
}

/// One recalled memory with its computed similarity score, ready for
/// access-count bookkeeping.
pub struct RecallHit {
    pub id: String,
    pub doc: MemoryDocument,
    pub similarity: f32,
}

/// Runs the recall filter over the base similarity search results (spec.md
/// §4.9): drops deprecated and role-excluded memories, ranks by
/// `(utility_rank, access_count, similarity)` descending, and truncates to
/// the per-area injection cap.
pub fn filter_and_rank(index: &dyn VectorIndex, query: &str, area: Area, active_role: Option<&RoleProfile>, similarity_threshold: f32, max_injected: usize) -> Vec<RecallHit> {
    let docs = index.all_docs();
    let mut hits: Vec<RecallHit> = docs
        .into_iter()
        .filter(|(_, d)| d.area == area)
        .filter(|(_, d)| d.classification.as_ref().map(|c| c.validity != Validity::Deprecated).unwrap_or(true))
        .filter(|(_, d)| !excluded_for_role(d, active_role))
        .map(|(id, doc)| {
            let similarity = word_overlap_similarity(query, &doc.text);
            RecallHit { id, doc, similarity }
        })
        .filter(|h| h.similarity >= similarity_threshold)
        .collect();

    hits.sort_by(|a, b| {
        let ua = a.doc.classification.as_ref().map(|c| c.utility.rank()).unwrap_or(0);
        let ub = b.doc.classification.as_ref().map(|c| c.utility.rank()).unwrap_or(0);
        let aca = a.doc.lineage.as_ref().map(|l| l.access_count).unwrap_or(0);
        let acb = b.doc.lineage.as_ref().map(|l| l.access_count).unwrap_or(0);
        ub.cmp(&ua)
            .then(acb.cmp(&aca))
            .then(b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal))
    });

    hits.truncate(injection_cap(area, max_injected));
    hits
}

/// Updates `access_count`/`last_accessed` for each survivor and persists the
/// change (spec.md §4.9 last bullet).
pub fn record_access(index: &dyn VectorIndex, hits: &[RecallHit]) {
    for hit in hits {
        let mut doc = hit.doc.clone();
        if let Some(lineage) = &mut doc.lineage {
            lineage.access_count += 1;
            lineage.last_accessed = Some(Utc::now());
        }
        index.upsert(doc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use a2a_core::memory_doc::{Classification, Relevance, Source, Utility};

    fn doc(id: &str, text: &str, utility: Utility, access_count: u64) -> MemoryDocument {
        MemoryDocument {
            id: id.to_string(),
            text: text.to_string(),
            area: Area::Main,
            timestamp: Utc::now(),
            classification: Some(Classification { validity: Validity::Confirmed, relevance: Relevance::Active, utility, source: Source::UserAsserted }),
            lineage: Some({
                let mut l = a2a_core::memory_doc::Lineage::new(None, None, 0);
                l.access_count = access_count;
                l
            }),
            ontology: None,
        }
    }

    #[test]
    fn ranks_load_bearing_above_tactical() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        store.upsert(doc("a", "project uses rust", Utility::Tactical, 5));
        store.upsert(doc("b", "project uses rust", Utility::LoadBearing, 0));

        let hits = filter_and_rank(&store, "project uses rust", Area::Main, None, 0.1, 8);
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn deprecated_memories_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        let mut d = doc("a", "project uses rust", Utility::Tactical, 0);
        d.classification.as_mut().unwrap().validity = Validity::Deprecated;
        store.upsert(d);
        let hits = filter_and_rank(&store, "project uses rust", Area::Main, None, 0.1, 8);
        assert!(hits.is_empty());
    }
}
