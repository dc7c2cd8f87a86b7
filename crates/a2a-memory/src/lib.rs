//! a2a-memory: the Ontology + Classified-Memory Engine's memory half —
//! four-axis classification (M), periodic maintenance (D), and role-aware
//! recall (F). The episodic valence/trust module (spec.md §9) lives here
//! too, deliberately unwired into the rest.

pub mod classifier;
pub mod episodic;
pub mod maintenance;
pub mod recall;
pub mod store;

pub use classifier::{classify, detect_conflicts, detect_source, is_contradiction, pick_loser, record_supersession, resolve_conflict, ConflictLogEntry};
pub use episodic::{append_record, compute_effective_valence, compute_valence, EpisodicRecord, ValenceSignals};
pub use maintenance::{deprecate_for_dedup, detect_cluster_candidates, determine_resolution, flag_dormant, link_related_memories, run_deduplication, ClusterCandidate, CoRetrievalEntry, CoRetrievalLog, Resolution};
pub use recall::{filter_and_rank, record_access, RecallHit};
pub use store::{word_overlap_similarity, MemoryStore, VectorIndex};

/// Aggregate health statistics surfaced to SALUTE's `environment.memory_health`
/// (spec.md §4.7 "Health Statistics").
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MemoryHealthStats {
    pub total_memories: u64,
    pub confirmed: u64,
    pub inferred: u64,
    pub deprecated: u64,
    pub load_bearing: u64,
    pub tactical: u64,
    pub archived: u64,
    pub conflicts_resolved_this_session: u64,
}

impl MemoryHealthStats {
    pub fn from_docs(docs: &std::collections::HashMap<String, a2a_core::memory_doc::MemoryDocument>, conflicts_resolved: u64) -> Self {
        use a2a_core::memory_doc::{Utility, Validity};
        let mut stats = Self { conflicts_resolved_this_session: conflicts_resolved, ..Default::default() };
        for doc in docs.values() {
            let Some(cls) = &doc.classification else { continue };
            stats.total_memories += 1;
            match cls.validity {
                Validity::Confirmed => stats.confirmed += 1,
                Validity::Inferred => stats.inferred += 1,
                Validity::Deprecated => stats.deprecated += 1,
            }
            match cls.utility {
                Utility::LoadBearing => stats.load_bearing += 1,
                Utility::Tactical => stats.tactical += 1,
                Utility::Archived => stats.archived += 1,
            }
        }
        stats
    }

    /// A one-line summary fit for `SaluteReport.environment.memory_health`.
    pub fn summary(&self) -> String {
        format!("{} memories ({} confirmed, {} deprecated, {} load-bearing)", self.total_memories, self.confirmed, self.deprecated, self.load_bearing)
    }
}
