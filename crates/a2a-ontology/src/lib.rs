//! a2a-ontology: the Ontology + Classified-Memory Engine's ontology half —
//! the Entity Resolver (E, spec.md §4.10) and the Ontology Store &
//! Relationship Extractor (N, spec.md §4.11).

pub mod relationship;
pub mod resolution;
pub mod store;

pub use relationship::{extract_co_occurrence, extract_property_based, extract_temporal, promote_co_retrieval_clusters, promote_memory_links, Direction, EntityCandidate, RelationshipStore};
pub use resolution::{apply_transitive_closure, candidate_id, canonicalize_address, compute_composite_score, decide_action, extract_identifiers, get_candidate_pairs, merge_candidates, normalize_date, normalize_name, preprocess, resolve_batch, AuditEntry, AxisScores, Decision, FlaggedPair, MergeStep, ResolveBatchResult, ResolvedEntity, ScoringWeights, UnionFind};
pub use store::{build_entity_summary, entity_docs_by_memory_id, generate_entity_id, get_entity_by_id, search_entities, store_entity, update_entity};
