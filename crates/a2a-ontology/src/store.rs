//! Entity storage: resolved entities persisted as classified memories with
//! `area == ontology` (spec.md §4.11 "Entity storage").
//!
//! Grounded on `examples/original_source/ontology/ontology_store.py`
//! (`generate_entity_id`, `build_entity_summary`, `store_entity`,
//! `update_entity`, `search_entities`). Reuses `a2a_memory`'s
//! [`VectorIndex`](a2a_memory::VectorIndex) rather than a second storage
//! layer — an ontology entity is just a `MemoryDocument` with an
//! `ontology` side-table populated.

use std::collections::HashMap;

use a2a_core::entity::Relationship;
use a2a_core::memory_doc::{Area, Classification, Lineage, MemoryDocument, OntologyLink, Relevance, Source, Utility, Validity};
use a2a_memory::{word_overlap_similarity, VectorIndex};
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::resolution::ResolvedEntity;

const ENTITY_ID_PREFIX: &str = "ent_";

/// Stable entity id: `ent_<sha256(entity_type:normalized_name:source_id:record_id)[:12]>`
/// (spec.md §4.11).
pub fn generate_entity_id(entity_type: &str, name: &str, source_id: &str, record_id: &str) -> String {
    let norm = if name.is_empty() { "unknown".to_string() } else { name.to_lowercase() };
    let key = format!("{entity_type}:{norm}:{source_id}:{record_id}");
    let digest = Sha256::digest(key.as_bytes());
    format!("{ENTITY_ID_PREFIX}{}", hex_prefix(&digest, 12))
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut s = String::with_capacity(chars);
    for b in bytes {
        if s.len() >= chars {
            break;
        }
        s.push_str(&format!("{b:02x}"));
    }
    s.truncate(chars);
    s
}

/// Generates a natural-language summary (≤500 chars) for semantic search
/// (spec.md §4.11 "page content"): `name (type) — key props — aliases —
/// sources — top-k connections`.
pub fn build_entity_summary(entity: &ResolvedEntity, relationships: &[Relationship]) -> String {
    let name = entity.properties.name.as_deref().unwrap_or("Unknown");
    let mut parts = vec![format!("{name} ({})", entity.entity_type)];

    if let Some(description) = entity.properties.extra.get("description").and_then(|v| v.as_str()) {
        parts.push(description.chars().take(120).collect());
    } else {
        let mut details = Vec::new();
        if let Some(t) = entity.properties.extra.get("type").and_then(|v| v.as_str()) {
            details.push(format!("Type: {t}"));
        }
        if let Some(j) = entity.properties.extra.get("jurisdiction").and_then(|v| v.as_str()) {
            details.push(format!("Jurisdiction: {j}"));
        }
        if let Some(d) = &entity.properties.date {
            details.push(format!("Date: {d}"));
        }
        if !details.is_empty() {
            parts.push(details.join(", "));
        }
    }

    if !entity.properties.aliases.is_empty() {
        let alias_str = entity.properties.aliases.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        parts.push(format!("Also known as: {alias_str}"));
    }

    let sources: Vec<&str> = entity.provenance_chain.iter().map(|p| p.source_id.as_str()).filter(|s| !s.is_empty()).collect();
    if !sources.is_empty() {
        parts.push(format!("Sources: {}", sources.iter().take(3).cloned().collect::<Vec<_>>().join(", ")));
    }

    if !relationships.is_empty() {
        let rel_parts: Vec<String> = relationships.iter().take(4).filter(|r| !r.to_entity_name.is_empty()).map(|r| format!("{}: {}", r.rel_type, r.to_entity_name)).collect();
        if !rel_parts.is_empty() {
            parts.push(format!("Connections: {}", rel_parts.join(", ")));
        }
    }

    let summary = parts.join(" — ");
    summary.chars().take(500).collect()
}

fn classification_for(entity: &ResolvedEntity) -> Classification {
    let validity = if entity.provenance.confidence >= 0.8 { Validity::Confirmed } else { Validity::Inferred };
    Classification { validity, relevance: Relevance::Active, utility: Utility::Tactical, source: Source::ExternalRetrieved }
}

/// Stores (or re-stores) a resolved entity as a classified memory. `existing_relationships`
/// feeds the generated summary; pass `[]` for a brand-new entity.
pub fn store_entity(index: &dyn VectorIndex, entity: &ResolvedEntity, entity_id: Option<String>, existing_relationships: &[Relationship], current_cycle: u32) -> String {
    let name = entity.properties.name.as_deref().unwrap_or("Unknown");
    let entity_id = entity_id.unwrap_or_else(|| generate_entity_id(&entity.entity_type, name, &entity.provenance.source_id, &entity.provenance.record_id));

    let summary = build_entity_summary(entity, existing_relationships);
    let mut lineage = Lineage::new(None, Some("investigation".to_string()), current_cycle);
    lineage.access_count = 0;

    let ontology = OntologyLink {
        entity_id: entity_id.clone(),
        entity_type: entity.entity_type.clone(),
        properties: serde_json::to_value(&entity.properties).ok().and_then(|v| match v {
            serde_json::Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        }).unwrap_or_default(),
        provenance_chain: entity.provenance_chain.iter().filter_map(|p| serde_json::to_string(p).ok()).collect(),
        merge_history: entity.merge_history.iter().filter_map(|m| serde_json::to_value(m).ok()).collect(),
    };

    let doc = MemoryDocument { id: entity_id.clone(), text: summary, area: Area::Ontology, timestamp: Utc::now(), classification: Some(classification_for(entity)), lineage: Some(lineage), ontology: Some(ontology) };

    index.upsert(doc);
    tracing::info!(entity_id = %entity_id, entity_type = %entity.entity_type, name, "stored ontology entity");
    entity_id
}

/// Update = delete-by-filter + insert (spec.md §4.11): removes the prior
/// memory document for `entity_id`, then stores the fresh one. The
/// invariant this upholds is one memory document per `entity_id`, since
/// `store_entity` always reuses the same id rather than minting a new one.
pub fn update_entity(index: &dyn VectorIndex, entity_id: &str, entity: &ResolvedEntity, existing_relationships: &[Relationship], current_cycle: u32) -> bool {
    index.remove(entity_id);
    let stored = store_entity(index, entity, Some(entity_id.to_string()), existing_relationships, current_cycle);
    !stored.is_empty()
}

pub fn get_entity_by_id(index: &dyn VectorIndex, entity_id: &str) -> Option<MemoryDocument> {
    index.get(entity_id)
}

/// Semantic search over `area == ontology` memories, optionally filtered by
/// `entity_type` (spec.md §4.11 `search_entities`).
pub fn search_entities(index: &dyn VectorIndex, query: &str, entity_type: Option<&str>, limit: usize, threshold: f32) -> Vec<MemoryDocument> {
    let mut scored: Vec<(f32, MemoryDocument)> = index
        .all_docs()
        .into_values()
        .filter(|d| d.area == Area::Ontology)
        .filter(|d| entity_type.map(|t| d.ontology.as_ref().map(|o| o.entity_type == t).unwrap_or(false)).unwrap_or(true))
        .map(|d| (word_overlap_similarity(query, &d.text), d))
        .filter(|(score, _)| *score >= threshold)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(limit).map(|(_, doc)| doc).collect()
}

/// Reusable all-ontology-docs map, keyed by `entity_id`, for callers that
/// need to cross-reference memory ids to entity ids (e.g. co-retrieval
/// cluster promotion in `relationship.rs`).
pub fn entity_docs_by_memory_id(index: &dyn VectorIndex) -> HashMap<String, String> {
    index
        .all_docs()
        .into_iter()
        .filter(|(_, d)| d.area == Area::Ontology)
        .filter_map(|(mem_id, d)| d.ontology.map(|o| (mem_id, o.entity_id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::entity::Provenance;

    #[test]
    fn entity_id_is_deterministic() {
        let a = generate_entity_id("organization", "acme corp", "src1", "r1");
        let b = generate_entity_id("organization", "acme corp", "src1", "r1");
        assert_eq!(a, b);
        assert!(a.starts_with("ent_"));
    }

    #[test]
    fn summary_truncates_to_500_chars() {
        let entity = ResolvedEntity {
            entity_type: "organization".to_string(),
            properties: a2a_core::entity::EntityProperties { name: Some("x".repeat(600)), ..Default::default() },
            relationships: Vec::new(),
            provenance: Provenance { source_id: "s".to_string(), source_type: "t".to_string(), record_id: "r".to_string(), ingested_at: Utc::now(), confidence: 0.9 },
            provenance_chain: Vec::new(),
            merge_history: Vec::new(),
            normalized: Default::default(),
        };
        let summary = build_entity_summary(&entity, &[]);
        assert!(summary.chars().count() <= 500);
    }
}
