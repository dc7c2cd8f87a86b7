//! Candidate Entity and Relationship types (spec.md §3), consumed by the
//! Entity Resolver (E) and Ontology Store (N).
//!
//! Grounded on `examples/original_source/ontology/resolution_engine.py`
//! (`preprocess_candidate`, `merge_candidates`) and `pagi_core::knowledge::entities`
//! for struct texture.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityProperties {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Known keys: ein, duns, ticker, lei, registration_number, ssn_last4,
    /// passport, npi, isin, cusip, sedol, contract_id, fec_id, lobbyist_id.
    #[serde(default)]
    pub identifiers: HashMap<String, String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// Any additional scalar properties carried through verbatim.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipHint {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub target_hint: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub source_id: String,
    pub source_type: String,
    pub record_id: String,
    pub ingested_at: DateTime<Utc>,
    pub confidence: f32,
}

/// Fields derived in preprocessing: lowercased/honorific-stripped name,
/// canonicalized address, ISO dates, harvested identifiers (spec.md §4.10
/// step 1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedFields {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub identifiers: HashMap<String, String>,
}

/// A pre-resolution record produced by a connector (spec.md §3, GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEntity {
    pub entity_type: String,
    #[serde(default)]
    pub properties: EntityProperties,
    #[serde(default)]
    pub relationships: Vec<RelationshipHint>,
    pub provenance: Provenance,
    /// Populated by `a2a_ontology::resolution::preprocess`.
    #[serde(rename = "_normalized", default)]
    pub normalized: Option<NormalizedFields>,
    #[serde(rename = "_resolved", default)]
    pub resolved: bool,
}

/// A typed, directed, confidence-scored edge of the ontology graph (spec.md
/// §3 "Relationship"). Stored append-only in a JSONL log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub rel_id: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub from_entity: String,
    pub to_entity: String,
    pub from_entity_name: String,
    pub to_entity_name: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    pub confidence: f32,
    pub provenance: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deprecated: bool,
}

impl Relationship {
    /// `rel_<md5(from:type:to)[:12]>` (spec.md §4.11).
    pub fn derive_id(from_entity: &str, rel_type: &str, to_entity: &str) -> String {
        let digest = md5::compute(format!("{from_entity}:{rel_type}:{to_entity}"));
        format!("rel_{:x}", digest)[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_id_is_deterministic() {
        let a = Relationship::derive_id("ent_1", "co_mentioned", "ent_2");
        let b = Relationship::derive_id("ent_1", "co_mentioned", "ent_2");
        assert_eq!(a, b);
        assert!(a.starts_with("rel_"));
    }
}
