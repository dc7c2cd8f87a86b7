//! Relationship extraction and append-only JSONL persistence (spec.md
//! §4.11 "Relationship persistence", "Extraction methods").
//!
//! Grounded on `examples/original_source/ontology/relationship_extractor.py`
//! (`extract_co_occurrence`, `extract_property_based`, `extract_temporal`,
//! `promote_memory_links`, `promote_co_retrieval_clusters`,
//! `update_confidence_from_co_retrieval`) and `ontology_store.py`'s
//! JSONL read/rewrite helpers (`store_relationship`, `deprecate_relationship`,
//! `compact_relationships`).

use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::{BufRead, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use a2a_core::entity::{CandidateEntity, Relationship};
use a2a_core::memory_doc::MemoryDocument;
use a2a_memory::ClusterCandidate;
use chrono::Utc;

use crate::resolution::canonicalize_address;
use crate::resolution::normalize_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Append-only relationship log. Whole-file rewrites (deprecate, compact)
/// take the lock for the duration of the rewrite, matching spec.md §5's
/// "must be the only writer during that phase" invariant.
pub struct RelationshipStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RelationshipStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), lock: Mutex::new(()) }
    }

    fn read_all(&self) -> Vec<Relationship> {
        let Ok(file) = std::fs::File::open(&self.path) else { return Vec::new() };
        std::io::BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(&l).ok())
            .collect()
    }

    fn write_all(&self, rels: &[Relationship]) -> std::io::Result<()> {
        let mut out = String::new();
        for rel in rels {
            out.push_str(&serde_json::to_string(rel)?);
            out.push('\n');
        }
        std::fs::write(&self.path, out)
    }

    /// Appends relationships above `min_confidence`, skipping ids already
    /// present (spec.md §4.11 `store_relationships`). Returns count stored.
    pub fn append_many(&self, relationships: Vec<Relationship>, min_confidence: f32) -> usize {
        let _guard = self.lock.lock().expect("relationship store lock");
        let existing: HashSet<String> = self.read_all().into_iter().map(|r| r.rel_id).collect();
        let mut file = match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "failed to open relationships log");
                return 0;
            }
        };
        let mut stored = 0;
        for rel in relationships {
            if rel.confidence < min_confidence || existing.contains(&rel.rel_id) {
                continue;
            }
            let Ok(line) = serde_json::to_string(&rel) else { continue };
            if writeln!(file, "{line}").is_ok() {
                stored += 1;
            }
        }
        stored
    }

    pub fn get_for_entity(&self, entity_id: &str, rel_type: Option<&str>, direction: Direction) -> Vec<Relationship> {
        self.read_all()
            .into_iter()
            .filter(|r| !r.deprecated)
            .filter(|r| rel_type.map(|t| r.rel_type == t).unwrap_or(true))
            .filter(|r| {
                let is_from = r.from_entity == entity_id;
                let is_to = r.to_entity == entity_id;
                match direction {
                    Direction::Outgoing => is_from,
                    Direction::Incoming => is_to,
                    Direction::Both => is_from || is_to,
                }
            })
            .collect()
    }

    pub fn get_for_entities(&self, entity_ids: &HashSet<String>) -> Vec<Relationship> {
        self.read_all().into_iter().filter(|r| !r.deprecated).filter(|r| entity_ids.contains(&r.from_entity) || entity_ids.contains(&r.to_entity)).collect()
    }

    pub fn deprecate(&self, rel_id: &str) -> bool {
        let _guard = self.lock.lock().expect("relationship store lock");
        let mut rels = self.read_all();
        let mut found = false;
        for rel in &mut rels {
            if rel.rel_id == rel_id {
                rel.deprecated = true;
                rel.updated_at = Utc::now();
                found = true;
            }
        }
        if found {
            let _ = self.write_all(&rels);
        }
        found
    }

    /// Removes deprecated rows. Returns the count removed (spec.md §4.11
    /// "periodic compaction").
    pub fn compact(&self) -> usize {
        let _guard = self.lock.lock().expect("relationship store lock");
        let rels = self.read_all();
        let (kept, removed): (Vec<_>, Vec<_>) = rels.into_iter().partition(|r| !r.deprecated);
        let _ = self.write_all(&kept);
        removed.len()
    }

    /// Confidence update pass (spec.md §4.11): for each edge whose
    /// endpoints co-occur `c` times in the co-retrieval log,
    /// `new_conf = min(0.95, old + 0.02*c)`.
    pub fn update_confidence_from_co_retrieval(&self, entries: &[a2a_memory::CoRetrievalEntry]) -> usize {
        let _guard = self.lock.lock().expect("relationship store lock");
        let mut pair_counts: HashMap<(String, String), u32> = HashMap::new();
        for entry in entries {
            let mut ids: Vec<&String> = entry.memory_ids.iter().collect::<HashSet<_>>().into_iter().collect();
            ids.sort();
            for i in 0..ids.len() {
                for j in (i + 1)..ids.len() {
                    let pair = (ids[i].clone(), ids[j].clone());
                    *pair_counts.entry(pair).or_insert(0) += 1;
                }
            }
        }
        if pair_counts.is_empty() {
            return 0;
        }
        let mut rels = self.read_all();
        let mut updated = 0;
        for rel in &mut rels {
            let pair = if rel.from_entity <= rel.to_entity { (rel.from_entity.clone(), rel.to_entity.clone()) } else { (rel.to_entity.clone(), rel.from_entity.clone()) };
            if let Some(&count) = pair_counts.get(&pair) {
                let new_conf = (rel.confidence + 0.02 * count as f32).min(0.95);
                if new_conf != rel.confidence {
                    rel.confidence = new_conf;
                    rel.updated_at = Utc::now();
                    updated += 1;
                }
            }
        }
        if updated > 0 {
            let _ = self.write_all(&rels);
        }
        updated
    }
}

fn rel(from_entity: &str, to_entity: &str, rel_type: &str, from_name: &str, to_name: &str, properties: HashMap<String, serde_json::Value>, confidence: f32, provenance: &str) -> Relationship {
    let now = Utc::now();
    Relationship {
        rel_id: Relationship::derive_id(from_entity, rel_type, to_entity),
        rel_type: rel_type.to_string(),
        from_entity: from_entity.to_string(),
        to_entity: to_entity.to_string(),
        from_entity_name: from_name.to_string(),
        to_entity_name: to_name.to_string(),
        properties,
        confidence,
        provenance: provenance.to_string(),
        created_at: now,
        updated_at: now,
        deprecated: false,
    }
}

/// One pre-resolution candidate with its assigned (possibly shared, if
/// merged) entity id.
pub struct EntityCandidate<'a> {
    pub entity_id: String,
    pub candidate: &'a CandidateEntity,
}

/// Method 1: entities in the same source record → `co_mentioned` (spec.md
/// §4.11). Confidence 0.8 with 3+ distinct sources, else 0.5.
pub fn extract_co_occurrence(entities: &[EntityCandidate], min_sources: u32) -> Vec<Relationship> {
    let mut record_groups: HashMap<String, Vec<&EntityCandidate>> = HashMap::new();
    for ec in entities {
        let prov = &ec.candidate.provenance;
        let key = format!("{}:{}", prov.source_id, prov.record_id);
        record_groups.entry(key).or_default().push(ec);
    }

    let mut pair_sources: HashMap<(String, String), HashSet<String>> = HashMap::new();
    let mut pair_names: HashMap<(String, String), (String, String)> = HashMap::new();

    for group in record_groups.values() {
        if group.len() < 2 {
            continue;
        }
        let source_id = group[0].candidate.provenance.source_id.clone();
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                let (a, b) = (&group[i], &group[j]);
                if a.entity_id == b.entity_id {
                    continue;
                }
                let pair = if a.entity_id <= b.entity_id { (a.entity_id.clone(), b.entity_id.clone()) } else { (b.entity_id.clone(), a.entity_id.clone()) };
                pair_sources.entry(pair.clone()).or_default().insert(source_id.clone());
                pair_names.entry(pair).or_insert_with(|| (a.candidate.properties.name.clone().unwrap_or_default(), b.candidate.properties.name.clone().unwrap_or_default()));
            }
        }
    }

    pair_sources
        .into_iter()
        .filter(|(_, sources)| sources.len() as u32 >= min_sources)
        .map(|(pair, sources)| {
            let confidence = if sources.len() >= 3 { 0.8 } else { 0.5 };
            let (name_a, name_b) = pair_names.get(&pair).cloned().unwrap_or_default();
            let mut props = HashMap::new();
            props.insert("co_occurrence_count".to_string(), serde_json::json!(sources.len()));
            props.insert("source_ids".to_string(), serde_json::json!(sources.into_iter().collect::<Vec<_>>()));
            rel(&pair.0, &pair.1, "co_mentioned", &name_a, &name_b, props, confidence, "co_occurrence")
        })
        .collect()
}

/// Method 2: shared canonical address → `co_located` (0.6); shared
/// organization string → `affiliated`, stored as `related_to` (0.6).
pub fn extract_property_based(entities: &[EntityCandidate]) -> Vec<Relationship> {
    let mut out = Vec::new();

    let mut address_groups: HashMap<String, Vec<&EntityCandidate>> = HashMap::new();
    for ec in entities {
        let addr = ec.candidate.properties.address.as_deref().unwrap_or_default();
        if !addr.is_empty() {
            let canonical = canonicalize_address(addr);
            if canonical.len() > 10 {
                address_groups.entry(canonical).or_default().push(ec);
            }
        }
    }
    for (addr, group) in &address_groups {
        if group.len() < 2 {
            continue;
        }
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                let (a, b) = (&group[i], &group[j]);
                if a.entity_id == b.entity_id {
                    continue;
                }
                let mut props = HashMap::new();
                props.insert("address".to_string(), serde_json::json!(addr));
                out.push(rel(&a.entity_id, &b.entity_id, "co_located", a.candidate.properties.name.as_deref().unwrap_or_default(), b.candidate.properties.name.as_deref().unwrap_or_default(), props, 0.6, "property_based"));
            }
        }
    }

    let mut org_groups: HashMap<String, Vec<&EntityCandidate>> = HashMap::new();
    for ec in entities {
        let org = ec.candidate.properties.extra.get("organization").or_else(|| ec.candidate.properties.extra.get("employer")).and_then(|v| v.as_str()).unwrap_or_default();
        if org.len() > 3 {
            org_groups.entry(org.to_lowercase()).or_default().push(ec);
        }
    }
    for (org, group) in &org_groups {
        if group.len() < 2 {
            continue;
        }
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                let (a, b) = (&group[i], &group[j]);
                if a.entity_id == b.entity_id {
                    continue;
                }
                let mut props = HashMap::new();
                props.insert("type".to_string(), serde_json::json!("affiliated"));
                props.insert("shared_org".to_string(), serde_json::json!(org));
                out.push(rel(&a.entity_id, &b.entity_id, "related_to", a.candidate.properties.name.as_deref().unwrap_or_default(), b.candidate.properties.name.as_deref().unwrap_or_default(), props, 0.6, "property_based"));
            }
        }
    }

    out
}

/// Method 3: dated records within `window_days` of each other →
/// `temporally_linked`, stored as `related_to`, confidence
/// `max(0.3, 0.4*(1 - delta/window))` (spec.md §4.11).
pub fn extract_temporal(entities: &[EntityCandidate], window_days: i64) -> Vec<Relationship> {
    let mut dated: Vec<(String, &EntityCandidate)> = entities
        .iter()
        .filter_map(|ec| {
            let date_str = ec.candidate.properties.date.as_deref()?;
            let norm = normalize_date(date_str);
            if norm.is_empty() { None } else { Some((norm, ec)) }
        })
        .collect();
    dated.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = Vec::new();
    for i in 0..dated.len() {
        let (date_a, ec_a) = &dated[i];
        let Ok(dt_a) = chrono::NaiveDate::parse_from_str(date_a, "%Y-%m-%d") else { continue };
        for j in (i + 1)..dated.len() {
            let (date_b, ec_b) = &dated[j];
            if ec_a.entity_id == ec_b.entity_id {
                continue;
            }
            let Ok(dt_b) = chrono::NaiveDate::parse_from_str(date_b, "%Y-%m-%d") else { continue };
            let delta = (dt_b - dt_a).num_days();
            if delta > window_days {
                break;
            }
            let confidence = (0.4 * (1.0 - delta as f32 / window_days as f32)).max(0.3);
            let mut props = HashMap::new();
            props.insert("type".to_string(), serde_json::json!("temporally_linked"));
            props.insert("date_a".to_string(), serde_json::json!(date_a));
            props.insert("date_b".to_string(), serde_json::json!(date_b));
            props.insert("days_apart".to_string(), serde_json::json!(delta));
            out.push(rel(&ec_a.entity_id, &ec_b.entity_id, "related_to", ec_a.candidate.properties.name.as_deref().unwrap_or_default(), ec_b.candidate.properties.name.as_deref().unwrap_or_default(), props, confidence, "temporal"));
        }
    }
    out
}

/// Method 4: promote Layer-D `related_memory_ids` links to typed edges at
/// 0.5 confidence (spec.md §4.11).
pub fn promote_memory_links(ontology_docs: &[MemoryDocument]) -> Vec<Relationship> {
    let mut out = Vec::new();
    for doc in ontology_docs {
        let Some(ont) = &doc.ontology else { continue };
        let Some(lineage) = &doc.lineage else { continue };
        let name = ont.properties.get("name").and_then(|v| v.as_str()).unwrap_or_default();
        for related_mem_id in &lineage.related_memory_ids {
            let mut props = HashMap::new();
            props.insert("type".to_string(), serde_json::json!("memory_link"));
            props.insert("promoted_from".to_string(), serde_json::json!("layer_d_related_memory"));
            out.push(rel(&ont.entity_id, related_mem_id, "related_to", name, "", props, 0.5, "memory_classification"));
        }
    }
    out
}

/// Method 5: promote co-retrieval cluster candidates (§4.8) to `related_to`
/// edges at `min(0.8, 0.3 + count*0.05)` (spec.md §4.11).
pub fn promote_co_retrieval_clusters(clusters: &[ClusterCandidate], entity_id_map: &HashMap<String, String>) -> Vec<Relationship> {
    let mut out = Vec::new();
    for cluster in clusters {
        let entity_ids: Vec<&String> = cluster.memory_ids.iter().filter_map(|mid| entity_id_map.get(mid)).collect();
        if entity_ids.len() < 2 {
            continue;
        }
        let confidence = (0.3 + cluster.co_retrieval_count as f32 * 0.05).min(0.8);
        for i in 0..entity_ids.len() {
            for j in (i + 1)..entity_ids.len() {
                let mut props = HashMap::new();
                props.insert("type".to_string(), serde_json::json!("co_retrieved"));
                props.insert("co_retrieval_count".to_string(), serde_json::json!(cluster.co_retrieval_count));
                out.push(rel(entity_ids[i], entity_ids[j], "related_to", "", "", props, confidence, "co_retrieval_log"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::entity::{EntityProperties, Provenance};

    fn candidate(name: &str, source_id: &str, record_id: &str) -> CandidateEntity {
        CandidateEntity {
            entity_type: "person".to_string(),
            properties: EntityProperties { name: Some(name.to_string()), ..Default::default() },
            relationships: Vec::new(),
            provenance: Provenance { source_id: source_id.to_string(), source_type: "test".to_string(), record_id: record_id.to_string(), ingested_at: Utc::now(), confidence: 0.9 },
            normalized: None,
            resolved: false,
        }
    }

    #[test]
    fn co_occurrence_requires_shared_record() {
        let a = candidate("Alice", "src1", "rec1");
        let b = candidate("Bob", "src1", "rec1");
        let entities = vec![EntityCandidate { entity_id: "ent_a".to_string(), candidate: &a }, EntityCandidate { entity_id: "ent_b".to_string(), candidate: &b }];
        let rels = extract_co_occurrence(&entities, 1);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].rel_type, "co_mentioned");
        assert_eq!(rels[0].confidence, 0.5);
    }

    #[test]
    fn store_roundtrips_and_compacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relationships.jsonl");
        let store = RelationshipStore::open(&path);
        let r = rel("ent_a", "ent_b", "co_mentioned", "A", "B", HashMap::new(), 0.8, "test");
        let rel_id = r.rel_id.clone();
        assert_eq!(store.append_many(vec![r], 0.3), 1);
        assert!(store.deprecate(&rel_id));
        assert_eq!(store.compact(), 1);
        assert!(store.get_for_entity("ent_a", None, Direction::Both).is_empty());
    }
}
