//! Document store + similarity search abstraction (spec.md §4.7–§4.9).
//!
//! Grounded on `a2a_core::memory::MemoryManager`'s Sled-backed durable
//! store, with the hot cache replaced by a plain `RwLock<HashMap>` (no
//! multi-writer contention expected at this layer, so `dashmap` adds
//! nothing `a2a-memory` needs). The original Python source delegates
//! similarity search to a FAISS-backed `Memory` wrapper
//! (`db.search_similarity_threshold`); this crate abstracts that behind
//! [`VectorIndex`] and ships a deterministic word-overlap scorer as the
//! default implementation, since no embedding backend is in scope here
//! (recorded as an Open Question decision in DESIGN.md).

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use a2a_core::memory_doc::MemoryDocument;

/// Similarity search + storage over [`MemoryDocument`]s.
pub trait VectorIndex {
    fn upsert(&self, doc: MemoryDocument);
    fn get(&self, id: &str) -> Option<MemoryDocument>;
    fn remove(&self, id: &str) -> Option<MemoryDocument>;
    fn all_docs(&self) -> HashMap<String, MemoryDocument>;
    /// Returns `(id, score)` pairs above `threshold`, best-first, capped at `limit`.
    fn search_similarity_threshold(&self, query: &str, limit: usize, threshold: f32) -> Vec<(String, f32)>;
}

fn tokenize(text: &str) -> std::collections::HashSet<String> {
    text.to_lowercase().split_whitespace().map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string()).filter(|s| !s.is_empty()).collect()
}

/// Deterministic word-set Jaccard/overlap similarity: `|A ∩ B| / min(|A|, |B|)`.
/// Mirrors `_text_overlaps`'s "overlap / smaller side" ratio used throughout
/// the source extensions for both source detection and conflict search.
pub fn word_overlap_similarity(a: &str, b: &str) -> f32 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let overlap = ta.intersection(&tb).count();
    let smaller = ta.len().min(tb.len());
    overlap as f32 / smaller as f32
}

/// Sled-backed document store with an in-memory hot index, mirroring
/// `MemoryManager`'s cache-then-durable-store shape.
pub struct MemoryStore {
    db: sled::Db,
    docs: RwLock<HashMap<String, MemoryDocument>>,
}

impl MemoryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        let mut docs = HashMap::new();
        for item in db.iter() {
            let (key, value) = item?;
            if let Ok(id) = std::str::from_utf8(&key) {
                if let Ok(doc) = serde_json::from_slice::<MemoryDocument>(&value) {
                    docs.insert(id.to_string(), doc);
                }
            }
        }
        Ok(Self { db, docs: RwLock::new(docs) })
    }

    fn persist(&self, doc: &MemoryDocument) {
        if let Ok(bytes) = serde_json::to_vec(doc) {
            let _ = self.db.insert(doc.id.as_bytes(), bytes);
        }
    }
}

impl VectorIndex for MemoryStore {
    fn upsert(&self, doc: MemoryDocument) {
        self.persist(&doc);
        self.docs.write().expect("memory store lock").insert(doc.id.clone(), doc);
    }

    fn get(&self, id: &str) -> Option<MemoryDocument> {
        self.docs.read().expect("memory store lock").get(id).cloned()
    }

    fn remove(&self, id: &str) -> Option<MemoryDocument> {
        let _ = self.db.remove(id.as_bytes());
        self.docs.write().expect("memory store lock").remove(id)
    }

    fn all_docs(&self) -> HashMap<String, MemoryDocument> {
        self.docs.read().expect("memory store lock").clone()
    }

    fn search_similarity_threshold(&self, query: &str, limit: usize, threshold: f32) -> Vec<(String, f32)> {
        let docs = self.docs.read().expect("memory store lock");
        let mut scored: Vec<(String, f32)> = docs
            .iter()
            .map(|(id, doc)| (id.clone(), word_overlap_similarity(query, &doc.text)))
            .filter(|(_, score)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_is_symmetric_on_exact_match() {
        assert_eq!(word_overlap_similarity("the cat sat", "the cat sat"), 1.0);
    }

    #[test]
    fn store_roundtrips_through_sled() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        let doc = MemoryDocument { id: "m1".to_string(), text: "the project uses Rust".to_string(), area: a2a_core::memory_doc::Area::Main, timestamp: chrono::Utc::now(), classification: None, lineage: None, ontology: None };
        store.upsert(doc.clone());
        assert_eq!(store.get("m1").unwrap().text, doc.text);
    }
}
