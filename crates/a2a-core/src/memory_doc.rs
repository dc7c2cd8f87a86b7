//! Memory Document and its four-axis classification (spec.md §3 "Memory
//! Document"), classified by the Memory Classifier (M) and consumed by
//! Memory Maintenance (D) and the Recall Filter (F).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Main,
    Fragments,
    Solutions,
    Ontology,
}

/// `deprecated` is terminal (spec.md §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Confirmed,
    Inferred,
    Deprecated,
}

impl Validity {
    /// Ranking used by conflict resolution rule 2 (spec.md §4.7):
    /// confirmed > inferred > deprecated.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Confirmed => 2,
            Self::Inferred => 1,
            Self::Deprecated => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Active,
    Dormant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Utility {
    LoadBearing,
    Tactical,
    Archived,
}

impl Utility {
    /// Ranking used by conflict resolution rule 3 and recall ordering
    /// (spec.md §4.7, §4.9): load_bearing > tactical > archived.
    pub fn rank(&self) -> u8 {
        match self {
            Self::LoadBearing => 2,
            Self::Tactical => 1,
            Self::Archived => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    UserAsserted,
    AgentInferred,
    ExternalRetrieved,
    BookshelfDocument,
}

impl Source {
    /// Ranking used by conflict resolution rule 1 (spec.md §4.7):
    /// user_asserted > external_retrieved > agent_inferred > bookshelf_document.
    pub fn rank(&self) -> u8 {
        match self {
            Self::UserAsserted => 3,
            Self::ExternalRetrieved => 2,
            Self::AgentInferred => 1,
            Self::BookshelfDocument => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub validity: Validity,
    pub relevance: Relevance,
    pub utility: Utility,
    pub source: Source,
}

/// One or many ids — `superseded_by`/`supersedes` may promote from a single
/// id to a list on repeat supersession (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn push(self, id: String) -> Self {
        match self {
            Self::One(existing) => Self::Many(vec![existing, id]),
            Self::Many(mut v) => {
                v.push(id);
                Self::Many(v)
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        match self {
            Self::One(existing) => existing == id,
            Self::Many(v) => v.iter().any(|x| x == id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineage {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by_role: Option<String>,
    #[serde(default)]
    pub bst_domain: Option<String>,
    pub classified_at_cycle: u32,
    #[serde(default)]
    pub supersedes: Option<OneOrMany>,
    #[serde(default)]
    pub superseded_by: Option<String>,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub related_memory_ids: Vec<String>,
    #[serde(default)]
    pub dormancy_candidate: bool,
    #[serde(default)]
    pub deprecated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deprecated_reason: Option<String>,
}

impl Lineage {
    pub fn new(created_by_role: Option<String>, bst_domain: Option<String>, classified_at_cycle: u32) -> Self {
        Self {
            created_at: Utc::now(),
            created_by_role,
            bst_domain,
            classified_at_cycle,
            supersedes: None,
            superseded_by: None,
            access_count: 0,
            last_accessed: None,
            related_memory_ids: Vec::new(),
            dormancy_candidate: false,
            deprecated_at: None,
            deprecated_reason: None,
        }
    }
}

/// Ontology linkage attached once a memory becomes an entity summary
/// (spec.md §4.11, `area == ontology`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyLink {
    pub entity_id: String,
    pub entity_type: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    #[serde(default)]
    pub provenance_chain: Vec<String>,
    #[serde(default)]
    pub merge_history: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub id: String,
    pub text: String,
    pub area: Area,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub classification: Option<Classification>,
    #[serde(default)]
    pub lineage: Option<Lineage>,
    #[serde(default)]
    pub ontology: Option<OntologyLink>,
}

impl MemoryDocument {
    pub fn is_classified(&self) -> bool {
        self.classification.is_some()
    }

    pub fn is_deprecated(&self) -> bool {
        matches!(self.classification.as_ref().map(|c| c.validity), Some(Validity::Deprecated))
    }
}
