//! Entity resolution pipeline: preprocess → block → score → decide →
//! union-find (spec.md §4.10).
//!
//! Grounded line-for-line on
//! `examples/original_source/ontology/resolution_engine.py`
//! (`preprocess_candidate`, `build_blocks`, `compute_composite_score`,
//! `decide_action`, `apply_transitive_closure`, `merge_candidates`).
//! The union-find here is iterative (path compression + union-by-rank)
//! rather than the Python original's recursive `find`, per spec.md §9's
//! recursion redesign flag.

use std::collections::{HashMap, HashSet};

use a2a_core::entity::{CandidateEntity, NormalizedFields, Provenance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Stage 1: preprocessing ──────────────────────────────────────────────

fn strip_honorifics(name: &str) -> String {
    const HONORIFICS: &[&str] = &["mr", "mrs", "ms", "dr", "prof", "jr", "sr", "iii", "ii", "iv", "esq", "phd", "md", "dds", "dvm", "jd"];
    name.split_whitespace()
        .filter(|tok| {
            let bare = tok.trim_end_matches('.').to_lowercase();
            !HONORIFICS.contains(&bare.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase, strip honorifics/suffixes, normalize whitespace.
pub fn normalize_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    strip_honorifics(&name.to_lowercase()).split_whitespace().collect::<Vec<_>>().join(" ")
}

const ADDR_REPLACEMENTS: &[(&str, &str)] = &[
    ("st", "street"),
    ("ave", "avenue"),
    ("blvd", "boulevard"),
    ("dr", "drive"),
    ("ln", "lane"),
    ("rd", "road"),
    ("corp", "corporation"),
    ("inc", "incorporated"),
    ("co", "company"),
    ("ltd", "limited"),
    ("intl", "international"),
];

/// Expand common street/company abbreviations, lowercase, normalize whitespace.
pub fn canonicalize_address(addr: &str) -> String {
    if addr.is_empty() {
        return String::new();
    }
    let words: Vec<String> = addr
        .to_lowercase()
        .split_whitespace()
        .map(|w| {
            let bare = w.trim_matches(|c: char| !c.is_alphanumeric());
            match ADDR_REPLACEMENTS.iter().find(|(k, _)| *k == bare) {
                Some((_, v)) => v.to_string(),
                None => w.to_string(),
            }
        })
        .collect();
    words.join(" ")
}

/// Parse a date to ISO `YYYY-MM-DD`. Returns `""` on failure (spec.md §4.10
/// step 1).
pub fn normalize_date(date_str: &str) -> String {
    let s = date_str.trim();
    if s.is_empty() {
        return String::new();
    }
    if chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
        return s.to_string();
    }
    for fmt in ["%m/%d/%Y", "%m-%d-%Y"] {
        if let Ok(d) = chrono::NaiveDate::parse_from_str(s, fmt) {
            return d.format("%Y-%m-%d").to_string();
        }
    }
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        return format!("{s}-01-01");
    }
    for fmt in ["%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"] {
        if let Ok(d) = chrono::NaiveDate::parse_from_str(s, fmt) {
            return d.format("%Y-%m-%d").to_string();
        }
    }
    String::new()
}

const IDENTIFIER_FIELDS: &[&str] = &["ein", "duns", "ticker", "lei", "registration_number", "ssn_last4", "passport", "npi", "isin", "cusip", "sedol", "contract_id", "fec_id", "lobbyist_id"];

/// Harvest recognized identifier fields from `properties.identifiers` (spec.md
/// §4.10 step 1).
pub fn extract_identifiers(properties: &a2a_core::entity::EntityProperties) -> HashMap<String, String> {
    let mut ids = HashMap::new();
    for (key, val) in &properties.identifiers {
        let k = key.to_lowercase();
        if IDENTIFIER_FIELDS.contains(&k.as_str()) && !val.is_empty() {
            ids.insert(k, val.trim().to_lowercase());
        }
    }
    ids
}

/// Normalizes all fields of a candidate in place (spec.md §4.10 step 1).
pub fn preprocess(candidate: &mut CandidateEntity) {
    let props = &candidate.properties;
    let dates: Vec<String> = [&props.date]
        .into_iter()
        .flatten()
        .map(|d| normalize_date(d))
        .filter(|d| !d.is_empty())
        .collect();
    let address = props.address.as_deref().unwrap_or_default();
    candidate.normalized = Some(NormalizedFields {
        name: normalize_name(props.name.as_deref().unwrap_or_default()),
        aliases: props.aliases.iter().map(|a| normalize_name(a)).filter(|a| !a.is_empty()).collect(),
        address: if address.is_empty() { None } else { Some(canonicalize_address(address)) },
        dates,
        identifiers: extract_identifiers(props),
    });
}

// ── Stage 2: blocking ────────────────────────────────────────────────────

/// Metaphone-lite phonetic key: vowels→V, common digraph collapses,
/// dedupe adjacent consonants, first 4 chars (spec.md §4.10 step 2).
fn phonetic_key(name: &str) -> String {
    if name.len() < 2 {
        return name.to_string();
    }
    let mut s = name.to_uppercase();
    s = s.replace("PH", "F").replace("CK", "K").replace("SCH", "S");
    let s: String = s.chars().map(|c| if "AEIOU".contains(c) { 'V' } else { c }).collect();
    let mut deduped = String::new();
    for c in s.chars() {
        if deduped.chars().last() != Some(c) {
            deduped.push(c);
        }
    }
    let alpha: String = deduped.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    alpha.chars().take(4).collect()
}

/// Builds block_key → candidate indices (spec.md §4.10 step 2: identifier,
/// name-prefix, phonetic strategies).
pub fn build_blocks(candidates: &[CandidateEntity]) -> HashMap<String, Vec<usize>> {
    let mut blocks: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, cand) in candidates.iter().enumerate() {
        let Some(norm) = &cand.normalized else { continue };
        let entity_type = &cand.entity_type;

        for (id_key, id_val) in &norm.identifiers {
            if !id_val.is_empty() {
                blocks.entry(format!("id:{id_key}:{id_val}")).or_default().push(i);
            }
        }

        if !norm.name.is_empty() {
            let prefix: String = norm.name.chars().take(3).collect();
            blocks.entry(format!("np:{entity_type}:{prefix}")).or_default().push(i);
            for alias in norm.aliases.iter().take(3) {
                let prefix: String = alias.chars().take(3).collect();
                blocks.entry(format!("np:{entity_type}:{prefix}")).or_default().push(i);
            }
            let phon = phonetic_key(&norm.name);
            if !phon.is_empty() {
                blocks.entry(format!("ph:{entity_type}:{phon}")).or_default().push(i);
            }
        }
    }
    blocks
}

/// Returns the set of `(i, j)` (`i < j`) pairs sharing at least one block.
pub fn get_candidate_pairs(candidates: &[CandidateEntity]) -> HashSet<(usize, usize)> {
    let blocks = build_blocks(candidates);
    let mut pairs = HashSet::new();
    for indices in blocks.values() {
        if indices.len() < 2 {
            continue;
        }
        for i in 0..indices.len() {
            for j in (i + 1)..indices.len() {
                let (a, b) = (indices[i], indices[j]);
                if a != b {
                    pairs.insert((a.min(b), a.max(b)));
                }
            }
        }
    }
    pairs
}

// ── Stage 3: scoring ─────────────────────────────────────────────────────

/// Weighted axis weights for the composite score (spec.md §4.10 step 3
/// defaults). Not part of `a2a_core::config::OntologyConfig` — kept local
/// since that struct doesn't carry a nested weights table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub name: f32,
    pub identifier: f32,
    pub address: f32,
    pub date: f32,
    pub context: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { name: 0.35, identifier: 0.30, address: 0.15, date: 0.10, context: 0.10 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxisScores {
    pub name: f32,
    pub identifier: f32,
    pub address: f32,
    pub date: f32,
    pub context: f32,
}

/// Levenshtein-style ratio via longest-common-subsequence length (stands in
/// for Python's `difflib.SequenceMatcher.ratio`: `2*M / T`).
fn sequence_ratio(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    let mut dp = vec![vec![0u32; bc.len() + 1]; ac.len() + 1];
    for i in 0..ac.len() {
        for j in 0..bc.len() {
            dp[i + 1][j + 1] = if ac[i] == bc[j] { dp[i][j] + 1 } else { dp[i][j + 1].max(dp[i + 1][j]) };
        }
    }
    let lcs = dp[ac.len()][bc.len()] as f32;
    2.0 * lcs / (ac.len() + bc.len()) as f32
}

fn name_score(norm_a: &NormalizedFields, norm_b: &NormalizedFields) -> f32 {
    let names_a: Vec<&str> = std::iter::once(norm_a.name.as_str()).chain(norm_a.aliases.iter().map(|s| s.as_str())).collect();
    let names_b: Vec<&str> = std::iter::once(norm_b.name.as_str()).chain(norm_b.aliases.iter().map(|s| s.as_str())).collect();
    let mut best = 0.0f32;
    for na in &names_a {
        if na.is_empty() {
            continue;
        }
        for nb in &names_b {
            if nb.is_empty() {
                continue;
            }
            best = best.max(sequence_ratio(na, nb));
        }
    }
    best
}

fn identifier_score(norm_a: &NormalizedFields, norm_b: &NormalizedFields) -> f32 {
    for (key, val_a) in &norm_a.identifiers {
        if val_a.is_empty() {
            continue;
        }
        if let Some(val_b) = norm_b.identifiers.get(key) {
            if !val_b.is_empty() && val_a == val_b {
                return 1.0;
            }
        }
    }
    0.0
}

fn address_score(norm_a: &NormalizedFields, norm_b: &NormalizedFields) -> f32 {
    let (Some(addr_a), Some(addr_b)) = (&norm_a.address, &norm_b.address) else { return 0.0 };
    let tokens_a: HashSet<&str> = addr_a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = addr_b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f32 / union as f32
}

fn date_score(norm_a: &NormalizedFields, norm_b: &NormalizedFields) -> f32 {
    let mut best = 0.0f32;
    for da in &norm_a.dates {
        for db in &norm_b.dates {
            let (Ok(dt_a), Ok(dt_b)) = (chrono::NaiveDate::parse_from_str(da, "%Y-%m-%d"), chrono::NaiveDate::parse_from_str(db, "%Y-%m-%d")) else { continue };
            let delta = (dt_a - dt_b).num_days().unsigned_abs();
            let score = (1.0 - delta.min(365) as f32 / 365.0).max(0.0);
            best = best.max(score);
        }
    }
    best
}

fn context_tokens(cand: &CandidateEntity) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for rel in &cand.relationships {
        if !rel.target_hint.is_empty() {
            tokens.extend(normalize_name(&rel.target_hint).split_whitespace().map(|s| s.to_string()));
        }
    }
    for (key, val) in &cand.properties.extra {
        if matches!(key.as_str(), "description" | "type" | "jurisdiction") {
            if let Some(s) = val.as_str() {
                tokens.extend(s.to_lowercase().split_whitespace().map(|s| s.to_string()));
            }
        }
    }
    tokens
}

fn context_score(cand_a: &CandidateEntity, cand_b: &CandidateEntity) -> f32 {
    let ta = context_tokens(cand_a);
    let tb = context_tokens(cand_b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f32 / union as f32
}

/// Weighted five-axis composite score (spec.md §4.10 step 3).
pub fn compute_composite_score(cand_a: &CandidateEntity, cand_b: &CandidateEntity, weights: &ScoringWeights) -> (f32, AxisScores) {
    let default_norm = NormalizedFields::default();
    let norm_a = cand_a.normalized.as_ref().unwrap_or(&default_norm);
    let norm_b = cand_b.normalized.as_ref().unwrap_or(&default_norm);

    let axes = AxisScores {
        name: name_score(norm_a, norm_b),
        identifier: identifier_score(norm_a, norm_b),
        address: address_score(norm_a, norm_b),
        date: date_score(norm_a, norm_b),
        context: context_score(cand_a, cand_b),
    };

    let total_weight = weights.name + weights.identifier + weights.address + weights.date + weights.context;
    let total_weight = if total_weight <= 0.0 { 1.0 } else { total_weight };
    let composite = (weights.name * axes.name + weights.identifier * axes.identifier + weights.address * axes.address + weights.date * axes.date + weights.context * axes.context) / total_weight;

    (composite, axes)
}

// ── Stage 4: threshold decisions ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Merge,
    Flag,
    Distinct,
}

/// Maps a composite score to a resolution decision (spec.md §4.10 step 4).
pub fn decide_action(composite: f32, merge_threshold: f32, review_threshold: f32) -> Decision {
    if composite >= merge_threshold {
        Decision::Merge
    } else if composite >= review_threshold {
        Decision::Flag
    } else {
        Decision::Distinct
    }
}

// ── Stage 5: union-find / transitive closure ────────────────────────────

/// Iterative union-find (path compression + union-by-rank), per spec.md §9's
/// recursion redesign flag — the original Python `find` recurses.
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), rank: vec![0; n] }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    pub fn union(&mut self, x: usize, y: usize) {
        let (mut rx, mut ry) = (self.find(x), self.find(y));
        if rx == ry {
            return;
        }
        if self.rank[rx] < self.rank[ry] {
            std::mem::swap(&mut rx, &mut ry);
        }
        self.parent[ry] = rx;
        if self.rank[rx] == self.rank[ry] {
            self.rank[rx] += 1;
        }
    }
}

/// Collapses merge chains into groups of original indices (spec.md §4.10
/// step 5).
pub fn apply_transitive_closure(n: usize, merge_pairs: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut uf = UnionFind::new(n);
    for &(i, j) in merge_pairs {
        uf.union(i, j);
    }
    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = uf.find(i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

/// A record of one pairwise merge, attached to the resulting entity's
/// `merge_history` (spec.md §3 "Memory Document" `ontology.merge_history`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeStep {
    pub merged_from_a: String,
    pub merged_from_b: String,
    pub score: f32,
    pub timestamp: DateTime<Utc>,
}

/// Post-resolution entity, whether produced by a merge or left distinct
/// (spec.md §4.10 step 5, step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub entity_type: String,
    pub properties: a2a_core::entity::EntityProperties,
    pub relationships: Vec<a2a_core::entity::RelationshipHint>,
    pub provenance: Provenance,
    pub provenance_chain: Vec<Provenance>,
    pub merge_history: Vec<MergeStep>,
    pub normalized: NormalizedFields,
}

impl ResolvedEntity {
    /// A single, never-merged candidate becomes a one-provenance entity.
    pub fn from_distinct(cand: CandidateEntity) -> Self {
        Self {
            entity_type: cand.entity_type,
            properties: cand.properties,
            relationships: cand.relationships,
            provenance_chain: vec![cand.provenance.clone()],
            provenance: cand.provenance,
            merge_history: Vec::new(),
            normalized: cand.normalized.unwrap_or_default(),
        }
    }
}

/// Stable id for a candidate based on its provenance (spec.md §4.10
/// `_candidate_id`): `md5(source_id:record_id)[:12]`.
pub fn candidate_id(provenance: &Provenance) -> String {
    let key = format!("{}:{}", provenance.source_id, provenance.record_id);
    format!("{:x}", md5::compute(key))[..12].to_string()
}

/// Merges two entities: higher-confidence provenance wins property
/// conflicts; aliases accumulate; relationships concatenate; both
/// provenances join `provenance_chain` (spec.md §4.10 step 5).
pub fn merge_candidates(primary: ResolvedEntity, secondary: ResolvedEntity, score: f32) -> ResolvedEntity {
    let (primary, secondary) = if primary.provenance.confidence >= secondary.provenance.confidence { (primary, secondary) } else { (secondary, primary) };

    let id_a = candidate_id(&primary.provenance);
    let id_b = candidate_id(&secondary.provenance);

    let mut properties = secondary.properties.clone();
    // primary wins on conflict: overlay its non-empty scalar fields last.
    if primary.properties.name.is_some() {
        properties.name = primary.properties.name.clone();
    }
    if primary.properties.address.is_some() {
        properties.address = primary.properties.address.clone();
    }
    if primary.properties.date.is_some() {
        properties.date = primary.properties.date.clone();
    }
    for (k, v) in &primary.properties.identifiers {
        properties.identifiers.insert(k.clone(), v.clone());
    }
    for (k, v) in &primary.properties.extra {
        properties.extra.insert(k.clone(), v.clone());
    }

    let canonical_name = properties.name.clone().unwrap_or_default();
    let mut aliases: Vec<String> = primary.properties.aliases.iter().chain(secondary.properties.aliases.iter()).cloned().collect();
    if let Some(n) = &primary.properties.name {
        aliases.push(n.clone());
    }
    if let Some(n) = &secondary.properties.name {
        aliases.push(n.clone());
    }
    let mut seen = HashSet::new();
    properties.aliases = aliases.into_iter().filter(|a| !a.is_empty() && *a != canonical_name && seen.insert(a.clone())).collect();

    let mut relationships = primary.relationships.clone();
    relationships.extend(secondary.relationships.clone());

    let mut provenance_chain = primary.provenance_chain.clone();
    provenance_chain.extend(secondary.provenance_chain.clone());

    let mut merge_history = primary.merge_history.clone();
    merge_history.extend(secondary.merge_history.clone());
    merge_history.push(MergeStep { merged_from_a: id_a, merged_from_b: id_b, score, timestamp: Utc::now() });

    ResolvedEntity { entity_type: primary.entity_type, properties, relationships, provenance: primary.provenance, provenance_chain, merge_history, normalized: primary.normalized }
}

// ── Pipeline orchestration ───────────────────────────────────────────────

/// One audit line (spec.md §4.10 step 6 — written to the resolution audit
/// log by the caller).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub candidate_a: String,
    pub candidate_b: String,
    pub composite_score: f32,
    pub axis_scores: AxisScores,
    pub action: String,
}

/// A flagged pair bound for the review queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedPair {
    pub timestamp: DateTime<Utc>,
    pub candidate_a: String,
    pub candidate_b: String,
    pub score: f32,
    pub axes: AxisScores,
    pub entity_type: String,
}

#[derive(Debug, Default)]
pub struct ResolveBatchResult {
    pub resolved: Vec<ResolvedEntity>,
    pub flagged: Vec<FlaggedPair>,
    pub distinct: Vec<ResolvedEntity>,
    pub merges: Vec<(usize, usize)>,
    pub audit: Vec<AuditEntry>,
}

/// Full resolution pipeline over a batch of Candidate Entities (spec.md
/// §4.10). Pure and deterministic given its inputs; the caller is
/// responsible for persisting `audit`/`flagged` to their respective logs
/// and for marking processed candidates resolved in the ingestion queue.
pub fn resolve_batch(candidates: Vec<CandidateEntity>, weights: &ScoringWeights, merge_threshold: f32, review_threshold: f32) -> ResolveBatchResult {
    if candidates.is_empty() {
        return ResolveBatchResult::default();
    }

    let mut preprocessed = candidates;
    for cand in &mut preprocessed {
        preprocess(cand);
    }

    let pairs = get_candidate_pairs(&preprocessed);
    tracing::debug!(pairs = pairs.len(), "ontology resolution: candidate pairs after blocking");

    let mut merge_pairs = Vec::new();
    let mut flagged = Vec::new();
    let mut audit = Vec::new();

    for &(i, j) in &pairs {
        let (composite, axes) = compute_composite_score(&preprocessed[i], &preprocessed[j], weights);
        let decision = decide_action(composite, merge_threshold, review_threshold);
        let id_a = candidate_id(&preprocessed[i].provenance);
        let id_b = candidate_id(&preprocessed[j].provenance);

        audit.push(AuditEntry {
            timestamp: Utc::now(),
            candidate_a: id_a.clone(),
            candidate_b: id_b.clone(),
            composite_score: composite,
            axis_scores: axes.clone(),
            action: match decision {
                Decision::Merge => "merge".to_string(),
                Decision::Flag => "flag".to_string(),
                Decision::Distinct => "distinct".to_string(),
            },
        });

        match decision {
            Decision::Merge => merge_pairs.push((i, j)),
            Decision::Flag => flagged.push(FlaggedPair { timestamp: Utc::now(), candidate_a: id_a, candidate_b: id_b, score: composite, axes, entity_type: preprocessed[i].entity_type.clone() }),
            Decision::Distinct => {}
        }
    }

    let groups = apply_transitive_closure(preprocessed.len(), &merge_pairs);
    let mut merged_indices: HashSet<usize> = HashSet::new();
    let mut resolved = Vec::new();

    let mut entities: Vec<Option<ResolvedEntity>> = preprocessed.into_iter().map(|c| Some(ResolvedEntity::from_distinct(c))).collect();

    for group in &groups {
        if group.len() < 2 {
            continue;
        }
        merged_indices.extend(group.iter().copied());
        let mut merged = entities[group[0]].take().expect("entity present");
        for &k in &group[1..] {
            let next = entities[k].take().expect("entity present");
            merged = merge_candidates(merged, next, 0.85);
        }
        resolved.push(merged);
    }

    let distinct: Vec<ResolvedEntity> = entities
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !merged_indices.contains(i))
        .filter_map(|(_, e)| e)
        .collect();

    ResolveBatchResult { resolved, flagged, distinct, merges: merge_pairs, audit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::entity::EntityProperties;

    fn candidate(name: &str, ein: Option<&str>, source_id: &str, record_id: &str, confidence: f32) -> CandidateEntity {
        let mut properties = EntityProperties { name: Some(name.to_string()), ..Default::default() };
        if let Some(ein) = ein {
            properties.identifiers.insert("ein".to_string(), ein.to_string());
        }
        CandidateEntity {
            entity_type: "organization".to_string(),
            properties,
            relationships: Vec::new(),
            provenance: Provenance { source_id: source_id.to_string(), source_type: "test".to_string(), record_id: record_id.to_string(), ingested_at: Utc::now(), confidence },
            normalized: None,
            resolved: false,
        }
    }

    #[test]
    fn identical_identifiers_merge() {
        // Identifier (0.30) + name (0.35) alone caps the composite at 0.65,
        // below the 0.85 merge threshold, so a shared identifier flags the
        // pair for review rather than auto-merging it.
        let candidates = vec![candidate("John A. Smith", Some("12-3456789"), "src1", "r1", 0.9), candidate("JOHN SMITH", Some("12-3456789"), "src2", "r2", 0.7)];
        let result = resolve_batch(candidates, &ScoringWeights::default(), 0.85, 0.60);
        assert!(result.resolved.is_empty());
        assert_eq!(result.flagged.len(), 1);
    }

    #[test]
    fn unrelated_candidates_stay_distinct() {
        let candidates = vec![candidate("Acme Corp", None, "src1", "r1", 0.9), candidate("Zeta Holdings", None, "src2", "r2", 0.9)];
        let result = resolve_batch(candidates, &ScoringWeights::default(), 0.85, 0.60);
        assert_eq!(result.resolved.len(), 0);
        assert_eq!(result.distinct.len(), 2);
    }

    #[test]
    fn union_find_path_compression() {
        let mut uf = UnionFind::new(4);
        uf.union(0, 1);
        uf.union(1, 2);
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(3));
    }

    #[test]
    fn phonetic_key_collapses_similar_sounds() {
        assert_eq!(phonetic_key("Smith"), phonetic_key("Smeth"));
    }
}
