//! Configuration surface (spec.md §6 "Config surface").
//!
//! Two coexisting patterns, mirroring the teacher: [`GatewayConfig`] is
//! loaded through the `config` crate (file + env overlay); [`MaintenanceConfig`]
//! and [`OntologyConfig`] are simple env-driven toggle structs in the style
//! of `pagi_core::config::SovereignConfig`.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Authentication scheme for the Gateway (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    None,
    ApiKey,
    Bearer,
}

impl Default for AuthScheme {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticationConfig {
    #[serde(default)]
    pub scheme: AuthScheme,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConnectionConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AgentConnectionConfig {
    fn default() -> Self {
        Self { base_url: "http://127.0.0.1:9000".to_string(), api_key: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskQueueConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_max_queued")]
    pub max_queued: usize,
    #[serde(default = "default_task_timeout_seconds")]
    pub task_timeout_seconds: u64,
}

fn default_max_concurrent() -> usize {
    4
}
fn default_max_queued() -> usize {
    32
}
fn default_task_timeout_seconds() -> u64 {
    600
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_queued: default_max_queued(),
            task_timeout_seconds: default_task_timeout_seconds(),
        }
    }
}

/// Gateway configuration (G, Q, B). Loaded via `config::Config::builder()`
/// with defaults, an optional TOML file, then `A2A__`-prefixed env overlay —
/// directly mirroring `pagi_core::shared::CoreConfig::load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub authentication: AuthenticationConfig,
    pub agent_connection: AgentConnectionConfig,
    #[serde(default)]
    pub task_queue: TaskQueueConfig,
    #[serde(default = "default_salute_poll_interval_seconds")]
    pub salute_poll_interval_seconds: u64,
    #[serde(default = "default_org_dir")]
    pub org_dir: String,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
    #[serde(default = "default_roles_dir")]
    pub roles_dir: String,
    #[serde(default)]
    pub plan_library_path: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_salute_poll_interval_seconds() -> u64 {
    2
}
fn default_org_dir() -> String {
    "organizations".to_string()
}
fn default_reports_dir() -> String {
    "reports".to_string()
}
fn default_roles_dir() -> String {
    "organizations/roles".to_string()
}

impl GatewayConfig {
    /// Load config from file and environment. Precedence: env `A2A_CONFIG`
    /// path > `config/gateway.toml` > defaults. Mirrors
    /// `pagi_core::shared::CoreConfig::load`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("A2A_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .set_default("salute_poll_interval_seconds", default_salute_poll_interval_seconds() as i64)?
            .set_default("org_dir", default_org_dir())?
            .set_default("reports_dir", default_reports_dir())?
            .set_default("roles_dir", default_roles_dir())?
            .set_default("agent_connection.base_url", "http://127.0.0.1:9000")?;

        let path = Path::new(&config_path);
        let builder = if path.exists() { builder.add_source(config::File::from(path)) } else { builder };

        let built = builder
            .add_source(config::Environment::with_prefix("A2A").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}

/// Memory maintenance thresholds (M, D, F — §6 "memory" config surface).
/// Env-driven toggle struct in the style of `pagi_core::config::SovereignConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Keyword set that marks a memory `load_bearing`. Env: `A2A_LOAD_BEARING_KEYWORDS` (comma-separated).
    #[serde(default = "default_load_bearing_keywords")]
    pub load_bearing_keywords: Vec<String>,
    /// Cycles of zero access before a tactical memory is archived. Env: `A2A_ARCHIVAL_THRESHOLD_CYCLES`.
    #[serde(default = "default_archival_threshold_cycles")]
    pub archival_threshold_cycles: u32,
    /// Cycles a deprecated memory is retained before purge. Env: `A2A_DEPRECATION_RETENTION_CYCLES`.
    #[serde(default = "default_deprecation_retention_cycles")]
    pub deprecation_retention_cycles: u32,
    /// Cap on memories injected per turn for area main/fragments. Env: `A2A_MAX_INJECTED_MEMORIES`.
    #[serde(default = "default_max_injected_memories")]
    pub max_injected_memories: usize,
    /// Background maintenance cadence, in agent loops. Env: `A2A_MAINTENANCE_INTERVAL_LOOPS`.
    #[serde(default = "default_maintenance_interval_loops")]
    pub maintenance_interval_loops: u32,
    /// Top-k similarity search size for conflict detection. Env: `A2A_CONFLICT_TOP_K`.
    #[serde(default = "default_conflict_top_k")]
    pub conflict_top_k: usize,
    /// Whether purge of long-deprecated memories is enabled. Env: `A2A_ENABLE_PURGE`.
    #[serde(default = "default_true")]
    pub enable_purge: bool,
    #[serde(default)]
    pub deduplication: DeduplicationConfig,
    #[serde(default)]
    pub related_memories: RelatedMemoriesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dedup_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_pairs_per_cycle")]
    pub max_pairs_per_cycle: usize,
    #[serde(default)]
    pub auto_deprecate_agent_inferred: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: default_dedup_similarity_threshold(),
            max_pairs_per_cycle: default_max_pairs_per_cycle(),
            auto_deprecate_agent_inferred: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedMemoriesConfig {
    #[serde(default = "default_tag_overlap_threshold")]
    pub tag_overlap_threshold: usize,
    #[serde(default = "default_max_related_per_memory")]
    pub max_related_per_memory: usize,
}

impl Default for RelatedMemoriesConfig {
    fn default() -> Self {
        Self {
            tag_overlap_threshold: default_tag_overlap_threshold(),
            max_related_per_memory: default_max_related_per_memory(),
        }
    }
}

fn default_load_bearing_keywords() -> Vec<String> {
    ["must", "always", "never", "requirement"].iter().map(|s| s.to_string()).collect()
}
fn default_archival_threshold_cycles() -> u32 {
    20
}
fn default_deprecation_retention_cycles() -> u32 {
    50
}
fn default_max_injected_memories() -> usize {
    8
}
fn default_maintenance_interval_loops() -> u32 {
    10
}
fn default_conflict_top_k() -> usize {
    5
}
fn default_dedup_similarity_threshold() -> f32 {
    0.90
}
fn default_max_pairs_per_cycle() -> usize {
    200
}
fn default_tag_overlap_threshold() -> usize {
    3
}
fn default_max_related_per_memory() -> usize {
    10
}
fn default_true() -> bool {
    true
}

impl MaintenanceConfig {
    /// Load from environment, falling back to the defaults above. Mirrors
    /// `pagi_core::config::SovereignConfig::from_env`.
    pub fn from_env() -> Self {
        Self {
            load_bearing_keywords: env_opt_string("A2A_LOAD_BEARING_KEYWORDS")
                .map(|s| s.split(',').map(|k| k.trim().to_string()).collect())
                .unwrap_or_else(default_load_bearing_keywords),
            archival_threshold_cycles: env_u32("A2A_ARCHIVAL_THRESHOLD_CYCLES", default_archival_threshold_cycles()),
            deprecation_retention_cycles: env_u32(
                "A2A_DEPRECATION_RETENTION_CYCLES",
                default_deprecation_retention_cycles(),
            ),
            max_injected_memories: env_u32("A2A_MAX_INJECTED_MEMORIES", default_max_injected_memories() as u32)
                as usize,
            maintenance_interval_loops: env_u32(
                "A2A_MAINTENANCE_INTERVAL_LOOPS",
                default_maintenance_interval_loops(),
            ),
            conflict_top_k: env_u32("A2A_CONFLICT_TOP_K", default_conflict_top_k() as u32) as usize,
            enable_purge: env_bool("A2A_ENABLE_PURGE", true),
            deduplication: DeduplicationConfig::default(),
            related_memories: RelatedMemoriesConfig::default(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Ontology/entity-resolution thresholds (E, N — §6 "ontology" config surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyConfig {
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: f32,
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f32,
    #[serde(default = "default_co_occurrence_min_sources")]
    pub co_occurrence_min_sources: u32,
    #[serde(default = "default_temporal_window_days")]
    pub temporal_window_days: i64,
    #[serde(default = "default_min_confidence_to_surface")]
    pub min_confidence_to_surface: f32,
    #[serde(default = "default_true")]
    pub promote_memory_links: bool,
    #[serde(default = "default_maintenance_interval_cycles")]
    pub maintenance_interval_cycles: u32,
    #[serde(default = "default_true")]
    pub compact_deprecated_relationships: bool,
    #[serde(default = "default_true")]
    pub relationship_confidence_update: bool,
    #[serde(default = "default_true")]
    pub rebuild_merged_summaries: bool,
}

fn default_merge_threshold() -> f32 {
    0.85
}
fn default_review_threshold() -> f32 {
    0.60
}
fn default_co_occurrence_min_sources() -> u32 {
    3
}
fn default_temporal_window_days() -> i64 {
    30
}
fn default_min_confidence_to_surface() -> f32 {
    0.3
}
fn default_maintenance_interval_cycles() -> u32 {
    10
}

impl OntologyConfig {
    pub fn from_env() -> Self {
        Self {
            merge_threshold: env_f32("A2A_MERGE_THRESHOLD", default_merge_threshold()),
            review_threshold: env_f32("A2A_REVIEW_THRESHOLD", default_review_threshold()),
            co_occurrence_min_sources: env_u32(
                "A2A_CO_OCCURRENCE_MIN_SOURCES",
                default_co_occurrence_min_sources(),
            ),
            temporal_window_days: env_u32("A2A_TEMPORAL_WINDOW_DAYS", default_temporal_window_days() as u32) as i64,
            min_confidence_to_surface: env_f32(
                "A2A_MIN_CONFIDENCE_TO_SURFACE",
                default_min_confidence_to_surface(),
            ),
            promote_memory_links: env_bool("A2A_PROMOTE_MEMORY_LINKS", true),
            maintenance_interval_cycles: env_u32(
                "A2A_ONTOLOGY_MAINTENANCE_INTERVAL_CYCLES",
                default_maintenance_interval_cycles(),
            ),
            compact_deprecated_relationships: env_bool("A2A_COMPACT_DEPRECATED_RELATIONSHIPS", true),
            relationship_confidence_update: env_bool("A2A_RELATIONSHIP_CONFIDENCE_UPDATE", true),
            rebuild_merged_summaries: env_bool("A2A_REBUILD_MERGED_SUMMARIES", true),
        }
    }
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(default)
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f32(name: &str, default: f32) -> f32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maintenance_config_defaults() {
        let cfg = MaintenanceConfig::from_env();
        assert!(cfg.load_bearing_keywords.contains(&"must".to_string()));
        assert_eq!(cfg.archival_threshold_cycles, 20);
    }

    #[test]
    fn ontology_config_defaults() {
        let cfg = OntologyConfig::from_env();
        assert_eq!(cfg.merge_threshold, 0.85);
        assert_eq!(cfg.review_threshold, 0.60);
    }
}
