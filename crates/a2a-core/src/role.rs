//! Role Profile and Organization definitions (spec.md §3 "Role Profile").
//!
//! Grounded on
//! `examples/original_source/extensions/before_main_llm_call/_12_org_dispatcher.py`
//! (`_load_role_profile`, `_select_role`, `_load_active_org`) and
//! `pagi_core::knowledge::traits::{SovereignModule, ModuleRegistry}` for the
//! registry shape consumed in `a2a-kernel::role_select`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    Specialist,
    Executive,
    Commander,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub bst_domains: Vec<String>,
    /// `None` = unrestricted tool palette.
    #[serde(default)]
    pub tool_plans: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctrine {
    pub salute_interval_turns: u32,
    pub max_turns_without_progress: u32,
}

impl Default for Doctrine {
    fn default() -> Self {
        Self { salute_interval_turns: 5, max_turns_without_progress: 10 }
    }
}

/// A single escalation trigger: a raw expression in the tiny DSL parsed by
/// `a2a_kernel::pace::parse_trigger` (spec.md §9 re-architect note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaceTrigger {
    pub trigger: String,
}

/// Escalation expressions for the alternate/contingent/emergency rungs
/// (spec.md §3 `pace_plan`). Primary has no trigger — it's the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacePlan {
    #[serde(default)]
    pub alternate: Option<PaceTrigger>,
    #[serde(default)]
    pub contingent: Option<PaceTrigger>,
    #[serde(default)]
    pub emergency: Option<PaceTrigger>,
}

/// A role loaded from `organizations/roles/<role_id>.json` (spec.md §6).
/// Read-only at runtime; the source of truth is the file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleProfile {
    pub role_id: String,
    pub role_name: String,
    pub role_type: RoleType,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub doctrine: Doctrine,
    #[serde(default)]
    pub pace_plan: PacePlan,
}

/// The active organization definition (`organizations/active.json`,
/// spec.md §6). `hierarchy` lists role ids in the order the dispatcher scans
/// them when selecting a role for the turn's BST domain (spec.md §4.5 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    pub hierarchy: Vec<String>,
}
