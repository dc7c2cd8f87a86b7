//! SALUTE telemetry report (spec.md §3). Emitted by the Org Kernel
//! Dispatcher (K), consumed by the Agent Bridge (B) and Translator (T).
//!
//! Grounded field-for-field on
//! `examples/original_source/extensions/before_main_llm_call/_12_org_dispatcher.py`
//! (`_emit_salute`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// PACE escalation ladder (spec.md GLOSSARY, §4.5.1). Ordered
/// `Primary < Alternate < Contingent < Emergency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceLevel {
    Primary,
    Alternate,
    Contingent,
    Emergency,
}

impl Default for PaceLevel {
    fn default() -> Self {
        Self::Primary
    }
}

impl std::fmt::Display for PaceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Primary => "primary",
            Self::Alternate => "alternate",
            Self::Contingent => "contingent",
            Self::Emergency => "emergency",
        };
        write!(f, "{s}")
    }
}

/// Coarse health signal for the `status.health` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Ok,
    Degraded,
    Critical,
}

/// The inner agent's own run-state, as reported in telemetry (distinct from
/// [`PaceLevel`]). Feeds `pace_from_agent_state` in the Translator (T).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Active,
    Escalating,
    ErrorRecovery,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub state: Option<AgentState>,
    pub progress: f32,
    pub pace_level: PaceLevel,
    pub health: Health,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub bst_domain: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub step: Option<u32>,
    #[serde(default)]
    pub total_steps: Option<u32>,
    #[serde(default)]
    pub iterations_on_step: u32,
    #[serde(default)]
    pub current_tool: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub files_read: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub role_id: String,
    pub role_name: String,
    #[serde(default)]
    pub reports_to: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Time {
    pub timestamp: DateTime<Utc>,
    pub turns_elapsed: u32,
    pub turns_since_progress: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub context_fill_pct: f32,
    #[serde(default)]
    pub tool_failures_consecutive: u32,
    #[serde(default)]
    pub tool_failures_total: u32,
    #[serde(default)]
    pub memory_health: Option<String>,
}

/// Status, Activity, Location, Unit, Time, Environment — written on a fixed
/// cadence and on every state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaluteReport {
    pub status: Status,
    pub activity: Activity,
    pub location: Location,
    pub unit: Unit,
    pub time: Time,
    pub environment: Environment,
}

impl SaluteReport {
    /// Directory-relative filename for the latest-report file
    /// (`reports/<role_id>_latest.json`, spec.md §6).
    pub fn latest_filename(role_id: &str) -> String {
        format!("{role_id}_latest.json")
    }

    /// Directory-relative filename for the immutable archive copy
    /// (`reports/archive/<role_id>_<YYYYMMDD_HHMMSS>.json`, spec.md §6).
    pub fn archive_filename(role_id: &str, at: DateTime<Utc>) -> String {
        format!("{role_id}_{}.json", at.format("%Y%m%d_%H%M%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pace_level_orders_primary_lowest() {
        assert!(PaceLevel::Primary < PaceLevel::Alternate);
        assert!(PaceLevel::Alternate < PaceLevel::Contingent);
        assert!(PaceLevel::Contingent < PaceLevel::Emergency);
    }

    #[test]
    fn archive_filename_is_timestamped() {
        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        assert_eq!(SaluteReport::archive_filename("analyst", at), "analyst_20260102_030405.json");
    }
}
