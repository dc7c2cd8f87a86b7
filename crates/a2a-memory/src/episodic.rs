//! Episodic valence/trust module (spec.md §9 Open Question: declared but
//! deliberately NOT wired into the classifier or recall filter).
//!
//! Grounded on `examples/original_source/skills/episodic_memory.py`'s
//! stated design (`EpisodicRecord`, `ValenceDecay`, time-weighted decay) —
//! the retrieved source is a header/import stub only, so the body below is
//! a from-scratch but doctrine-faithful reimplementation of what it
//! describes: observable-signal valence, exponential time decay, no
//! introspection.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-life, in days, for valence decay (time-weighted, calibrated
/// loosely rather than fit — this module is explicitly a stub per
/// spec.md §9).
const VALENCE_HALF_LIFE_DAYS: f32 = 14.0;

/// One session's recorded interaction dynamics. Written as a JSON line
/// alongside transcripts; never read back by the classifier or recall
/// filter (spec.md §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicRecord {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    /// Raw valence in `[-1.0, 1.0]`, computed from observable signals only
    /// (tool failure rate, escalation count, explicit user correction) —
    /// never from model self-report.
    pub valence: f32,
    /// Raw trust in `[0.0, 1.0]`.
    pub trust: f32,
    pub tags: Vec<String>,
}

/// Observable signals used to compute valence (Damasio's somatic-marker
/// framing: valence from externally observable outcomes, not introspection).
#[derive(Debug, Clone, Default)]
pub struct ValenceSignals {
    pub tool_failure_count: u32,
    pub tool_attempt_count: u32,
    pub pace_escalations: u32,
    pub explicit_corrections: u32,
    pub task_completed: bool,
}

/// Computes raw valence from observable signals, clamped to `[-1.0, 1.0]`.
pub fn compute_valence(signals: &ValenceSignals) -> f32 {
    let failure_rate = if signals.tool_attempt_count > 0 {
        signals.tool_failure_count as f32 / signals.tool_attempt_count as f32
    } else {
        0.0
    };
    let mut valence = if signals.task_completed { 0.5 } else { -0.2 };
    valence -= failure_rate * 0.6;
    valence -= signals.pace_escalations as f32 * 0.15;
    valence -= signals.explicit_corrections as f32 * 0.1;
    valence.clamp(-1.0, 1.0)
}

/// Applies exponential time-weighted decay toward zero:
/// `effective = raw * 0.5^(age_days / half_life)` (spec.md §9's
/// `compute_effective_valence(raw, age)`).
pub fn compute_effective_valence(raw: f32, age_days: f32) -> f32 {
    if age_days <= 0.0 {
        return raw;
    }
    raw * 0.5f32.powf(age_days / VALENCE_HALF_LIFE_DAYS)
}

/// Appends one record as a JSON line to `path` (creates the file if absent).
pub fn append_record(path: &Path, record: &EpisodicRecord) -> std::io::Result<()> {
    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_task_with_failures_is_negative() {
        let signals = ValenceSignals { tool_failure_count: 4, tool_attempt_count: 5, pace_escalations: 1, explicit_corrections: 0, task_completed: false };
        assert!(compute_valence(&signals) < 0.0);
    }

    #[test]
    fn decay_shrinks_magnitude_over_time() {
        let recent = compute_effective_valence(0.8, 1.0);
        let old = compute_effective_valence(0.8, 60.0);
        assert!(old.abs() < recent.abs());
    }

    #[test]
    fn zero_age_is_unchanged() {
        assert_eq!(compute_effective_valence(0.5, 0.0), 0.5);
    }
}
