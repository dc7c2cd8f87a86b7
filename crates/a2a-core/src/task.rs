//! Task lifecycle types owned by the Task Registry (Q, spec.md §3/§4.2).
//!
//! Grounded on `pagi_core::shared::{TaskDifficulty, GovernanceAction,
//! GovernedTask, TaskGovernor}` for the lattice-state/threshold struct shape,
//! and `examples/original_source/a2a_server/task_registry.py` for the exact
//! state machine and field semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::salute::{PaceLevel, SaluteReport};

/// Task lifecycle state. Terminal states never transition further
/// (spec.md §3 invariant, §8 "state transitions respect the lattice").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// True for `{completed, failed, canceled}`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

/// One turn in a task's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: HistoryRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRole {
    User,
    Agent,
}

/// One artifact part: either inline text, or base64 binary (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactPart {
    Text { text: String },
    Data { data: String },
}

/// Metadata accompanying an artifact (spec.md §6 Task snapshot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub mime_type: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// A file collected from `location.files_modified` after a task's terminal
/// SALUTE (spec.md §4.4 `collect_artifacts`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub parts: Vec<ArtifactPart>,
    pub metadata: ArtifactMetadata,
}

/// A task owned by the Registry; lifetime = server session (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub context_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: TaskState,
    pub message_text: String,
    /// Assigned by the inner agent on first turn; reused for follow-ups.
    #[serde(default)]
    pub agent_context_id: Option<String>,
    pub history: Vec<HistoryTurn>,
    #[serde(default)]
    pub last_telemetry: Option<SaluteReport>,
    #[serde(default)]
    pub pace_level: Option<PaceLevel>,
    #[serde(default)]
    pub result_text: Option<String>,
    #[serde(default)]
    pub error_detail: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl Task {
    /// Constructs a brand-new task in `submitted` state. The Registry
    /// transitions it to `working` or leaves it `submitted` depending on
    /// capacity (spec.md §4.2 `create`).
    pub fn new(message_text: impl Into<String>) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        Self {
            id,
            context_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            state: TaskState::Submitted,
            message_text: message_text.into(),
            agent_context_id: None,
            history: Vec::new(),
            last_telemetry: None,
            pace_level: None,
            result_text: None,
            error_detail: None,
            artifacts: Vec::new(),
        }
    }

    pub fn push_history(&mut self, role: HistoryRole, text: impl Into<String>) {
        self.history.push(HistoryTurn { role, text: text.into(), timestamp: Utc::now() });
        self.updated_at = Utc::now();
    }

    /// Transition to a new state, refreshing `updated_at`. Terminal states
    /// are a no-op — once terminal, `state` never changes again.
    pub fn transition(&mut self, state: TaskState) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, text: impl Into<String>, artifacts: Vec<Artifact>) {
        if self.state.is_terminal() {
            return;
        }
        self.result_text = Some(text.into());
        self.artifacts.extend(artifacts);
        self.state = TaskState::Completed;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, detail: impl Into<String>, partial_artifacts: Vec<Artifact>) {
        if self.state.is_terminal() {
            return;
        }
        self.error_detail = Some(detail.into());
        self.artifacts.extend(partial_artifacts);
        self.state = TaskState::Failed;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_state_is_sticky() {
        let mut t = Task::new("hello");
        t.complete("done", vec![]);
        assert_eq!(t.state, TaskState::Completed);
        t.fail("should not apply", vec![]);
        assert_eq!(t.state, TaskState::Completed);
        assert!(t.error_detail.is_none());
    }

    #[test]
    fn new_task_starts_submitted() {
        let t = Task::new("hi");
        assert_eq!(t.state, TaskState::Submitted);
        assert!(!t.state.is_terminal());
    }
}
