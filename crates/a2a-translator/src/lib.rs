//! Translator (T) — pure functions converting SALUTE telemetry into A2A
//! wire concepts (spec.md §4.4).
//!
//! Grounded on `examples/original_source/a2a_server/translation.py`,
//! translated function for function. No `mimetypes` stdlib equivalent in
//! Rust — uses the `mime_guess` crate, the ecosystem-standard choice
//! alongside `axum`/`tower-http` stacks.

use std::fs;
use std::path::Path;

use a2a_core::salute::{AgentState, PaceLevel, SaluteReport};
use a2a_core::task::{Artifact, ArtifactMetadata, ArtifactPart};
use base64::Engine;

const MAX_INLINE_TEXT_BYTES: u64 = 1_000_000;
const FAILURE_REPORT_OUTPUT_CHARS: usize = 2000;

/// `pace -> state` (spec.md §4.4). If the SALUTE's own `status.state`
/// (the inner agent's run-state) is present it takes priority; otherwise
/// fall back to mapping from `pace_level`.
pub fn salute_to_a2a_state(salute: &SaluteReport) -> A2aState {
    if let Some(agent_state) = salute.status.state {
        return match agent_state {
            AgentState::Aborted => A2aState::Failed,
            AgentState::Escalating => A2aState::InputRequired,
            AgentState::Idle | AgentState::Active | AgentState::ErrorRecovery => A2aState::Working,
        };
    }
    match salute.status.pace_level {
        PaceLevel::Primary | PaceLevel::Alternate => A2aState::Working,
        PaceLevel::Contingent => A2aState::InputRequired,
        PaceLevel::Emergency => A2aState::Failed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum A2aState {
    Working,
    InputRequired,
    Failed,
}

/// `telemetry -> status_message` (spec.md §4.4): a human-readable summary.
pub fn salute_to_status_message(salute: &SaluteReport) -> String {
    let mut parts = Vec::new();
    if let Some(plan) = &salute.activity.plan {
        parts.push(plan.clone());
    }
    if let (Some(step), Some(total)) = (salute.activity.step, salute.activity.total_steps) {
        parts.push(format!("step {step}/{total}"));
    }
    parts.push(format!("{:.0}% complete", salute.status.progress * 100.0));
    if !salute.unit.role_name.is_empty() {
        parts.push(format!("role: {}", salute.unit.role_name));
    }
    if let Some(tool) = &salute.activity.current_tool {
        parts.push(format!("tool: {tool}"));
    }
    let mut message = parts.join(" — ");
    if salute.status.pace_level != PaceLevel::Primary {
        message.push_str(&format!(" [escalated to {}]", salute.status.pace_level));
    }
    message
}

/// Serializes `(event_type, status_message)` into an SSE frame
/// (`event: <type>\ndata: <json>\n\n`, spec.md §4.1 SSE framing).
pub fn salute_to_sse_event(event_type: &str, payload: &impl serde::Serialize) -> String {
    let data = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    format!("event: {event_type}\ndata: {data}\n\n")
}

/// Synthesizes the multi-line message sent to the user when PACE escalates
/// to `contingent` (spec.md §4.4 "contingent-message").
pub fn build_contingent_message(salute: &SaluteReport, failed_steps: &[String]) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "I attempted: {}",
        salute.activity.current_task.clone().unwrap_or_else(|| "the requested task".to_string())
    ));
    if !failed_steps.is_empty() {
        lines.push("The following steps failed:".to_string());
        for step in failed_steps {
            lines.push(format!("  - {step}"));
        }
    }
    lines.push(format!(
        "Tool failures: {} consecutive, {} total.",
        salute.environment.tool_failures_consecutive, salute.environment.tool_failures_total
    ));
    lines.push("I need your guidance to proceed.".to_string());
    lines.join("\n")
}

/// Synthesizes the failure report for an `emergency` PACE termination
/// (spec.md §4.4 "failure-report", §8 scenario 4: body begins with
/// `=== Task Failure Report ===`).
pub fn build_failure_report(salute: &SaluteReport, partial_output: &str) -> String {
    let mut lines = Vec::new();
    lines.push("=== Task Failure Report ===".to_string());
    if let Some(plan) = &salute.activity.plan {
        lines.push(format!("Workflow: {plan}"));
    }
    lines.push(format!("Progress: {:.0}%", salute.status.progress * 100.0));
    lines.push(format!(
        "Tool failures: {} consecutive, {} total.",
        salute.environment.tool_failures_consecutive, salute.environment.tool_failures_total
    ));
    lines.push(format!(
        "Turns elapsed: {}, turns without progress: {}.",
        salute.time.turns_elapsed, salute.time.turns_since_progress
    ));
    let truncated: String = partial_output.chars().take(FAILURE_REPORT_OUTPUT_CHARS).collect();
    if !truncated.is_empty() {
        lines.push("--- Partial output ---".to_string());
        lines.push(truncated);
    }
    lines.join("\n")
}

/// Best-effort MIME type guess for a path.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string()
}

fn is_text_mime(mime: &str) -> bool {
    mime.starts_with("text/")
        || matches!(
            mime,
            "application/json" | "application/xml" | "application/x-yaml" | "application/toml"
        )
}

/// Builds an [`Artifact`] for one modified file (spec.md §4.4
/// `collect_artifacts`): inline text if size ≤ 1 MB and the MIME/extension
/// indicates text; base64 otherwise; a size-only placeholder if > 1 MB.
pub fn file_to_artifact(path: &Path) -> std::io::Result<Artifact> {
    let meta = fs::metadata(path)?;
    let size = meta.len();
    let mime = guess_mime(path);
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| path.to_string_lossy().to_string());

    let parts = if size > MAX_INLINE_TEXT_BYTES {
        vec![ArtifactPart::Text { text: format!("[artifact too large to inline: {size} bytes]") }]
    } else if is_text_mime(&mime) {
        let text = fs::read_to_string(path).unwrap_or_default();
        vec![ArtifactPart::Text { text }]
    } else {
        let bytes = fs::read(path)?;
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        vec![ArtifactPart::Data { data }]
    };

    Ok(Artifact {
        name,
        parts,
        metadata: ArtifactMetadata {
            mime_type: mime,
            path: path.to_string_lossy().to_string(),
            size: Some(size),
            encoding: if size > MAX_INLINE_TEXT_BYTES || !is_text_mime(&guess_mime(path)) { Some("base64".to_string()) } else { None },
        },
    })
}

/// Collects artifacts for every path in `files_modified` (spec.md §4.4).
/// Read failures are skipped (mirrors the teacher's "never break the agent
/// over storage failure" posture for background I/O).
pub fn collect_artifacts(files_modified: &[String]) -> Vec<Artifact> {
    files_modified
        .iter()
        .filter_map(|p| match file_to_artifact(Path::new(p)) {
            Ok(a) => Some(a),
            Err(e) => {
                tracing::warn!(path = %p, error = %e, "failed to collect artifact");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::salute::{Activity, Environment, Health, Location, Status, Time, Unit};
    use chrono::Utc;
    use std::io::Write;

    fn sample_salute(pace: PaceLevel) -> SaluteReport {
        SaluteReport {
            status: Status { state: None, progress: 0.5, pace_level: pace, health: Health::Ok },
            activity: Activity { plan: Some("refactor".to_string()), step: Some(2), total_steps: Some(4), ..Default::default() },
            location: Location::default(),
            unit: Unit { role_id: "r1".to_string(), role_name: "Analyst".to_string(), reports_to: None, organization: None },
            time: Time { timestamp: Utc::now(), turns_elapsed: 3, turns_since_progress: 0 },
            environment: Environment::default(),
        }
    }

    #[test]
    fn pace_maps_to_state() {
        assert_eq!(salute_to_a2a_state(&sample_salute(PaceLevel::Primary)), A2aState::Working);
        assert_eq!(salute_to_a2a_state(&sample_salute(PaceLevel::Contingent)), A2aState::InputRequired);
        assert_eq!(salute_to_a2a_state(&sample_salute(PaceLevel::Emergency)), A2aState::Failed);
    }

    #[test]
    fn failure_report_has_expected_header() {
        let report = build_failure_report(&sample_salute(PaceLevel::Emergency), "partial output here");
        assert!(report.starts_with("=== Task Failure Report ==="));
    }

    #[test]
    fn small_text_file_inlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(b"hello world").unwrap();
        let artifact = file_to_artifact(&path).unwrap();
        assert!(matches!(artifact.parts[0], ArtifactPart::Text { .. }));
    }
}
