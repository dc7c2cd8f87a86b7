//! Stateless HTTP client to the inner agent, plus SALUTE telemetry polling
//! (spec.md §4.3, §6 "Inner-agent contract").
//!
//! Grounded on `a2a_core::openrouter_service::OpenRouterBridge` (reqwest
//! `Client` built once with a fixed timeout, held behind a struct with
//! `base_url`/`api_key`, methods that build the request and map non-2xx to a
//! typed error) — generalized from a single hardcoded OpenRouter endpoint to
//! the configurable inner-agent endpoint this spec calls for.

use std::path::{Path, PathBuf};
use std::time::Duration;

use a2a_core::config::AgentConnectionConfig;
use a2a_core::error::BridgeError;
use a2a_core::salute::SaluteReport;
use a2a_core::task::Task;
use serde::{Deserialize, Serialize};

/// Default per-request timeout (spec.md §4.3: "typical 10 minutes").
const DEFAULT_TIMEOUT_SECS: u64 = 600;
/// Short timeout for best-effort cancel sentinels (spec.md §4.3).
const CANCEL_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize)]
struct ApiMessageRequest<'a> {
    text: &'a str,
    context: &'a str,
}

#[derive(Deserialize)]
struct ApiMessageResponse {
    context: String,
    message: String,
}

/// Sentinel text sent to request an in-flight inner-agent turn stop
/// (spec.md §4.3 `cancel`).
const CANCEL_SENTINEL: &str = "CANCEL: stop the current task immediately";

/// Stateless except for the reusable HTTP client (spec.md §4.3).
pub struct AgentBridge {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    reports_dir: PathBuf,
}

impl AgentBridge {
    /// Build a bridge from the Gateway's agent-connection config and the
    /// reports directory it polls for telemetry.
    pub fn new(connection: &AgentConnectionConfig, reports_dir: impl Into<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, base_url: connection.base_url.clone(), api_key: connection.api_key.clone(), reports_dir: reports_dir.into() }
    }

    fn endpoint(&self) -> String {
        format!("{}/api_message", self.base_url.trim_end_matches('/'))
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) if !key.is_empty() => builder.header("X-API-KEY", key),
            _ => builder,
        }
    }

    async fn post_message(&self, text: &str, context: &str, timeout: Duration) -> Result<ApiMessageResponse, BridgeError> {
        let body = ApiMessageRequest { text, context };
        let mut builder = self.client.post(self.endpoint()).timeout(timeout).json(&body);
        builder = self.apply_auth(builder);

        let res = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BridgeError::Timeout
            } else {
                BridgeError::Agent(e.to_string())
            }
        })?;

        let status = res.status();
        if status.as_u16() == 401 {
            return Err(BridgeError::Auth);
        }
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            return Err(BridgeError::Agent(format!("inner agent returned {status}: {detail}")));
        }

        res.json::<ApiMessageResponse>().await.map_err(|e| BridgeError::Agent(format!("malformed inner agent response: {e}")))
    }

    /// Submit a brand-new task. Posts `{text, context:""}`; stores the
    /// returned `context` as `task.agent_context_id`; returns the agent's
    /// reply text (spec.md §4.3 `submit`).
    pub async fn submit(&self, task: &mut Task) -> Result<String, BridgeError> {
        let resp = self.post_message(&task.message_text, "", Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await?;
        task.agent_context_id = Some(resp.context);
        Ok(resp.message)
    }

    /// Submit a follow-up turn on an existing context (spec.md §4.3
    /// `submit_followup`).
    pub async fn submit_followup(&self, task: &mut Task, text: &str) -> Result<String, BridgeError> {
        let context = task.agent_context_id.clone().unwrap_or_default();
        let resp = self.post_message(text, &context, Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await?;
        task.agent_context_id = Some(resp.context);
        Ok(resp.message)
    }

    /// Best-effort request that the inner agent stop its current turn: a
    /// sentinel message on the existing context, short timeout, errors
    /// swallowed by the caller (spec.md §4.3 `cancel`).
    pub async fn cancel(&self, task: &Task) -> Result<(), BridgeError> {
        let context = task.agent_context_id.clone().unwrap_or_default();
        self.post_message(CANCEL_SENTINEL, &context, Duration::from_secs(CANCEL_TIMEOUT_SECS)).await?;
        Ok(())
    }

    /// Reads `{role_id}_latest.json` from the reports directory, or — if
    /// `role_id` is absent — the most-recently-modified `*_latest.json` in
    /// that directory. Returns `None` on any I/O or parse failure (spec.md
    /// §4.3 `read_latest_telemetry`, §7 "SALUTE read failure").
    pub fn read_latest_telemetry(&self, role_id: Option<&str>) -> Option<SaluteReport> {
        let path = match role_id {
            Some(id) => self.reports_dir.join(SaluteReport::latest_filename(id)),
            None => Self::most_recent_latest(&self.reports_dir)?,
        };
        Self::parse_report(&path)
    }

    fn most_recent_latest(dir: &Path) -> Option<PathBuf> {
        let entries = std::fs::read_dir(dir).ok()?;
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with("_latest.json"))
            .filter_map(|e| {
                let modified = e.metadata().ok()?.modified().ok()?;
                Some((modified, e.path()))
            })
            .max_by_key(|(modified, _)| *modified)
            .map(|(_, path)| path)
    }

    fn parse_report(path: &Path) -> Option<SaluteReport> {
        let raw = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "SALUTE report failed to parse");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn connection() -> AgentConnectionConfig {
        AgentConnectionConfig { base_url: "http://127.0.0.1:9999".to_string(), api_key: None }
    }

    #[test]
    fn endpoint_appends_api_message() {
        let bridge = AgentBridge::new(&connection(), "reports");
        assert_eq!(bridge.endpoint(), "http://127.0.0.1:9999/api_message");
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let conn = AgentConnectionConfig { base_url: "http://127.0.0.1:9999/".to_string(), api_key: None };
        let bridge = AgentBridge::new(&conn, "reports");
        assert_eq!(bridge.endpoint(), "http://127.0.0.1:9999/api_message");
    }

    #[test]
    fn read_latest_telemetry_missing_role_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::new(&connection(), dir.path());
        assert!(bridge.read_latest_telemetry(Some("analyst")).is_none());
    }

    #[test]
    fn read_latest_telemetry_falls_back_to_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        fs::write(dir.path().join("analyst_latest.json"), &json).unwrap();
        let bridge = AgentBridge::new(&connection(), dir.path());
        let found = bridge.read_latest_telemetry(None);
        assert!(found.is_some());
        assert_eq!(found.unwrap().unit.role_id, "analyst");
    }

    fn sample_report() -> SaluteReport {
        use a2a_core::salute::{Activity, Environment, Health, Location, PaceLevel, Status, Time, Unit};
        SaluteReport {
            status: Status { state: None, progress: 0.5, pace_level: PaceLevel::Primary, health: Health::Ok },
            activity: Activity::default(),
            location: Location::default(),
            unit: Unit { role_id: "analyst".to_string(), role_name: "Analyst".to_string(), reports_to: None, organization: None },
            time: Time { timestamp: chrono::Utc::now(), turns_elapsed: 1, turns_since_progress: 0 },
            environment: Environment::default(),
        }
    }
}
